use std::sync::Arc;

use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use backend_storage::image_record::ImageRecordStorage;
use image_backend::{object_store::S3ObjectStore, server, types::Environment};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env();

    // JSON logs for staging/production (Datadog), plain text for development
    if environment.json_logs() {
        fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    } else {
        fmt().with_env_filter(EnvFilter::from_default_env()).init();
    }

    let s3_client = Arc::new(S3Client::from_conf(environment.s3_client_config().await));
    let object_store = Arc::new(S3ObjectStore::new(
        s3_client,
        environment.s3_bucket(),
        environment.aws_region(),
    ));

    let dynamodb_client = Arc::new(DynamoDbClient::new(&environment.aws_config().await));
    let record_store = Arc::new(ImageRecordStorage::new(
        dynamodb_client,
        environment.images_table_name(),
    ));

    server::start(environment, object_store, record_store).await
}
