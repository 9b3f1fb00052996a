use std::sync::Arc;

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream, Client as S3Client};
use image_backend::{
    object_store::{ObjectStore, ObjectStoreError, S3ObjectStore},
    upload_policy::PreparedUpload,
};
use uuid::Uuid;

const LOCALSTACK_ENDPOINT: &str = "http://localhost:4566";
const TEST_REGION: &str = "us-east-1";

/// Object store on a fresh bucket, removed on drop
struct TestContext {
    store: S3ObjectStore,
    s3_client: Arc<S3Client>,
    bucket_name: String,
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let client = self.s3_client.clone();
        let bucket = self.bucket_name.clone();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Ok(listing) = client.list_objects_v2().bucket(&bucket).send().await {
                    for object in listing.contents() {
                        if let Some(key) = object.key() {
                            let _ = client.delete_object().bucket(&bucket).key(key).send().await;
                        }
                    }
                }
                let _ = client.delete_bucket().bucket(&bucket).send().await;
            });
        }
    }
}

async fn setup_test() -> TestContext {
    let bucket_name = format!("test-images-{}", Uuid::new_v4());

    let credentials = Credentials::from_keys("test", "test", None);
    let config = aws_config::defaults(BehaviorVersion::latest())
        .endpoint_url(LOCALSTACK_ENDPOINT)
        .region(Region::new(TEST_REGION))
        .credentials_provider(credentials)
        .load()
        .await;
    let s3_config = aws_sdk_s3::config::Builder::from(&config)
        .force_path_style(true)
        .build();
    let s3_client = Arc::new(S3Client::from_conf(s3_config));

    s3_client
        .create_bucket()
        .bucket(&bucket_name)
        .send()
        .await
        .expect("Failed to create test bucket");

    TestContext {
        store: S3ObjectStore::new(s3_client.clone(), bucket_name.clone(), TEST_REGION.to_string()),
        s3_client,
        bucket_name,
    }
}

impl TestContext {
    async fn put_optimized(&self, filename: &str, data: &'static [u8]) {
        self.s3_client
            .put_object()
            .bucket(&self.bucket_name)
            .key(format!("Optimize-images/{filename}"))
            .body(ByteStream::from_static(data))
            .send()
            .await
            .expect("Failed to put object");
    }
}

#[tokio::test]
#[ignore = "requires LocalStack on localhost:4566"]
async fn test_upload_writes_raw_folder() {
    let ctx = setup_test().await;
    let upload = PreparedUpload {
        object_name: "2024-01-02-030405-logo.png?ext=png&size=400x100&filesize=150KB".to_string(),
        content_type: "image/png".to_string(),
        bytes: vec![1u8, 2, 3].into(),
    };

    let url = ctx.store.upload(&upload).await.expect("Failed to upload");
    assert_eq!(
        url,
        format!(
            "https://{}.s3.{TEST_REGION}.amazonaws.com/Raw-images/2024-01-02-030405-logo.png?ext=png&size=400x100&filesize=150KB",
            ctx.bucket_name
        )
    );

    let object = ctx
        .s3_client
        .get_object()
        .bucket(&ctx.bucket_name)
        .key("Raw-images/2024-01-02-030405-logo.png?ext=png&size=400x100&filesize=150KB")
        .send()
        .await
        .expect("Uploaded object missing");
    assert_eq!(object.content_type(), Some("image/png"));
}

#[tokio::test]
#[ignore = "requires LocalStack on localhost:4566"]
async fn test_fetch_and_delete() {
    let ctx = setup_test().await;
    ctx.put_optimized("a.png", b"optimized").await;

    let body = ctx
        .store
        .fetch("a.png")
        .await
        .expect("Failed to fetch")
        .collect()
        .await
        .expect("Failed to read body");
    assert_eq!(body.into_bytes().as_ref(), b"optimized");

    ctx.store.delete("a.png").await.expect("Failed to delete");
    assert!(matches!(
        ctx.store.fetch("a.png").await,
        Err(ObjectStoreError::NotFound(_))
    ));
}

#[tokio::test]
#[ignore = "requires LocalStack on localhost:4566"]
async fn test_list_drops_first_key() {
    let ctx = setup_test().await;
    assert!(ctx.store.list().await.expect("Failed to list").is_empty());

    ctx.put_optimized("a.png", b"a").await;
    assert!(ctx.store.list().await.expect("Failed to list").is_empty());

    ctx.put_optimized("b.png", b"b").await;
    ctx.put_optimized("c.png", b"c").await;
    let urls = ctx.store.list().await.expect("Failed to list");
    assert_eq!(urls.len(), 2);
    assert!(urls.iter().all(|url| url.contains("/Optimize-images/")));
}
