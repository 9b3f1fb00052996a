use std::{sync::Arc, time::Duration};

use aide::openapi::{Info, OpenApi};
use axum::{extract::DefaultBodyLimit, Extension, Router};
use backend_storage::image_record::ImageRecordStore;
use datadog_tracing::axum::{shutdown_signal, OtelAxumLayer, OtelInResponseLayer};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer};

use crate::{
    object_store::ObjectStore,
    routes,
    types::{handle_panic, Environment},
};

/// Request body limit, above the upload policy maximum so the policy decides
pub const REQUEST_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Time allowed for a request before it is answered with a timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the application router with its dependencies attached
pub fn router(
    environment: Environment,
    object_store: Arc<dyn ObjectStore>,
    record_store: Arc<dyn ImageRecordStore>,
) -> Router {
    let mut openapi = OpenApi {
        info: Info {
            title: routes::API_TITLE.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Info::default()
        },
        ..OpenApi::default()
    };

    routes::handler()
        .finish_api(&mut openapi)
        .layer(Extension(Arc::new(openapi)))
        .layer(Extension(environment))
        .layer(Extension(object_store))
        .layer(Extension(record_store))
        .layer(DefaultBodyLimit::max(REQUEST_BODY_LIMIT))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}

/// Starts the server with the given environment and dependencies
///
/// # Errors
///
/// Returns an error if the port is invalid or the server fails to bind
pub async fn start(
    environment: Environment,
    object_store: Arc<dyn ObjectStore>,
    record_store: Arc<dyn ImageRecordStore>,
) -> anyhow::Result<()> {
    let port = environment.port()?;

    let router = router(environment, object_store, record_store)
        // Include trace context as header into the response
        .layer(OtelInResponseLayer)
        // Start OpenTelemetry trace on incoming request
        .layer(OtelAxumLayer::default());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Image Optimization API started on http://{addr}");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(anyhow::Error::from)
}
