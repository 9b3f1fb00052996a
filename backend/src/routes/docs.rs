//! Interactive API reference and the `OpenAPI` document behind it

use std::sync::Arc;

use aide::{axum::ApiRouter, openapi::OpenApi, scalar::Scalar};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json,
};

use crate::types::Environment;

/// Title shown in the generated documentation
pub const API_TITLE: &str = "Image Optimization API";

pub fn handler() -> ApiRouter {
    ApiRouter::new()
        .route(
            "/docs",
            Scalar::new("/openapi.json").with_title(API_TITLE).axum_route(),
        )
        .route("/openapi.json", get(openapi_schema))
}

/// Serves the document outside production only
#[allow(clippy::unused_async)]
async fn openapi_schema(
    Extension(environment): Extension<Environment>,
    Extension(openapi): Extension<Arc<OpenApi>>,
) -> Response {
    if environment.show_api_docs() {
        Json(openapi.as_ref()).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}
