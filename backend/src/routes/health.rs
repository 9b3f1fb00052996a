use aide::axum::IntoApiResponse;
use axum::Json;
use schemars::JsonSchema;
use serde::Serialize;

#[derive(Debug, Serialize, JsonSchema)]
pub struct HealthResponse {
    status: String,
    /// Current version of the application
    semver: String,
    /// Commit hash of the current build (if available)
    rev: Option<String>,
}

/// Health check endpoint
///
/// Returns the service status and the running build.
#[allow(clippy::unused_async)]
pub async fn handler() -> impl IntoApiResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        semver: env!("CARGO_PKG_VERSION").to_string(),
        rev: option_env!("GIT_REV").map(ToString::to_string),
    })
}
