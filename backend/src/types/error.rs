//! Universal error handling for the API

use std::any::Any;

use aide::OperationOutput;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use backend_storage::image_record::ImageRecordStorageError;
use schemars::JsonSchema;
use serde::Serialize;

use crate::object_store::ObjectStoreError;
use crate::upload_policy::UploadPolicyError;

/// API error response envelope
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    /// Whether the client should retry the request
    pub allow_retry: bool,
    /// Error details
    error: ErrorBody,
}

/// Error body containing code and message
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    /// Machine-readable error code
    pub code: &'static str,
    /// Human-readable error message
    pub message: &'static str,
}

/// Application error type that wraps the API error response
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    inner: ApiErrorResponse,
}

impl AppError {
    /// Create a new application error
    #[must_use]
    pub const fn new(
        status: StatusCode,
        code: &'static str,
        msg: &'static str,
        retry: bool,
    ) -> Self {
        Self {
            status,
            inner: ApiErrorResponse {
                allow_retry: retry,
                error: ErrorBody { code, message: msg },
            },
        }
    }

    /// Malformed record id in the request path
    #[must_use]
    pub const fn invalid_id() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_id", "Invalid ID", false)
    }

    /// No record exists for the requested id
    #[must_use]
    pub const fn image_not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "image_not_found",
            "Image not found",
            false,
        )
    }

    /// Uploaded file is larger than the accepted maximum
    #[must_use]
    pub const fn file_too_large() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "file_too_large",
            "File size exceeds 10MB",
            false,
        )
    }

    /// An object store or record store step failed
    #[must_use]
    pub const fn upstream(code: &'static str, msg: &'static str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, msg, true)
    }

    /// HTTP status of the error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.inner.error.code
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error based on status code
        match self.status.as_u16() {
            400..=499 => tracing::warn!(
                "Client error: {} - {}",
                self.inner.error.code,
                self.inner.error.message
            ),
            500..=599 => tracing::error!(
                "Server error: {} - {}",
                self.inner.error.code,
                self.inner.error.message
            ),
            _ => {}
        }

        (self.status, Json(self.inner)).into_response()
    }
}

/// Convert upload validation failures to client errors
impl From<UploadPolicyError> for AppError {
    fn from(err: UploadPolicyError) -> Self {
        use UploadPolicyError::{NoFile, TooLarge, UnexpectedField, UnknownField, UnsupportedType};

        tracing::debug!("Upload rejected: {err}");

        match err {
            NoFile => Self::new(
                StatusCode::BAD_REQUEST,
                "no_file",
                "No file provided",
                false,
            ),
            TooLarge { .. } => Self::file_too_large(),
            UnsupportedType(_) => Self::new(
                StatusCode::BAD_REQUEST,
                "unsupported_type",
                "Only images are allowed",
                false,
            ),
            UnexpectedField(_) => Self::new(
                StatusCode::BAD_REQUEST,
                "unexpected_field",
                "Unexpected field",
                false,
            ),
            UnknownField(_) => Self::new(
                StatusCode::BAD_REQUEST,
                "unknown_field",
                "No upload policy for this field",
                false,
            ),
        }
    }
}

/// Convert object store errors to application errors
impl From<ObjectStoreError> for AppError {
    fn from(err: ObjectStoreError) -> Self {
        tracing::error!("Object store error: {err}");
        Self::upstream("storage_error", "Internal server error")
    }
}

/// Convert record store errors to application errors
impl From<ImageRecordStorageError> for AppError {
    fn from(err: ImageRecordStorageError) -> Self {
        tracing::error!("Record store error: {err}");
        Self::upstream("database_error", "Internal server error")
    }
}

/// Response for handler panics
#[allow(clippy::needless_pass_by_value)]
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Unhandled panic in request handler: {details}");

    AppError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "Internal server error",
        false,
    )
    .into_response()
}

impl OperationOutput for AppError {
    type Inner = ApiErrorResponse;

    fn operation_response(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) -> Option<aide::openapi::Response> {
        Json::<ApiErrorResponse>::operation_response(ctx, operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_error_envelope_shape() {
        let response = AppError::image_not_found().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["allowRetry"], false);
        assert_eq!(json["error"]["code"], "image_not_found");
        assert_eq!(json["error"]["message"], "Image not found");
    }

    #[test]
    fn test_upload_policy_errors_are_client_errors() {
        let errors = [
            UploadPolicyError::NoFile,
            UploadPolicyError::TooLarge { size: 11 },
            UploadPolicyError::UnsupportedType("gif".to_string()),
            UploadPolicyError::UnexpectedField("avatar".to_string()),
            UploadPolicyError::UnknownField("banner".to_string()),
        ];

        for err in errors {
            assert_eq!(AppError::from(err).status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_object_store_errors_are_server_errors() {
        let err = AppError::from(ObjectStoreError::S3Error("boom".to_string()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "storage_error");

        let err = AppError::from(ObjectStoreError::UpstreamError("503".to_string()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_panic_handler_hides_details() {
        let response = handle_panic(Box::new("secret detail"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
