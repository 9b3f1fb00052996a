//! Error types for object store operations

use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use thiserror::Error;

/// Result type for object store operations
pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// Errors that can occur during object store operations
#[derive(Error, Debug)]
pub enum ObjectStoreError {
    /// S3 service error
    #[error("S3 service error: {0}")]
    S3Error(String),

    /// AWS SDK error (dispatch, timeout, response parsing)
    #[error("AWS SDK error: {0}")]
    AwsError(String),

    /// Upstream service error (5xx from S3)
    #[error("Upstream service error: {0}")]
    UpstreamError(String),

    /// Object does not exist
    #[error("Object not found: {0}")]
    NotFound(String),
}

impl<E> From<SdkError<E>> for ObjectStoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: SdkError<E>) -> Self {
        let message = DisplayErrorContext(&error).to_string();
        match &error {
            SdkError::ServiceError(service_err) if service_err.raw().status().as_u16() >= 500 => {
                Self::UpstreamError(message)
            }
            SdkError::ServiceError(_) => Self::S3Error(message),
            _ => Self::AwsError(message),
        }
    }
}
