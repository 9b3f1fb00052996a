//! Error types for image record storage operations

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::{
    delete_item::DeleteItemError, get_item::GetItemError, put_item::PutItemError, scan::ScanError,
    update_item::UpdateItemError,
};
use thiserror::Error;

/// Result type for image record storage operations
pub type ImageRecordStorageResult<T> = Result<T, ImageRecordStorageError>;

/// Errors that can occur during image record storage operations
#[derive(Debug, Error)]
pub enum ImageRecordStorageError {
    /// Failed to insert image record into `DynamoDB`
    #[error("Failed to insert image record into DynamoDB: {0:?}")]
    DynamoDbPutError(#[from] SdkError<PutItemError>),

    /// Failed to get image record from `DynamoDB`
    #[error("Failed to get image record from DynamoDB: {0:?}")]
    DynamoDbGetError(#[from] SdkError<GetItemError>),

    /// Failed to scan image records from `DynamoDB`
    #[error("Failed to scan image records from DynamoDB: {0:?}")]
    DynamoDbScanError(#[from] SdkError<ScanError>),

    /// Failed to update image record in `DynamoDB`
    #[error("Failed to update image record in DynamoDB: {0:?}")]
    DynamoDbUpdateError(#[from] SdkError<UpdateItemError>),

    /// Failed to delete image record from `DynamoDB`
    #[error("Failed to delete image record from DynamoDB: {0:?}")]
    DynamoDbDeleteError(#[from] SdkError<DeleteItemError>),

    /// Failed to (de)serialize an image record
    #[error("Failed to parse image record: {0}")]
    SerializationError(String),
}

impl From<serde_dynamo::Error> for ImageRecordStorageError {
    fn from(err: serde_dynamo::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
