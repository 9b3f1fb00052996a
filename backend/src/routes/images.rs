use std::sync::Arc;

use aide::OperationOutput;
use aws_sdk_s3::primitives::ByteStream;
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use backend_storage::image_record::{ImageRecord, ImageRecordStore};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::{error, info, instrument, warn};

use crate::{
    image_url::{extract_filename, to_public_url},
    object_store::ObjectStore,
    types::{AppError, ImageId, ImageUpload},
    upload_policy,
};

/// Content type of every downloaded image
pub const DOWNLOAD_CONTENT_TYPE: &str = "image/webp";

/// An image record as returned by the API
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    /// Record id (UUID)
    pub id: String,
    /// Public URL of the optimized image
    pub image_url: String,
    /// RFC 3339 creation time
    pub created_at: String,
    /// RFC 3339 time of the last update
    pub updated_at: String,
}

fn format_timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<ImageRecord> for ImageResponse {
    fn from(record: ImageRecord) -> Self {
        Self {
            id: record.id,
            image_url: record.image_url,
            created_at: format_timestamp(record.created_at),
            updated_at: format_timestamp(record.updated_at),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateImageResponse {
    pub message: String,
    /// The record created for the upload
    pub new_image: ImageResponse,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ImageListResponse {
    pub message: String,
    /// Number of images returned
    pub total: usize,
    pub images: Vec<ImageResponse>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct GetImageResponse {
    pub message: String,
    pub image: ImageResponse,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateImageResponse {
    pub message: String,
    /// Public URL of the replacement image
    pub image_url: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct BucketListResponse {
    pub message: String,
    /// Number of URLs returned
    pub total: usize,
    /// Public URLs of the optimized images
    pub images: Vec<String>,
}

/// Streamed image body sent as an attachment
pub struct ImageDownload {
    filename: String,
    body: ByteStream,
}

impl IntoResponse for ImageDownload {
    fn into_response(self) -> Response {
        let stream = ReaderStream::new(self.body.into_async_read());

        (
            [
                (header::CONTENT_TYPE, DOWNLOAD_CONTENT_TYPE.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", self.filename),
                ),
            ],
            Body::from_stream(stream),
        )
            .into_response()
    }
}

impl OperationOutput for ImageDownload {
    type Inner = Self;
}

/// Converts the URL returned by the object store into the URL kept on the record
fn public_url(raw_url: &str, code: &'static str, msg: &'static str) -> Result<String, AppError> {
    to_public_url(raw_url).ok_or_else(|| {
        error!(raw_url, "Uploaded object URL is outside the raw folder");
        AppError::upstream(code, msg)
    })
}

async fn find_record(
    record_store: &dyn ImageRecordStore,
    id: &ImageId,
) -> Result<ImageRecord, AppError> {
    record_store
        .find_by_id(&id.as_key())
        .await?
        .ok_or_else(AppError::image_not_found)
}

/// Plain-text greeting served at the root
#[allow(clippy::unused_async)]
pub async fn welcome() -> &'static str {
    "Welcome to Image Optimization API"
}

/// Upload an image
///
/// Validates the `logo` file, stores it in the raw folder and records the URL
/// its optimized copy will be published under.
///
/// # Returns
///
/// Returns `201 CREATED` with the new record
///
/// # Errors
///
/// - `400 BAD_REQUEST` - Missing, oversized or non-image file
/// - `500 INTERNAL_SERVER_ERROR` - Object store or record store failure
#[instrument(skip_all)]
pub async fn upload_image(
    Extension(object_store): Extension<Arc<dyn ObjectStore>>,
    Extension(record_store): Extension<Arc<dyn ImageRecordStore>>,
    ImageUpload(upload): ImageUpload,
) -> Result<(StatusCode, Json<CreateImageResponse>), AppError> {
    let prepared = upload_policy::prepare(upload, Local::now().naive_local())?;

    let raw_url = object_store
        .upload(&prepared)
        .await
        .map_err(|_| AppError::upstream("upload_failed", "Upload failed"))?;
    let image_url = public_url(&raw_url, "upload_failed", "Upload failed")?;

    let record = record_store.create(&image_url).await?;
    info!(id = record.id, image_url = record.image_url, "Image uploaded");

    Ok((
        StatusCode::CREATED,
        Json(CreateImageResponse {
            message: "Image Uploaded Successfully".to_string(),
            new_image: record.into(),
        }),
    ))
}

/// List all image records
///
/// # Errors
///
/// - `500 INTERNAL_SERVER_ERROR` - Record store failure
#[instrument(skip_all)]
pub async fn list_images(
    Extension(record_store): Extension<Arc<dyn ImageRecordStore>>,
) -> Result<Json<ImageListResponse>, AppError> {
    let records = record_store.find_all().await?;

    Ok(Json(ImageListResponse {
        message: "Images fetched successfully".to_string(),
        total: records.len(),
        images: records.into_iter().map(Into::into).collect(),
    }))
}

/// Get an image record by id
///
/// # Errors
///
/// - `400 BAD_REQUEST` - Malformed id
/// - `404 NOT_FOUND` - No record with this id
/// - `500 INTERNAL_SERVER_ERROR` - Record store failure
#[instrument(skip(record_store))]
pub async fn get_image(
    id: ImageId,
    Extension(record_store): Extension<Arc<dyn ImageRecordStore>>,
) -> Result<Json<GetImageResponse>, AppError> {
    let record = find_record(record_store.as_ref(), &id).await?;

    Ok(Json(GetImageResponse {
        message: "Image fetched successfully".to_string(),
        image: record.into(),
    }))
}

/// Replace the image of a record
///
/// Deletes the current optimized object, uploads the new file and points the
/// record at the new URL. The steps are not atomic: a failure after the delete
/// leaves the record pointing at a missing object.
///
/// # Errors
///
/// - `400 BAD_REQUEST` - Malformed id, or missing, oversized or non-image file
/// - `404 NOT_FOUND` - No record with this id
/// - `500 INTERNAL_SERVER_ERROR` - Object store or record store failure
#[instrument(skip(object_store, record_store, upload))]
pub async fn update_image(
    id: ImageId,
    Extension(object_store): Extension<Arc<dyn ObjectStore>>,
    Extension(record_store): Extension<Arc<dyn ImageRecordStore>>,
    ImageUpload(upload): ImageUpload,
) -> Result<Json<UpdateImageResponse>, AppError> {
    let prepared = upload_policy::prepare(upload, Local::now().naive_local())?;
    let record = find_record(record_store.as_ref(), &id).await?;

    let old_filename = extract_filename(&record.image_url)
        .ok_or_else(|| AppError::upstream("delete_failed", "Failed to delete old image"))?;
    object_store
        .delete(old_filename)
        .await
        .map_err(|_| AppError::upstream("delete_failed", "Failed to delete old image"))?;

    let raw_url = object_store
        .upload(&prepared)
        .await
        .map_err(|_| AppError::upstream("upload_failed", "Failed to upload new image"))?;
    let image_url = public_url(&raw_url, "upload_failed", "Failed to upload new image")?;

    let updated = record_store
        .update_by_id(&id.as_key(), &image_url)
        .await?
        .ok_or_else(AppError::image_not_found)?;
    info!(image_url = updated.image_url, "Image updated");

    Ok(Json(UpdateImageResponse {
        message: "Image updated successfully".to_string(),
        image_url: updated.image_url,
    }))
}

/// Delete an image and its record
///
/// The optimized object is removed first; if removing the record then fails
/// the record outlives its object.
///
/// # Errors
///
/// - `400 BAD_REQUEST` - Malformed id
/// - `404 NOT_FOUND` - No record with this id
/// - `500 INTERNAL_SERVER_ERROR` - Object store or record store failure
#[instrument(skip(object_store, record_store))]
pub async fn delete_image(
    id: ImageId,
    Extension(object_store): Extension<Arc<dyn ObjectStore>>,
    Extension(record_store): Extension<Arc<dyn ImageRecordStore>>,
) -> Result<Json<MessageResponse>, AppError> {
    let record = find_record(record_store.as_ref(), &id).await?;

    let filename = extract_filename(&record.image_url)
        .ok_or_else(|| AppError::upstream("delete_failed", "Deletion failed"))?;
    object_store
        .delete(filename)
        .await
        .map_err(|_| AppError::upstream("delete_failed", "Deletion failed"))?;

    record_store.delete_by_id(&id.as_key()).await?;
    info!(filename, "Image deleted");

    Ok(Json(MessageResponse {
        message: "Image deleted successfully".to_string(),
    }))
}

/// Download the optimized image of a record
///
/// # Returns
///
/// Streams the object as an `image/webp` attachment named after the stored file
///
/// # Errors
///
/// - `400 BAD_REQUEST` - Malformed id
/// - `404 NOT_FOUND` - No record with this id
/// - `500 INTERNAL_SERVER_ERROR` - Object could not be fetched
#[instrument(skip(object_store, record_store))]
pub async fn download_image(
    id: ImageId,
    Extension(object_store): Extension<Arc<dyn ObjectStore>>,
    Extension(record_store): Extension<Arc<dyn ImageRecordStore>>,
) -> Result<ImageDownload, AppError> {
    let record = find_record(record_store.as_ref(), &id).await?;

    let filename = extract_filename(&record.image_url)
        .ok_or_else(|| AppError::upstream("fetch_failed", "Failed to fetch image"))?;
    let body = object_store
        .fetch(filename)
        .await
        .map_err(|_| AppError::upstream("fetch_failed", "Failed to fetch image"))?;

    Ok(ImageDownload {
        filename: filename.to_string(),
        body,
    })
}

/// List the optimized images present in the bucket
///
/// Reads the bucket directly, without consulting the records. A failed listing
/// is answered like an empty bucket.
#[instrument(skip_all)]
pub async fn list_bucket_images(
    Extension(object_store): Extension<Arc<dyn ObjectStore>>,
) -> Json<BucketListResponse> {
    let images = object_store.list().await.unwrap_or_else(|err| {
        warn!("Bucket listing failed, answering with no images: {err}");
        Vec::new()
    });

    Json(BucketListResponse {
        message: "Images fetched successfully".to_string(),
        total: images.len(),
        images,
    })
}
