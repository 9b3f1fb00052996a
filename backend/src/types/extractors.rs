//! Custom extractors for image routes

use aide::operation::OperationInput;
use axum::{
    extract::{multipart::MultipartError, FromRequest, FromRequestParts, Multipart, Path, Request},
    http::{request::Parts, StatusCode},
};
use schemars::JsonSchema;
use serde::Deserialize;
use uuid::Uuid;

use crate::types::error::AppError;
use crate::upload_policy::{UploadDescriptor, UploadPolicyError, UPLOAD_FIELD};

/// Path parameters of the id-taking routes
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ImageIdPath {
    /// Record id (UUID)
    pub id: String,
}

/// Well-formed record id taken from the `{id}` path segment
///
/// Rejects with `400 invalid_id` before any handler code runs, so a malformed
/// id never reaches a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageId(pub Uuid);

impl ImageId {
    /// Key of the record in the record store
    #[must_use]
    pub fn as_key(&self) -> String {
        self.0.to_string()
    }
}

impl<S> FromRequestParts<S> for ImageId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(ImageIdPath { id }) = Path::<ImageIdPath>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::invalid_id())?;

        Uuid::parse_str(&id).map(Self).map_err(|_| AppError::invalid_id())
    }
}

impl OperationInput for ImageId {
    fn operation_input(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) {
        Path::<ImageIdPath>::operation_input(ctx, operation);
    }
}

/// The image file of a multipart request, if any
///
/// Only a file part named `logo` is accepted; text parts are skipped and a
/// request that is not multipart yields `None`.
#[derive(Debug)]
pub struct ImageUpload(pub Option<UploadDescriptor>);

impl<S> FromRequest<S> for ImageUpload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(mut multipart) = Multipart::from_request(req, state).await else {
            return Ok(Self(None));
        };

        let mut upload = None;

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(original_name) = field.file_name().map(ToString::to_string) else {
                continue;
            };

            let field_name = field.name().unwrap_or_default().to_string();
            if field_name != UPLOAD_FIELD || upload.is_some() {
                return Err(UploadPolicyError::UnexpectedField(field_name).into());
            }

            let mime_type = field
                .content_type()
                .unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref())
                .to_string();
            let bytes = field.bytes().await.map_err(multipart_error)?;

            upload = Some(UploadDescriptor {
                field_name,
                original_name,
                mime_type,
                bytes,
            });
        }

        Ok(Self(upload))
    }
}

impl OperationInput for ImageUpload {}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::file_too_large();
    }

    tracing::debug!("Malformed multipart body: {err}");
    AppError::new(
        StatusCode::BAD_REQUEST,
        "invalid_multipart",
        "Malformed multipart body",
        false,
    )
}
