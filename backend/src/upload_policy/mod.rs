//! Validation and naming of uploaded images
//!
//! An upload goes through two steps before it reaches the object store:
//! 1. the file is validated and renamed to `{date}-{time}-{field}.{ext}`
//! 2. the field's [`FieldPolicy`] is appended to the name as a query string
//!
//! Names only have second granularity, so two uploads of the same field within
//! the same second map to the same object and the later one overwrites the first.

mod field_policy;

use axum::body::Bytes;
use chrono::NaiveDateTime;
use thiserror::Error;

pub use field_policy::{encode_object_name, FieldPolicy, UploadField};

/// Maximum accepted upload size: 10 MiB
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Lowercase extensions accepted for upload
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpeg", "jpg", "png", "svg", "webp"];

/// Multipart field carrying the image on the upload routes
pub const UPLOAD_FIELD: &str = "logo";

/// Errors raised while validating an upload
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadPolicyError {
    /// The request carried no file
    #[error("No file provided")]
    NoFile,

    /// The file exceeds [`MAX_UPLOAD_SIZE`]
    #[error("File size {size} exceeds 10MB")]
    TooLarge {
        /// Size of the rejected file in bytes
        size: usize,
    },

    /// The file extension is not in [`ALLOWED_EXTENSIONS`]
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    /// A file was sent under a field the route does not accept
    #[error("Unexpected field: {0}")]
    UnexpectedField(String),

    /// The field has no entry in the policy table
    #[error("No upload policy for field: {0}")]
    UnknownField(String),
}

/// A file as received from the multipart request
#[derive(Debug, Clone)]
pub struct UploadDescriptor {
    /// Multipart field name
    pub field_name: String,
    /// File name sent by the client
    pub original_name: String,
    /// Content type sent by the client
    pub mime_type: String,
    /// File contents
    pub bytes: Bytes,
}

impl UploadDescriptor {
    /// Size of the file in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// An upload that passed validation and is ready for the object store
#[derive(Debug, Clone)]
pub struct PreparedUpload {
    /// Canonical file name followed by the encoded field policy
    pub object_name: String,
    /// Content type stored with the object
    pub content_type: String,
    /// File contents
    pub bytes: Bytes,
}

/// Lowercased text after the last `.` of a file name, or the whole name without one
#[must_use]
pub fn file_extension(original_name: &str) -> String {
    original_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Checks presence, size and extension, returning the normalized extension
///
/// # Errors
///
/// Returns the first failed check as an `UploadPolicyError`
pub fn validate(descriptor: Option<&UploadDescriptor>) -> Result<String, UploadPolicyError> {
    let descriptor = descriptor.ok_or(UploadPolicyError::NoFile)?;

    if descriptor.size() > MAX_UPLOAD_SIZE {
        return Err(UploadPolicyError::TooLarge {
            size: descriptor.size(),
        });
    }

    let extension = file_extension(&descriptor.original_name);
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(UploadPolicyError::UnsupportedType(extension));
    }

    Ok(extension)
}

/// Canonical file name: `{year}-{month}-{day}-{hour}{minute}{second}-{field}.{ext}`
#[must_use]
pub fn canonical_filename(now: NaiveDateTime, field_name: &str, extension: &str) -> String {
    format!("{}-{field_name}.{extension}", now.format("%Y-%m-%d-%H%M%S"))
}

/// Validates an upload and derives the object name it will be stored under
///
/// # Errors
///
/// Returns `UploadPolicyError` if validation fails or the field has no policy
pub fn prepare(
    descriptor: Option<UploadDescriptor>,
    now: NaiveDateTime,
) -> Result<PreparedUpload, UploadPolicyError> {
    let extension = validate(descriptor.as_ref())?;
    let descriptor = descriptor.ok_or(UploadPolicyError::NoFile)?;

    let filename = canonical_filename(now, &descriptor.field_name, &extension);
    let object_name = encode_object_name(&filename, &descriptor.field_name)?;

    Ok(PreparedUpload {
        object_name,
        content_type: descriptor.mime_type,
        bytes: descriptor.bytes,
    })
}
