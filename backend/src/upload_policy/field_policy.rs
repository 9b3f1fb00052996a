//! Static encoding policy per upload field
//!
//! The policy of the uploaded field is appended to the object name as a query
//! string. It rides along through the upload to tell the URL rewrite which
//! extension the optimized copy will have.

use std::str::FromStr;

use strum::{Display, EnumIter, EnumString};

use super::UploadPolicyError;

/// Known upload fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum UploadField {
    /// Company or product logo
    Logo,
    /// Small icon set
    Icons,
    /// Profile picture
    Avatar,
    /// Blog post illustration
    Blog,
    /// General purpose image
    Image,
    /// Desktop wallpaper
    Wallpaper,
    /// `LinkedIn` banner
    LinkedIn,
}

/// Target format metadata for an upload field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPolicy {
    /// Target file extension
    pub ext: &'static str,
    /// Target dimensions, `WxH`
    pub size: &'static str,
    /// Target file size budget
    pub filesize: &'static str,
}

impl UploadField {
    /// Returns the encoding policy of the field
    #[must_use]
    pub const fn policy(self) -> FieldPolicy {
        let (ext, size, filesize) = match self {
            Self::Logo => ("png", "400x100", "150KB"),
            Self::Icons => ("png", "64x64", "50KB"),
            Self::Avatar => ("png", "400x400", "300KB"),
            Self::Blog => ("webp", "1200x800", "400KB"),
            Self::Image => ("jpeg", "2000x2000", "700KB"),
            Self::Wallpaper => ("jpeg", "1920x1080", "1.5MB"),
            Self::LinkedIn => ("jpeg", "1584x396", "1MB"),
        };

        FieldPolicy {
            ext,
            size,
            filesize,
        }
    }
}

impl FieldPolicy {
    /// Query string carrying the policy, without the leading `?`
    #[must_use]
    pub fn query_string(&self) -> String {
        format!(
            "ext={}&size={}&filesize={}",
            self.ext, self.size, self.filesize
        )
    }
}

/// Appends the policy of `field_name` to `filename` as a query string
///
/// # Errors
///
/// Returns `UploadPolicyError::UnknownField` if the field has no policy
pub fn encode_object_name(filename: &str, field_name: &str) -> Result<String, UploadPolicyError> {
    let field = UploadField::from_str(field_name)
        .map_err(|_| UploadPolicyError::UnknownField(field_name.to_string()))?;

    Ok(format!("{filename}?{}", field.policy().query_string()))
}
