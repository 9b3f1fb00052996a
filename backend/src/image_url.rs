//! Rewrites between raw upload URLs and public image URLs
//!
//! Uploads land in [`RAW_FOLDER`] under a name that still carries the encoded field
//! policy, e.g. `.../Raw-images/2024-01-02-030405-logo.png?ext=png&size=400x100&filesize=150KB`.
//! The public URL stored in records points at [`OPTIMIZED_FOLDER`] and uses the
//! policy's target extension: `.../Optimize-images/2024-01-02-030405-logo.png`.

use tracing::warn;

/// Object store folder receiving uploads
pub const RAW_FOLDER: &str = "Raw-images";

/// Object store folder holding the public copies
pub const OPTIMIZED_FOLDER: &str = "Optimize-images";

/// Replaces the first `/{source}/` segment of `url` with `/{target}/`
///
/// Returns `None` when the URL has no `/{source}/` segment.
#[must_use]
pub fn rewrite_folder(url: &str, source: &str, target: &str) -> Option<String> {
    let segment = format!("/{source}/");
    url.contains(&segment)
        .then(|| url.replacen(&segment, &format!("/{target}/"), 1))
}

/// Value of the first `name` parameter of a query string
fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
}

/// Replaces the trailing `.ext` of the last path segment, if there is one
fn replace_extension(path: &str, extension: &str) -> String {
    match path.rfind('.') {
        Some(idx) if idx + 1 < path.len() && !path[idx + 1..].contains('/') => {
            format!("{}.{extension}", &path[..idx])
        }
        _ => path.to_string(),
    }
}

/// Drops the query string and swaps the extension for its `ext` parameter
///
/// A URL without an `ext` parameter ends up with the extension `null`.
#[must_use]
pub fn rewrite_extension(url: &str) -> String {
    let mut parts = url.split('?');
    let path = parts.next().unwrap_or_default();

    let extension = parts
        .next()
        .and_then(|query| query_param(query, "ext"))
        .unwrap_or_else(|| {
            warn!(url, "URL carries no ext parameter, extension set to null");
            "null"
        });

    replace_extension(path, extension)
}

/// Converts the URL of a raw upload into the public URL recorded for it
///
/// Returns `None` when the URL does not point into [`RAW_FOLDER`].
#[must_use]
pub fn to_public_url(raw_url: &str) -> Option<String> {
    rewrite_folder(raw_url, RAW_FOLDER, OPTIMIZED_FOLDER).map(|url| rewrite_extension(&url))
}

/// Last path segment of a stored URL
#[must_use]
pub fn extract_filename(url: &str) -> Option<&str> {
    url.rsplit('/').next().filter(|name| !name.is_empty())
}
