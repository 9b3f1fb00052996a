use axum::response::Response;
use http_body_util::BodyExt;

const BOUNDARY: &str = "image-backend-test-boundary";

/// A part of a multipart test body
pub struct MultipartFile {
    pub field: &'static str,
    /// File name; `None` makes the part a plain text field
    pub filename: Option<&'static str>,
    pub content_type: &'static str,
    pub data: Vec<u8>,
}

impl MultipartFile {
    /// An image part under the `logo` field
    pub fn logo(filename: &'static str, size: usize) -> Self {
        Self {
            field: "logo",
            filename: Some(filename),
            content_type: "image/png",
            data: test_image(size),
        }
    }
}

/// Deterministic image-like payload of `size` bytes
pub fn test_image(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Encodes parts as `multipart/form-data`, returning the content type and body
pub fn multipart_body(files: &[MultipartFile]) -> (String, Vec<u8>) {
    let mut body = Vec::new();

    for file in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{filename}\"\r\nContent-Type: {}\r\n\r\n",
                    file.field, file.content_type
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", file.field)
                    .as_bytes(),
            ),
        }
        body.extend_from_slice(&file.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

/// Parse response body to JSON
pub async fn parse_response_body(response: Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

/// Collect the raw response body
pub async fn response_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}
