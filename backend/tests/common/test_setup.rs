use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use backend_storage::image_record::{mock::InMemoryImageRecordStore, ImageRecord};
use image_backend::{object_store::mock::InMemoryObjectStore, server, types::Environment};
use tower::ServiceExt;
use uuid::Uuid;

use super::utils::MultipartFile;

pub const TEST_BUCKET: &str = "test-bucket";
pub const TEST_REGION: &str = "us-east-1";

/// Initialize tracing for tests
pub fn setup_test_env() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Router wired to in-memory stores
pub struct TestSetup {
    pub router: Router,
    pub object_store: Arc<InMemoryObjectStore>,
    pub record_store: Arc<InMemoryImageRecordStore>,
}

impl TestSetup {
    pub fn new() -> Self {
        setup_test_env();

        let object_store = Arc::new(InMemoryObjectStore::new(TEST_BUCKET, TEST_REGION));
        let record_store = Arc::new(InMemoryImageRecordStore::new());

        let router = server::router(
            Environment::Development,
            object_store.clone(),
            record_store.clone(),
        );

        Self {
            router,
            object_store,
            record_store,
        }
    }

    /// Public URL of an object in the optimized folder
    pub fn optimized_url(filename: &str) -> String {
        format!("https://{TEST_BUCKET}.s3.{TEST_REGION}.amazonaws.com/Optimize-images/{filename}")
    }

    /// Stores a record and its optimized object, returning the record
    pub fn seed_image(&self, filename: &str, bytes: &[u8]) -> ImageRecord {
        let record = ImageRecord {
            id: Uuid::new_v4().to_string(),
            image_url: Self::optimized_url(filename),
            created_at: 1_704_164_645,
            updated_at: 1_704_164_645,
        };
        self.record_store.insert(record.clone());
        self.object_store
            .insert(&format!("Optimize-images/{filename}"), bytes.to_vec());
        record
    }

    /// Total number of calls made to both stores
    pub fn store_calls(&self) -> usize {
        self.object_store.call_count() + self.record_store.call_count()
    }

    pub async fn send_request(
        &self,
        method: Method,
        route: &str,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let request = Request::builder()
            .uri(route)
            .method(method)
            .body(Body::empty())?;

        let response = self.router.clone().oneshot(request).await?;
        Ok(response)
    }

    pub async fn send_multipart_request(
        &self,
        method: Method,
        route: &str,
        files: &[MultipartFile],
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let (content_type, body) = super::utils::multipart_body(files);

        let request = Request::builder()
            .uri(route)
            .method(method)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))?;

        let response = self.router.clone().oneshot(request).await?;
        Ok(response)
    }
}
