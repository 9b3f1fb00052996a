//! S3-backed storage of image objects
//!
//! Uploads are written under [`RAW_FOLDER`]; reads, listings and deletes target
//! [`OPTIMIZED_FOLDER`], where the optimization pipeline places its output.
mod error;

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::{
    error::SdkError, operation::get_object::GetObjectError, primitives::ByteStream,
    Client as S3Client,
};
use tracing::{error, info};

use crate::image_url::{OPTIMIZED_FOLDER, RAW_FOLDER};
use crate::upload_policy::PreparedUpload;

pub use error::{ObjectStoreError, ObjectStoreResult};

/// Public URL of an object in a bucket
#[must_use]
pub fn object_url(bucket_name: &str, region: &str, key: &str) -> String {
    format!("https://{bucket_name}.s3.{region}.amazonaws.com/{key}")
}

/// Turns the keys of a folder listing into public URLs
///
/// The first key is the folder marker and is always dropped, so a listing with
/// zero or one key yields no URLs.
#[must_use]
pub fn listing_urls(bucket_name: &str, region: &str, keys: &[String]) -> Vec<String> {
    keys.iter()
        .skip(1)
        .map(|key| object_url(bucket_name, region, key))
        .collect()
}

/// Gateway to the bucket holding image objects
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores an upload under `Raw-images/{object_name}` and returns its URL
    ///
    /// # Errors
    ///
    /// Returns `ObjectStoreError` if the object could not be written
    async fn upload(&self, upload: &PreparedUpload) -> ObjectStoreResult<String>;

    /// Opens the body of `Optimize-images/{filename}`
    ///
    /// # Errors
    ///
    /// Returns `ObjectStoreError::NotFound` for a missing object, another variant for any other failure
    async fn fetch(&self, filename: &str) -> ObjectStoreResult<ByteStream>;

    /// Lists the public URLs of the optimized folder
    ///
    /// # Errors
    ///
    /// Returns `ObjectStoreError` if any listing page fails
    async fn list(&self) -> ObjectStoreResult<Vec<String>>;

    /// Removes `Optimize-images/{filename}`
    ///
    /// # Errors
    ///
    /// Returns `ObjectStoreError` if the delete request fails
    async fn delete(&self, filename: &str) -> ObjectStoreResult<()>;
}

/// Object store client for S3 operations
pub struct S3ObjectStore {
    s3_client: Arc<S3Client>,
    bucket_name: String,
    region: String,
}

impl S3ObjectStore {
    /// Creates a new object store client
    ///
    /// # Arguments
    ///
    /// * `s3_client` - Pre-configured S3 client
    /// * `bucket_name` - S3 bucket holding the image folders
    /// * `region` - Region used to build public object URLs
    #[must_use]
    pub const fn new(s3_client: Arc<S3Client>, bucket_name: String, region: String) -> Self {
        Self {
            s3_client,
            bucket_name,
            region,
        }
    }

    fn optimized_key(filename: &str) -> String {
        format!("{OPTIMIZED_FOLDER}/{filename}")
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, upload: &PreparedUpload) -> ObjectStoreResult<String> {
        let key = format!("{RAW_FOLDER}/{}", upload.object_name);

        self.s3_client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(&upload.content_type)
            .body(ByteStream::from(upload.bytes.clone()))
            .send()
            .await
            .map_err(|e| {
                let err = ObjectStoreError::from(e);
                error!(key, "Failed to upload object: {err}");
                err
            })?;

        info!(key, size = upload.bytes.len(), "Uploaded object");
        Ok(object_url(&self.bucket_name, &self.region, &key))
    }

    async fn fetch(&self, filename: &str) -> ObjectStoreResult<ByteStream> {
        let key = Self::optimized_key(filename);

        let result = self
            .s3_client
            .get_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output.body),
            Err(SdkError::ServiceError(service_err))
                if matches!(service_err.err(), GetObjectError::NoSuchKey(_)) =>
            {
                error!(key, "Object does not exist");
                Err(ObjectStoreError::NotFound(key))
            }
            Err(e) => {
                let err = ObjectStoreError::from(e);
                error!(key, "Failed to fetch object: {err}");
                Err(err)
            }
        }
    }

    async fn list(&self) -> ObjectStoreResult<Vec<String>> {
        let prefix = format!("{OPTIMIZED_FOLDER}/");
        let mut keys = Vec::new();
        let mut continuation_token = None;

        loop {
            let response = self
                .s3_client
                .list_objects_v2()
                .bucket(&self.bucket_name)
                .prefix(&prefix)
                .set_continuation_token(continuation_token)
                .send()
                .await
                .map_err(|e| {
                    let err = ObjectStoreError::from(e);
                    error!(prefix, "Failed to list objects: {err}");
                    err
                })?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match response.next_continuation_token() {
                Some(token) => continuation_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(listing_urls(&self.bucket_name, &self.region, &keys))
    }

    async fn delete(&self, filename: &str) -> ObjectStoreResult<()> {
        let key = Self::optimized_key(filename);

        self.s3_client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let err = ObjectStoreError::from(e);
                error!(key, "Failed to delete object: {err}");
                err
            })?;

        info!(key, "Deleted object");
        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! In-memory object store for tests
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};

    use axum::body::Bytes;

    use super::{
        async_trait, listing_urls, object_url, ByteStream, ObjectStore, ObjectStoreError,
        ObjectStoreResult, PreparedUpload, OPTIMIZED_FOLDER, RAW_FOLDER,
    };

    /// Object store keeping objects in a map keyed by full object key
    pub struct InMemoryObjectStore {
        bucket_name: String,
        region: String,
        objects: Mutex<BTreeMap<String, Bytes>>,
        calls: AtomicUsize,
        fail_uploads: AtomicBool,
        fail_deletes: AtomicBool,
        fail_fetches: AtomicBool,
        fail_lists: AtomicBool,
    }

    impl InMemoryObjectStore {
        /// Creates an empty store for `bucket_name` in `region`
        #[must_use]
        pub fn new(bucket_name: &str, region: &str) -> Self {
            Self {
                bucket_name: bucket_name.to_string(),
                region: region.to_string(),
                objects: Mutex::new(BTreeMap::new()),
                calls: AtomicUsize::new(0),
                fail_uploads: AtomicBool::new(false),
                fail_deletes: AtomicBool::new(false),
                fail_fetches: AtomicBool::new(false),
                fail_lists: AtomicBool::new(false),
            }
        }

        /// Puts an object directly, bypassing the trait and the call counter
        pub fn insert(&self, key: &str, bytes: impl Into<Bytes>) {
            self.objects
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key.to_string(), bytes.into());
        }

        /// All stored keys in lexicographic order
        #[must_use]
        pub fn keys(&self) -> Vec<String> {
            self.objects
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .keys()
                .cloned()
                .collect()
        }

        /// Number of trait operations invoked so far
        #[must_use]
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Makes every following upload fail
        pub fn fail_uploads(&self, fail: bool) {
            self.fail_uploads.store(fail, Ordering::SeqCst);
        }

        /// Makes every following delete fail
        pub fn fail_deletes(&self, fail: bool) {
            self.fail_deletes.store(fail, Ordering::SeqCst);
        }

        /// Makes every following fetch fail
        pub fn fail_fetches(&self, fail: bool) {
            self.fail_fetches.store(fail, Ordering::SeqCst);
        }

        /// Makes every following listing fail
        pub fn fail_lists(&self, fail: bool) {
            self.fail_lists.store(fail, Ordering::SeqCst);
        }

        fn record_call(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ObjectStore for InMemoryObjectStore {
        async fn upload(&self, upload: &PreparedUpload) -> ObjectStoreResult<String> {
            self.record_call();
            if self.fail_uploads.load(Ordering::SeqCst) {
                return Err(ObjectStoreError::S3Error("upload rejected".to_string()));
            }

            let key = format!("{RAW_FOLDER}/{}", upload.object_name);
            self.insert(&key, upload.bytes.clone());
            Ok(object_url(&self.bucket_name, &self.region, &key))
        }

        async fn fetch(&self, filename: &str) -> ObjectStoreResult<ByteStream> {
            self.record_call();
            if self.fail_fetches.load(Ordering::SeqCst) {
                return Err(ObjectStoreError::UpstreamError("fetch rejected".to_string()));
            }

            let key = format!("{OPTIMIZED_FOLDER}/{filename}");
            self.objects
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&key)
                .cloned()
                .map(ByteStream::from)
                .ok_or(ObjectStoreError::NotFound(key))
        }

        async fn list(&self) -> ObjectStoreResult<Vec<String>> {
            self.record_call();
            if self.fail_lists.load(Ordering::SeqCst) {
                return Err(ObjectStoreError::S3Error("AccessDenied".to_string()));
            }

            let prefix = format!("{OPTIMIZED_FOLDER}/");
            let keys: Vec<String> = self
                .keys()
                .into_iter()
                .filter(|key| key.starts_with(&prefix))
                .collect();

            Ok(listing_urls(&self.bucket_name, &self.region, &keys))
        }

        async fn delete(&self, filename: &str) -> ObjectStoreResult<()> {
            self.record_call();
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(ObjectStoreError::S3Error("delete rejected".to_string()));
            }

            // Deleting a missing key succeeds, as on S3
            self.objects
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&format!("{OPTIMIZED_FOLDER}/{filename}"));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::InMemoryObjectStore;
    use super::*;

    fn prepared(object_name: &str) -> PreparedUpload {
        PreparedUpload {
            object_name: object_name.to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![1u8, 2, 3].into(),
        }
    }

    #[test]
    fn test_object_url() {
        assert_eq!(
            object_url("bucket", "eu-west-1", "Raw-images/a.png"),
            "https://bucket.s3.eu-west-1.amazonaws.com/Raw-images/a.png"
        );
    }

    #[test]
    fn test_listing_drops_first_key() {
        let keys: Vec<String> = ["Optimize-images/", "Optimize-images/a.png", "Optimize-images/b.png"]
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(
            listing_urls("bucket", "us-east-1", &keys),
            vec![
                "https://bucket.s3.us-east-1.amazonaws.com/Optimize-images/a.png",
                "https://bucket.s3.us-east-1.amazonaws.com/Optimize-images/b.png",
            ]
        );
        assert!(listing_urls("bucket", "us-east-1", &keys[..1]).is_empty());
        assert!(listing_urls("bucket", "us-east-1", &[]).is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_upload_targets_raw_folder() {
        let store = InMemoryObjectStore::new("bucket", "us-east-1");
        let url = store
            .upload(&prepared("a.png?ext=png&size=1x1&filesize=1KB"))
            .await
            .unwrap();

        assert_eq!(
            url,
            "https://bucket.s3.us-east-1.amazonaws.com/Raw-images/a.png?ext=png&size=1x1&filesize=1KB"
        );
        assert_eq!(
            store.keys(),
            vec!["Raw-images/a.png?ext=png&size=1x1&filesize=1KB"]
        );
    }

    #[tokio::test]
    async fn test_in_memory_list_only_sees_optimized_folder() {
        let store = InMemoryObjectStore::new("bucket", "us-east-1");
        store.insert("Raw-images/raw.png", vec![0u8]);
        store.insert("Optimize-images/a.png", vec![0u8]);
        assert!(store.list().await.unwrap().is_empty());

        store.insert("Optimize-images/b.png", vec![0u8]);
        assert_eq!(
            store.list().await.unwrap(),
            vec!["https://bucket.s3.us-east-1.amazonaws.com/Optimize-images/b.png"]
        );
    }

    #[tokio::test]
    async fn test_in_memory_fetch_and_delete() {
        let store = InMemoryObjectStore::new("bucket", "us-east-1");
        store.insert("Optimize-images/a.png", vec![7u8, 8, 9]);

        let body = store.fetch("a.png").await.unwrap().collect().await.unwrap();
        assert_eq!(body.into_bytes().as_ref(), &[7, 8, 9]);

        store.delete("a.png").await.unwrap();
        assert!(matches!(
            store.fetch("a.png").await,
            Err(ObjectStoreError::NotFound(_))
        ));
        assert_eq!(store.call_count(), 3);
    }

    #[tokio::test]
    async fn test_in_memory_failure_toggles() {
        let store = InMemoryObjectStore::new("bucket", "us-east-1");
        store.fail_uploads(true);
        store.fail_deletes(true);
        store.fail_fetches(true);
        store.fail_lists(true);

        assert!(store.upload(&prepared("a.png")).await.is_err());
        assert!(store.list().await.is_err());
        assert!(store.delete("a.png").await.is_err());
        assert!(store.fetch("a.png").await.is_err());
        assert!(store.keys().is_empty());
    }
}
