//! Image record storage module for `DynamoDB` operations
//!
//! An image record maps a generated id to the public (optimized folder) URL of an
//! uploaded image. Records are written independently from the object store; nothing
//! in here knows whether the bytes behind `image_url` exist.

mod error;

use std::collections::HashMap;
use std::sync::Arc;

use aws_sdk_dynamodb::{
    error::SdkError,
    types::{AttributeValue, ReturnValue},
    Client as DynamoDbClient,
};
use chrono::Utc;
pub use error::{ImageRecordStorageError, ImageRecordStorageResult};
use serde::{Deserialize, Serialize};
use serde_dynamo::{from_item, from_items, to_item};
use strum::Display;
use tracing::debug;

/// `DynamoDB` item for an uploaded image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Primary key - unique record ID (UUID v4)
    pub id: String,
    /// Public URL of the image in the optimized folder
    pub image_url: String,
    /// Timestamp of record creation
    pub created_at: i64,
    /// Timestamp of the last URL change
    pub updated_at: i64,
}

/// `DynamoDB` attribute names for the image record table
#[derive(Debug, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ImageRecordAttribute {
    /// Primary key - unique record ID
    Id,
    /// Public image URL
    ImageUrl,
    /// Creation timestamp
    CreatedAt,
    /// Last update timestamp
    UpdatedAt,
}

/// Persistence operations for image records
///
/// Callers are expected to validate the shape of `id` before calling into the store.
#[async_trait::async_trait]
pub trait ImageRecordStore: Send + Sync {
    /// Creates a new record pointing at `image_url`
    async fn create(&self, image_url: &str) -> ImageRecordStorageResult<ImageRecord>;

    /// Returns every stored record, oldest first
    async fn find_all(&self) -> ImageRecordStorageResult<Vec<ImageRecord>>;

    /// Returns the record with the given id, if any
    async fn find_by_id(&self, id: &str) -> ImageRecordStorageResult<Option<ImageRecord>>;

    /// Replaces the URL of an existing record, returning the updated record
    ///
    /// Returns `Ok(None)` if no record with `id` exists.
    async fn update_by_id(
        &self,
        id: &str,
        image_url: &str,
    ) -> ImageRecordStorageResult<Option<ImageRecord>>;

    /// Deletes the record with the given id; deleting a missing record is not an error
    async fn delete_by_id(&self, id: &str) -> ImageRecordStorageResult<()>;
}

/// Storage client for image record operations
pub struct ImageRecordStorage {
    dynamodb_client: Arc<DynamoDbClient>,
    table_name: String,
}

impl ImageRecordStorage {
    /// Creates a new storage instance
    ///
    /// # Arguments
    ///
    /// * `dynamodb_client` - Pre-configured `DynamoDB` client
    /// * `table_name` - `DynamoDB` table name for image records
    #[must_use]
    pub const fn new(dynamodb_client: Arc<DynamoDbClient>, table_name: String) -> Self {
        Self {
            dynamodb_client,
            table_name,
        }
    }

    fn id_key(id: &str) -> (String, AttributeValue) {
        (
            ImageRecordAttribute::Id.to_string(),
            AttributeValue::S(id.to_string()),
        )
    }
}

#[async_trait::async_trait]
impl ImageRecordStore for ImageRecordStorage {
    async fn create(&self, image_url: &str) -> ImageRecordStorageResult<ImageRecord> {
        let now = Utc::now().timestamp();
        let record = ImageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            image_url: image_url.to_string(),
            created_at: now,
            updated_at: now,
        };

        let item = to_item(&record)?;

        self.dynamodb_client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await?;

        debug!(id = %record.id, "Created image record");

        Ok(record)
    }

    async fn find_all(&self) -> ImageRecordStorageResult<Vec<ImageRecord>> {
        let mut records = Vec::new();
        let mut exclusive_start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let response = self
                .dynamodb_client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(exclusive_start_key)
                .send()
                .await?;

            let items = response.items.unwrap_or_default();
            records.extend(from_items::<_, ImageRecord>(items)?);

            match response.last_evaluated_key {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key),
                _ => break,
            }
        }

        // Scan order is arbitrary, keep listings stable
        records.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

        Ok(records)
    }

    async fn find_by_id(&self, id: &str) -> ImageRecordStorageResult<Option<ImageRecord>> {
        let (key, value) = Self::id_key(id);
        let response = self
            .dynamodb_client
            .get_item()
            .table_name(&self.table_name)
            .key(key, value)
            .send()
            .await?;

        response
            .item()
            .map(|item| {
                from_item(item.clone())
                    .map_err(|e| ImageRecordStorageError::SerializationError(e.to_string()))
            })
            .transpose()
    }

    async fn update_by_id(
        &self,
        id: &str,
        image_url: &str,
    ) -> ImageRecordStorageResult<Option<ImageRecord>> {
        let (key, value) = Self::id_key(id);
        let result = self
            .dynamodb_client
            .update_item()
            .table_name(&self.table_name)
            .key(key, value)
            .update_expression("SET #image_url = :image_url, #updated_at = :updated_at")
            .condition_expression("attribute_exists(#id)")
            .expression_attribute_names("#id", ImageRecordAttribute::Id.to_string())
            .expression_attribute_names("#image_url", ImageRecordAttribute::ImageUrl.to_string())
            .expression_attribute_names("#updated_at", ImageRecordAttribute::UpdatedAt.to_string())
            .expression_attribute_values(":image_url", AttributeValue::S(image_url.to_string()))
            .expression_attribute_values(
                ":updated_at",
                AttributeValue::N(Utc::now().timestamp().to_string()),
            )
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(SdkError::ServiceError(ref svc))
                if svc.err().is_conditional_check_failed_exception() =>
            {
                debug!(id, "Image record vanished before update");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        response
            .attributes
            .map(|attributes| from_item(attributes).map_err(ImageRecordStorageError::from))
            .transpose()
    }

    async fn delete_by_id(&self, id: &str) -> ImageRecordStorageResult<()> {
        let (key, value) = Self::id_key(id);
        self.dynamodb_client
            .delete_item()
            .table_name(&self.table_name)
            .key(key, value)
            .send()
            .await?;

        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! In-memory [`ImageRecordStore`] used by router tests

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};

    use chrono::Utc;

    use super::{ImageRecord, ImageRecordStorageResult, ImageRecordStore};

    /// Record store keeping records in insertion order
    #[derive(Default)]
    pub struct InMemoryImageRecordStore {
        records: Mutex<Vec<ImageRecord>>,
        calls: AtomicUsize,
    }

    impl InMemoryImageRecordStore {
        /// Creates an empty store
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Inserts a record as-is, bypassing id generation
        pub fn insert(&self, record: ImageRecord) {
            self.records
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(record);
        }

        /// Snapshot of the stored records
        #[must_use]
        pub fn records(&self) -> Vec<ImageRecord> {
            self.records
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Number of store operations performed so far
        #[must_use]
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn track(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl ImageRecordStore for InMemoryImageRecordStore {
        async fn create(&self, image_url: &str) -> ImageRecordStorageResult<ImageRecord> {
            self.track();
            let now = Utc::now().timestamp();
            let record = ImageRecord {
                id: uuid::Uuid::new_v4().to_string(),
                image_url: image_url.to_string(),
                created_at: now,
                updated_at: now,
            };
            self.insert(record.clone());
            Ok(record)
        }

        async fn find_all(&self) -> ImageRecordStorageResult<Vec<ImageRecord>> {
            self.track();
            Ok(self.records())
        }

        async fn find_by_id(&self, id: &str) -> ImageRecordStorageResult<Option<ImageRecord>> {
            self.track();
            Ok(self.records().into_iter().find(|record| record.id == id))
        }

        async fn update_by_id(
            &self,
            id: &str,
            image_url: &str,
        ) -> ImageRecordStorageResult<Option<ImageRecord>> {
            self.track();
            let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
            Ok(records.iter_mut().find(|record| record.id == id).map(|record| {
                record.image_url = image_url.to_string();
                record.updated_at = Utc::now().timestamp();
                record.clone()
            }))
        }

        async fn delete_by_id(&self, id: &str) -> ImageRecordStorageResult<()> {
            self.track();
            self.records
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|record| record.id != id);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::InMemoryImageRecordStore;
    use super::*;

    #[test]
    fn test_image_record_attribute_names() {
        assert_eq!(ImageRecordAttribute::Id.to_string(), "id");
        assert_eq!(ImageRecordAttribute::ImageUrl.to_string(), "image_url");
        assert_eq!(ImageRecordAttribute::CreatedAt.to_string(), "created_at");
        assert_eq!(ImageRecordAttribute::UpdatedAt.to_string(), "updated_at");
    }

    #[test]
    fn test_image_record_item_uses_attribute_names() {
        let record = ImageRecord {
            id: "6f1c2a9e-8d0b-4c55-9a43-3f4e2b1d7c10".to_string(),
            image_url: "https://bucket.s3.us-east-1.amazonaws.com/Optimize-images/a.png"
                .to_string(),
            created_at: 1_700_000_000,
            updated_at: 1_700_000_100,
        };

        let item: HashMap<String, AttributeValue> = to_item(&record).unwrap();

        assert_eq!(
            item.get("image_url"),
            Some(&AttributeValue::S(record.image_url.clone()))
        );
        assert_eq!(
            item.get("created_at"),
            Some(&AttributeValue::N("1700000000".to_string()))
        );

        let parsed: ImageRecord = from_item(item).unwrap();
        assert_eq!(parsed, record);
    }

    #[tokio::test]
    async fn test_in_memory_store_update_and_delete() {
        let store = InMemoryImageRecordStore::new();
        let created = store.create("https://example.com/a.png").await.unwrap();

        let updated = store
            .update_by_id(&created.id, "https://example.com/b.png")
            .await
            .unwrap()
            .expect("record should exist");
        assert_eq!(updated.image_url, "https://example.com/b.png");

        assert!(store
            .update_by_id("missing", "https://example.com/c.png")
            .await
            .unwrap()
            .is_none());

        store.delete_by_id(&created.id).await.unwrap();
        assert!(store.find_by_id(&created.id).await.unwrap().is_none());
        assert_eq!(store.call_count(), 5);
    }
}
