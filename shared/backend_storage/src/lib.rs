//! Backend storage services for the image API
//!
//! This crate provides the `DynamoDB` persistence for image records, together with
//! the [`image_record::ImageRecordStore`] trait the HTTP layer depends on.

pub mod image_record;
