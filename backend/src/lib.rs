//! Image Optimization API
//!
//! Accepts image uploads, stores them in S3 for the optimization pipeline and
//! keeps one record per image pointing at its optimized copy.

/// Rewrites between raw upload URLs and public image URLs
pub mod image_url;

/// S3 gateway for image objects
pub mod object_store;

/// HTTP routes and handlers
pub mod routes;

/// Server setup
pub mod server;

/// Shared API types
pub mod types;

/// Upload validation and naming
pub mod upload_policy;
