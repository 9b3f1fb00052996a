mod docs;
mod health;
pub mod images;

use aide::axum::{
    routing::{delete, get, post, put},
    ApiRouter,
};

pub use docs::API_TITLE;

/// Creates the router with all handler routes
pub fn handler() -> ApiRouter {
    ApiRouter::new()
        .merge(docs::handler())
        .route("/", axum::routing::get(images::welcome))
        .api_route("/health", get(health::handler))
        .api_route("/api/images/upload", post(images::upload_image))
        .api_route("/api/images/list", get(images::list_images))
        .api_route("/api/images/list/{id}", get(images::get_image))
        .api_route("/api/images/image/{id}", put(images::update_image))
        .api_route("/api/images/delete/{id}", delete(images::delete_image))
        .api_route("/api/images/download/{id}", get(images::download_image))
        .api_route("/api/images/AWS/S3/list", get(images::list_bucket_images))
}
