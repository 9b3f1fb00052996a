mod environment;
mod error;
mod extractors;

pub use environment::Environment;
pub use error::{handle_panic, AppError};
pub use extractors::{ImageId, ImageUpload};
