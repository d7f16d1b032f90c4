//! Upload type checks and image preparation for the recognition pipeline.

pub mod image;
pub mod mime_detect;

pub use self::image::{ImageCrateScaler, fit_within, scaled_copy_path};
pub use self::mime_detect::{extension_of, is_allowed_upload};
