//! Image store for the pixlserv cache
//!
//! Persists encoded image variants addressed by a logical path and loads them
//! back as decoded images. The cache core only records metadata; the bytes
//! live behind the [`ImageStore`] trait.

mod error;
mod fs;
mod types;

pub use error::{ImageStoreError, Result};
pub use fs::FsImageStore;
pub use image::{DynamicImage, ImageFormat};
pub use types::{ImageStore, StoredImage};
