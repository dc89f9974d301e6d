//! Image store types

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};

use crate::error::Result;

/// A decoded image together with the format it was stored in
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub image: DynamicImage,
    pub format: ImageFormat,
}

/// Persistence for encoded image variants, addressed by logical path
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Encode `image` as `format` and persist it under `path`.
    ///
    /// Returns the number of bytes written. The bytes must be retrievable
    /// through [`ImageStore::load`] once this returns `Ok`.
    async fn save(&self, image: &DynamicImage, format: ImageFormat, path: &str) -> Result<u64>;

    /// Load and decode the image stored under `path`
    async fn load(&self, path: &str) -> Result<StoredImage>;
}
