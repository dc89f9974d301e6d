//! Filesystem-backed image store

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::error::{ImageStoreError, Result};
use crate::types::{ImageStore, StoredImage};

/// Distinguishes temp files of concurrent writes to the same path
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stores encoded images as files below a root directory.
///
/// The logical path is used verbatim as the relative file path, so
/// `thumb/cat.jpg` lands at `<root>/thumb/cat.jpg`. Writes go to a sibling
/// temp file first and are renamed into place, so a reader never observes a
/// partially written image.
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a logical path to a file below the root.
    ///
    /// Every `/`-separated segment must be a plain name. Empty and `.`
    /// segments are rejected along with `..` and absolute paths: the
    /// filesystem would fold `thumb//cat.png` or `a/./b.png` onto another
    /// path's file while the cache keys them separately.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let plain = !path.is_empty()
            && path.split('/').all(|segment| {
                let mut components = Path::new(segment).components();
                matches!(
                    (components.next(), components.next()),
                    (Some(Component::Normal(name)), None) if name == segment
                )
            });

        if !plain {
            return Err(ImageStoreError::InvalidPath(path.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn save(&self, image: &DynamicImage, format: ImageFormat, path: &str) -> Result<u64> {
        let target = self.resolve(path)?;

        let image = image.clone();
        let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let mut buf = Cursor::new(Vec::new());
            image
                .write_to(&mut buf, format)
                .map_err(|e| ImageStoreError::Encode(Box::new(e)))?;
            Ok(buf.into_inner())
        })
        .await??;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = target.with_file_name(format!(
            ".{}.{}.{}.tmp",
            file_name,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = tokio::fs::write(&temp, &bytes).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(path, size = bytes.len(), ?format, "Saved image");
        Ok(bytes.len() as u64)
    }

    async fn load(&self, path: &str) -> Result<StoredImage> {
        let target = self.resolve(path)?;

        let bytes = match tokio::fs::read(&target).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ImageStoreError::NotFound(path.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        // Magic bytes are authoritative; the extension is only a fallback
        let format = image::guess_format(&bytes)
            .ok()
            .or_else(|| ImageFormat::from_path(&target).ok())
            .ok_or_else(|| ImageStoreError::UnknownFormat(path.to_string()))?;

        let image = tokio::task::spawn_blocking(move || {
            image::load_from_memory_with_format(&bytes, format)
                .map_err(|e| ImageStoreError::Decode(Box::new(e)))
        })
        .await??;

        debug!(path, ?format, "Loaded image");
        Ok(StoredImage { image, format })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::tempdir;

    fn sample_rgba() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(8, 6, |x, y| {
            Rgba([(x * 30) as u8, (y * 40) as u8, 200, 255])
        }))
    }

    #[tokio::test]
    async fn test_save_and_load_png() {
        let dir = tempdir().unwrap();
        let store = FsImageStore::new(dir.path());
        let image = sample_rgba();

        let size = store
            .save(&image, ImageFormat::Png, "thumb/cat.png")
            .await
            .unwrap();

        let on_disk = std::fs::metadata(dir.path().join("thumb/cat.png")).unwrap();
        assert_eq!(size, on_disk.len());

        let stored = store.load("thumb/cat.png").await.unwrap();
        assert_eq!(stored.format, ImageFormat::Png);
        assert_eq!(stored.image.to_rgba8(), image.to_rgba8());
    }

    #[tokio::test]
    async fn test_jpeg_format_detected_from_bytes() {
        let dir = tempdir().unwrap();
        let store = FsImageStore::new(dir.path());
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([10, 120, 30])));

        // Extension deliberately disagrees with the encoding
        store
            .save(&image, ImageFormat::Jpeg, "small/cat.png")
            .await
            .unwrap();

        let stored = store.load("small/cat.png").await.unwrap();
        assert_eq!(stored.format, ImageFormat::Jpeg);
        assert_eq!(stored.image.width(), 16);
        assert_eq!(stored.image.height(), 16);
    }

    #[tokio::test]
    async fn test_load_missing_image() {
        let dir = tempdir().unwrap();
        let store = FsImageStore::new(dir.path());

        let result = store.load("thumb/missing.jpg").await;
        assert!(matches!(result, Err(ImageStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempdir().unwrap();
        let store = FsImageStore::new(dir.path());
        let image = sample_rgba();

        for path in ["", "../outside.png", "/etc/cat.png", "a/../../b.png"] {
            let result = store.save(&image, ImageFormat::Png, path).await;
            assert!(
                matches!(result, Err(ImageStoreError::InvalidPath(_))),
                "expected {path:?} to be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_rejects_paths_the_filesystem_would_fold() {
        let dir = tempdir().unwrap();
        let store = FsImageStore::new(dir.path());
        let image = sample_rgba();

        for path in ["thumb//cat.png", "a/./b.png", "./cat.png", "thumb/", "thumb/."] {
            let result = store.save(&image, ImageFormat::Png, path).await;
            assert!(
                matches!(result, Err(ImageStoreError::InvalidPath(_))),
                "expected {path:?} to be rejected"
            );
            assert!(matches!(
                store.load(path).await,
                Err(ImageStoreError::InvalidPath(_))
            ));
        }

        let written: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let store = FsImageStore::new(dir.path());

        store
            .save(&sample_rgba(), ImageFormat::Png, "a.png")
            .await
            .unwrap();
        store
            .save(&sample_rgba(), ImageFormat::Png, "a.png")
            .await
            .unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("a.png")]);
    }

    #[tokio::test]
    async fn test_save_fails_when_root_is_a_file() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("not-a-dir");
        std::fs::write(&root, b"occupied").unwrap();
        let store = FsImageStore::new(&root);

        let result = store
            .save(&sample_rgba(), ImageFormat::Png, "thumb/cat.png")
            .await;
        assert!(matches!(result, Err(ImageStoreError::Io(_))));
    }
}
