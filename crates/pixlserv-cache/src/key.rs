//! Cache key derivation

use std::fmt;

use crate::error::{CacheError, Result};

/// Namespace for cache records in the metadata store
pub const KEY_PREFIX: &str = "image:";

/// A validated image path and the metadata store key derived from it.
///
/// The store key is the constant prefix followed by the path, unmodified, so
/// distinct paths always map to distinct store keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    path: String,
    store_key: String,
}

impl CacheKey {
    pub fn new(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(CacheError::InvalidKey("empty path".to_string()));
        }

        Ok(Self {
            path: path.to_string(),
            store_key: format!("{}{}", KEY_PREFIX, path),
        })
    }

    /// The logical image path, as handed to the image store
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The key used in the metadata store
    pub fn store_key(&self) -> &str {
        &self.store_key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_store_key_scheme() {
        let key = CacheKey::new("thumb/cat.jpg").unwrap();
        assert_eq!(key.path(), "thumb/cat.jpg");
        assert_eq!(key.store_key(), "image:thumb/cat.jpg");
        assert_eq!(key.to_string(), "thumb/cat.jpg");
    }

    #[test]
    fn test_empty_path_rejected() {
        assert!(matches!(CacheKey::new(""), Err(CacheError::InvalidKey(_))));
    }

    #[test]
    fn test_distinct_paths_give_distinct_keys() {
        // Paths that normalising code would be tempted to merge
        let paths = [
            "thumb/cat.jpg",
            "thumb//cat.jpg",
            "./thumb/cat.jpg",
            "thumb/cat.jpg ",
            "Thumb/cat.jpg",
            "image:thumb/cat.jpg",
            "thumb/cat.JPG",
        ];

        let keys: HashSet<String> = paths
            .iter()
            .map(|p| CacheKey::new(p).unwrap().store_key().to_string())
            .collect();
        assert_eq!(keys.len(), paths.len());
    }
}
