//! Error types for the image store

use std::fmt;

#[derive(Debug)]
pub enum ImageStoreError {
    Io(Box<std::io::Error>),
    Encode(Box<image::ImageError>),
    Decode(Box<image::ImageError>),
    NotFound(String),
    InvalidPath(String),
    UnknownFormat(String),
    Task(String),
}

impl fmt::Display for ImageStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageStoreError::Io(err) => write!(f, "IO error: {}", err),
            ImageStoreError::Encode(err) => write!(f, "Encode error: {}", err),
            ImageStoreError::Decode(err) => write!(f, "Decode error: {}", err),
            ImageStoreError::NotFound(path) => write!(f, "Image not found: {}", path),
            ImageStoreError::InvalidPath(path) => write!(f, "Invalid image path: {}", path),
            ImageStoreError::UnknownFormat(path) => {
                write!(f, "Unknown image format: {}", path)
            }
            ImageStoreError::Task(msg) => write!(f, "Blocking task failed: {}", msg),
        }
    }
}

impl std::error::Error for ImageStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageStoreError::Io(err) => Some(err.as_ref()),
            ImageStoreError::Encode(err) => Some(err.as_ref()),
            ImageStoreError::Decode(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ImageStoreError {
    fn from(err: std::io::Error) -> Self {
        ImageStoreError::Io(Box::new(err))
    }
}

impl From<tokio::task::JoinError> for ImageStoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        ImageStoreError::Task(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ImageStoreError>;
