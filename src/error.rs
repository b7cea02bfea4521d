//! Custom error types for upsample.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the upsample library.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a file.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bytes could not be decoded as an image.
    #[error("failed to decode image{}: {source}", path_suffix(.path))]
    Decode {
        path: Option<PathBuf>,
        #[source]
        source: image::ImageError,
    },

    /// Failed to encode or write an image file.
    #[error("failed to save image to {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Requested region does not fit inside the image.
    #[error("requested {requested_height}x{requested_width} exceeds image size {height}x{width}")]
    Size {
        requested_height: usize,
        requested_width: usize,
        height: usize,
        width: usize,
    },

    /// Image carries a different number of channels than declared.
    #[error("channel mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    /// Interpolation method is unknown or not implemented.
    #[error("resize method `{method}` is not implemented")]
    NotImplemented { method: String },

    /// Record does not contain a required key.
    #[error("key `{key}` not found in record")]
    MissingKey { key: String },

    /// Stored config file is malformed or could not be encoded.
    #[error("config file {path} is malformed: {source}")]
    ConfigFormat {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Shape mismatch in array operations.
    #[error("array shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" from {}", p.display()))
        .unwrap_or_default()
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for upsample operations.
pub type Result<T> = std::result::Result<T, Error>;
