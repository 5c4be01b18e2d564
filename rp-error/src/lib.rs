//! Unified error handling for the raphael device-support crates
//!
//! This crate provides the error type shared by the fingerprint bridge, the
//! property layer and the variant selector. It uses thiserror for the Display
//! and Error impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using RaphaelError
pub type Result<T> = std::result::Result<T, RaphaelError>;

/// Unified error type for all raphael operations
#[derive(thiserror::Error, Debug)]
pub enum RaphaelError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Invalid path {path}: {reason}")]
    InvalidPath {
        path: PathBuf,
        reason: String,
    },

    // ============================================================================
    // Vendor HAL Errors
    // ============================================================================
    #[error("No HAL library found for module {0}")]
    ModuleNotFound(String),

    #[error("Failed to load HAL module {module}: {reason}")]
    ModuleLoad {
        module: String,
        reason: String,
    },

    #[error("Failed to open HAL module {module}: error {code}")]
    ModuleOpen {
        module: String,
        code: i32,
    },

    #[error("Wrong fingerprint HAL version: expected {expected:#06x}, got {actual:#06x}")]
    VersionMismatch {
        expected: u32,
        actual: u32,
    },

    #[error("Failed to register fingerprint module callback: error {0}")]
    NotifyRegistration(i32),

    // ============================================================================
    // System Property Errors
    // ============================================================================
    #[error("Failed to set property {key}: {reason}")]
    PropertyWrite {
        key: String,
        reason: String,
    },

    #[error("Invalid property {key}: {reason}")]
    InvalidProperty {
        key: String,
        reason: String,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl RaphaelError {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a module load error
    pub fn module_load(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModuleLoad {
            module: module.into(),
            reason: reason.into(),
        }
    }

    /// Create a property write error
    pub fn property_write(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PropertyWrite {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_mismatch_display_is_hex() {
        let err = RaphaelError::VersionMismatch { expected: 0x0201, actual: 0x0100 };
        assert_eq!(
            err.to_string(),
            "Wrong fingerprint HAL version: expected 0x0201, got 0x0100"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err: RaphaelError = io_err.into();
        assert!(matches!(err, RaphaelError::Io(_)));
    }
}
