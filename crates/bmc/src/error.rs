//! Error types for BMC operations.

use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::detect::Manufacturer;

/// Process exit code for a successful command.
pub const EXIT_SUCCESS: i32 = 0;
/// Process exit code for any error without a more specific code.
pub const EXIT_GENERAL_ERROR: i32 = 1;
/// Process exit code for transport, DNS and TLS failures.
pub const EXIT_CONNECTION_ERROR: i32 = 2;
/// Process exit code when the vendor lacks the requested capability.
pub const EXIT_NOT_IMPLEMENTED: i32 = 3;
/// Process exit code for rejected arguments.
pub const EXIT_INVALID_ARGUMENTS: i32 = 4;
/// Process exit code for a missing input file.
pub const EXIT_FILE_NOT_FOUND: i32 = 5;
/// Process exit code for an exceeded deadline.
pub const EXIT_TIMEOUT: i32 = 6;

/// Errors that can occur while talking to a BMC.
#[derive(Debug, Error)]
pub enum BmcError {
    /// Transport, DNS or TLS failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// Credentials rejected, including after a session refresh.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Detection found no known vendor.
    #[error("unsupported manufacturer: {0}")]
    UnsupportedManufacturer(String),

    /// The resolved vendor does not provide this feature.
    #[error("{feature} is not implemented for manufacturer {manufacturer}")]
    NotImplementedForVendor {
        feature: String,
        manufacturer: Manufacturer,
    },

    /// Malformed boot order, unknown MAC address and similar.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Input file does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A conditional write was rejected twice in a row.
    #[error("ETag conflict on {0}: resource changed again after refetch")]
    ETagConflict(String),

    /// Deadline exceeded.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The management API answered with an unexpected status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for BMC operations.
pub type Result<T> = std::result::Result<T, BmcError>;

impl BmcError {
    /// Build a [`BmcError::NotImplementedForVendor`].
    pub fn not_implemented(feature: impl Display, manufacturer: Manufacturer) -> Self {
        Self::NotImplementedForVendor {
            feature: feature.to_string(),
            manufacturer,
        }
    }

    /// Exit code reported to the shell for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Connection(_) => EXIT_CONNECTION_ERROR,
            Self::NotImplementedForVendor { .. } => EXIT_NOT_IMPLEMENTED,
            Self::InvalidArgument(_) => EXIT_INVALID_ARGUMENTS,
            Self::FileNotFound(_) => EXIT_FILE_NOT_FOUND,
            Self::Timeout(_) => EXIT_TIMEOUT,
            Self::Authentication(_)
            | Self::UnsupportedManufacturer(_)
            | Self::ETagConflict(_)
            | Self::Api { .. }
            | Self::Serialization(_)
            | Self::Io(_) => EXIT_GENERAL_ERROR,
        }
    }
}
