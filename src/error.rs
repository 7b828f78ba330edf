//! Error types for the DLL checker.
//!
//! These errors describe why a single file could not be decoded. They
//! never escape [`crate::classify_file`]: the classifier turns every one
//! of them into an [`crate::ArchitectureVerdict`].

use thiserror::Error;

/// Primary error type for header decoding.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The file does not exist.
    #[error("File not found: {path}")]
    NotFound { path: String },

    /// The file exists but cannot be opened for reading.
    #[error("Access denied: {path}")]
    AccessDenied { path: String },

    /// Any other IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A structure extends past the end of the file.
    #[error("Truncated data at offset {offset}: expected {expected} bytes, got {available}")]
    Truncated {
        offset: u64,
        expected: usize,
        available: u64,
    },

    /// Seek target lies beyond the end of the file.
    #[error("Offset 0x{offset:X} is out of range for a file of {len} bytes")]
    OutOfRange { offset: u64, len: u64 },

    /// Missing or garbled signature.
    #[error("Invalid PE file: {reason}")]
    InvalidFile { reason: String },

    /// A relative virtual address that no section covers.
    #[error("RVA 0x{rva:08X} does not map into any section")]
    UnmappableAddress { rva: u32 },
}

impl ClassifierError {
    /// Build an [`ClassifierError::InvalidFile`] from a reason.
    pub fn invalid(reason: impl Into<String>) -> Self {
        ClassifierError::InvalidFile {
            reason: reason.into(),
        }
    }

    /// Whether this error describes file structure rather than an IO failure.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            ClassifierError::Truncated { .. }
                | ClassifierError::OutOfRange { .. }
                | ClassifierError::InvalidFile { .. }
                | ClassifierError::UnmappableAddress { .. }
        )
    }
}

/// Result type alias for decoding operations.
pub type Result<T> = std::result::Result<T, ClassifierError>;
