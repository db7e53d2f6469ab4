//! Error types for index inspection
//!
//! This module defines the error taxonomy used throughout the inspector. Most
//! of these errors never abort a whole run: the walker converts failures below
//! the root index into report diagnostics and keeps going.

use crate::identifiers::Fingerprint;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for all inspection operations
#[derive(Debug, Error)]
pub enum InspectError {
    /// IO operations failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not parse as a recognized collection index
    #[error("Not a collection index file: {} ({reason})", path.display())]
    NotAnIndexFile { path: PathBuf, reason: String },

    /// The index opened but its internal structure is inconsistent
    #[error("Corrupt index {}: {reason}", path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    /// A fingerprint was queried that pass 1 never registered
    #[error("Unknown variable fingerprint {0}")]
    UnknownFingerprint(Fingerprint),

    /// A record references a file number outside the index's file table
    #[error("Unknown file number {fileno} (file table has {table_len} entries)")]
    UnknownFileNumber { fileno: u32, table_len: usize },

    /// The registry was used out of phase (e.g. queried before totals were sealed)
    #[error("Registry phase violation: {operation} is not allowed while {phase}")]
    RegistryPhase { operation: String, phase: String },

    /// Configuration validation failed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input validation failed
    #[error("Invalid input: {field} - {reason}. {suggestion}")]
    InvalidInput {
        field: String,
        reason: String,
        suggestion: String,
    },

    /// Catalog or report (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl InspectError {
    /// Create a not-an-index error for the given path
    pub fn not_an_index(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::NotAnIndexFile {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a corrupt-index error for the given path
    pub fn corrupt_index(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::CorruptIndex {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a registry phase violation
    pub fn registry_phase(operation: impl Into<String>, phase: impl Into<String>) -> Self {
        Self::RegistryPhase {
            operation: operation.into(),
            phase: phase.into(),
        }
    }

    /// Create a detailed config error
    pub fn config_error(field: impl Into<String>, reason: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Config(format!("{} - {}: {}", field.into(), reason.into(), suggestion.into()))
    }

    /// Create an invalid input error
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Check if this error only affects the index or record it was raised for
    ///
    /// Recoverable errors are turned into report diagnostics by the walker;
    /// the others indicate a misuse of the API and are propagated.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::NotAnIndexFile { .. }
                | Self::CorruptIndex { .. }
                | Self::UnknownFingerprint(_)
                | Self::UnknownFileNumber { .. }
        )
    }

    /// Short, stable label for the error kind, used in report diagnostics
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::NotAnIndexFile { .. } => "not-an-index",
            Self::CorruptIndex { .. } => "corrupt-index",
            Self::UnknownFingerprint(_) => "unknown-fingerprint",
            Self::UnknownFileNumber { .. } => "unknown-file-number",
            Self::RegistryPhase { .. } => "registry-phase",
            Self::Config(_) => "config",
            Self::InvalidInput { .. } => "invalid-input",
            Self::Serialization(_) => "serialization",
        }
    }

    /// Add file context to an error, preserving the original error information
    pub fn with_file_context(self, file_path: impl AsRef<Path>, operation: &str) -> Self {
        let context = format!("{} (file: {})", operation, file_path.as_ref().display());

        match self {
            Self::Io(ref err) => Self::Io(std::io::Error::new(err.kind(), format!("{}: {}", context, err))),
            Self::Config(ref msg) => Self::Config(format!("{}: {}", context, msg)),
            Self::Serialization(ref msg) => Self::Serialization(format!("{}: {}", context, msg)),
            _ => self, // structured errors already carry their path
        }
    }
}

impl From<serde_json::Error> for InspectError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
