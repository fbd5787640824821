use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the taskboard pipeline.
#[derive(Error, Debug)]
pub enum TaskboardError {
    /// The decoded file contained no data rows.
    #[error("The file contains no rows")]
    EmptyInput,

    /// One or more logical fields could not be matched to a source header.
    ///
    /// `missing` holds the display names of every unresolved field, in
    /// field-table order.
    #[error("Missing required columns: {}", missing.join(", "))]
    MissingRequiredColumns { missing: Vec<String> },

    /// The file could not be opened or decoded.
    #[error("Cannot read file {path}: {reason}")]
    UnreadableInput { path: PathBuf, reason: String },

    /// A rendered report could not be written to its destination.
    #[error("Failed to deliver export to {destination}: {source}")]
    ExportDelivery {
        destination: String,
        #[source]
        source: std::io::Error,
    },

    /// A load was requested while another one is still running.
    #[error("A file is already being loaded")]
    LoadInProgress,

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A JSON document could not be parsed or produced.
    #[error("Failed to process JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TaskboardError {
    /// Build an [`TaskboardError::UnreadableInput`] from any displayable cause.
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::UnreadableInput {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// `true` for failures after which the raw records are still worth keeping.
    pub fn keeps_raw_records(&self) -> bool {
        matches!(self, Self::MissingRequiredColumns { .. })
    }
}

/// Convenience alias used throughout the taskboard crates.
pub type Result<T> = std::result::Result<T, TaskboardError>;
