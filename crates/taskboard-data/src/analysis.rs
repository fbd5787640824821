//! Load pipeline: raw table → resolved columns → task collection.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use taskboard_core::columns::{resolve_columns, ColumnAliases, ColumnMapping};
use taskboard_core::models::{RawTable, Task};
use taskboard_core::normalizer::RowNormalizer;
use taskboard_core::{Result, TaskboardError};
use tracing::{debug, info};

use crate::reader::read_table;

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata produced alongside a loaded dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetMetadata {
    /// File the dataset was read from.
    pub source: String,
    /// RFC 3339 timestamp when the dataset was built.
    pub loaded_at: String,
    /// Non-blank rows decoded from the file.
    pub rows_read: usize,
    /// Rows whose story point could not be read as a number.
    pub unscored: usize,
    /// Rows without any recognisable week label.
    pub unlabelled: usize,
    /// Wall-clock seconds spent decoding and normalising.
    pub load_time_seconds: f64,
}

impl DatasetMetadata {
    /// Summarise a freshly built task collection.
    pub fn describe(source: &Path, raw: &RawTable, tasks: &[Task], started: Instant) -> Self {
        Self {
            source: source.display().to_string(),
            loaded_at: Utc::now().to_rfc3339(),
            rows_read: raw.len(),
            unscored: tasks.iter().filter(|t| !t.is_scored()).count(),
            unlabelled: tasks.iter().filter(|t| t.weeks.is_empty()).count(),
            load_time_seconds: started.elapsed().as_secs_f64(),
        }
    }
}

/// A successfully loaded file.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub raw: RawTable,
    pub mapping: ColumnMapping,
    pub tasks: Vec<Task>,
    pub metadata: DatasetMetadata,
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Resolve columns and normalise every raw record.
///
/// Fails with [`TaskboardError::EmptyInput`] when the table has no rows and
/// with [`TaskboardError::MissingRequiredColumns`] when a logical field is
/// unresolved. The raw table is left untouched either way.
pub fn build_tasks(raw: &RawTable, aliases: &ColumnAliases) -> Result<(ColumnMapping, Vec<Task>)> {
    if raw.is_empty() {
        return Err(TaskboardError::EmptyInput);
    }

    let mapping = resolve_columns(&raw.headers, aliases)?;
    let tasks = RowNormalizer::new(&mapping).normalize_all(&raw.records);
    Ok((mapping, tasks))
}

/// Read `path` and build a [`Dataset`] in one go.
pub fn load_dataset(path: &Path, aliases: &ColumnAliases) -> Result<Dataset> {
    let start = Instant::now();

    let raw = read_table(path)?;
    let (mapping, tasks) = build_tasks(&raw, aliases)?;

    let metadata = DatasetMetadata::describe(path, &raw, &tasks, start);

    debug!(
        "Dataset built in {:.3}s: {} unscored, {} unlabelled",
        metadata.load_time_seconds, metadata.unscored, metadata.unlabelled
    );
    info!("Loaded {} tasks from {}", tasks.len(), metadata.source);

    Ok(Dataset {
        raw,
        mapping,
        tasks,
        metadata,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
