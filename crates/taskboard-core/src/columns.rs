//! Heuristic matching of loosely named source headers to logical fields.
//!
//! Export files from different trackers name the same column differently
//! (`Story Points`, `story_point`, `SP`…). Every header and every alias is
//! normalised (lower-cased, underscores, hyphens and whitespace removed) and
//! compared for equality; the first header in source order wins.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, TaskboardError};

// ── LogicalField ──────────────────────────────────────────────────────────────

/// A column the normaliser needs, independent of how the source spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalField {
    TaskKey,
    IssueType,
    Assignee,
    StoryPoint,
    Name,
    Labels,
    EpicLink,
    Module,
    Status,
}

impl LogicalField {
    /// Every logical field, in the order failures are reported.
    pub const ALL: [LogicalField; 9] = [
        LogicalField::TaskKey,
        LogicalField::IssueType,
        LogicalField::Assignee,
        LogicalField::StoryPoint,
        LogicalField::Name,
        LogicalField::Labels,
        LogicalField::EpicLink,
        LogicalField::Module,
        LogicalField::Status,
    ];

    /// Human-readable name used in error messages.
    pub fn display_name(self) -> &'static str {
        match self {
            LogicalField::TaskKey => "Task Key",
            LogicalField::IssueType => "Issue Type",
            LogicalField::Assignee => "Assignee",
            LogicalField::StoryPoint => "Story Point",
            LogicalField::Name => "Summary",
            LogicalField::Labels => "Labels",
            LogicalField::EpicLink => "Epic Link",
            LogicalField::Module => "Module",
            LogicalField::Status => "Status",
        }
    }

    /// Key used for this field in alias files.
    pub fn key(self) -> &'static str {
        match self {
            LogicalField::TaskKey => "task_key",
            LogicalField::IssueType => "issue_type",
            LogicalField::Assignee => "assignee",
            LogicalField::StoryPoint => "story_point",
            LogicalField::Name => "name",
            LogicalField::Labels => "labels",
            LogicalField::EpicLink => "epic_link",
            LogicalField::Module => "module",
            LogicalField::Status => "status",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    fn builtin_aliases(self) -> &'static [&'static str] {
        match self {
            LogicalField::TaskKey => &["Task Key", "Key", "Issue Key", "Task ID", "Task", "ID"],
            LogicalField::IssueType => &["Issue Type", "Type", "Task Type"],
            LogicalField::Assignee => &["Assignee", "Owner", "Assigned To", "PIC"],
            LogicalField::StoryPoint => &[
                "Story Point",
                "Story Points",
                "Story Point Estimate",
                "SP",
                "Points",
                "Difficulty",
            ],
            LogicalField::Name => &["Summary", "Name", "Task Name", "Title"],
            LogicalField::Labels => &["Labels", "Label", "Week", "Weeks"],
            LogicalField::EpicLink => &["Epic Link", "Epic", "Epic Name", "Parent"],
            LogicalField::Module => &["Module", "Module Name", "Component", "Components"],
            LogicalField::Status => &["Status", "State"],
        }
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Lower-case `text` and drop underscores, hyphens and whitespace.
pub fn normalize_header(text: &str) -> String {
    text.chars()
        .filter(|c| !(c.is_whitespace() || *c == '_' || *c == '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

// ── ColumnAliases ─────────────────────────────────────────────────────────────

/// Ordered table of logical field → accepted (normalised) aliases.
#[derive(Debug, Clone)]
pub struct ColumnAliases {
    table: Vec<(LogicalField, Vec<String>)>,
}

impl Default for ColumnAliases {
    fn default() -> Self {
        let table = LogicalField::ALL
            .into_iter()
            .map(|field| {
                let aliases = field
                    .builtin_aliases()
                    .iter()
                    .map(|a| normalize_header(a))
                    .collect();
                (field, aliases)
            })
            .collect();
        Self { table }
    }
}

impl ColumnAliases {
    /// Append extra aliases for `field` after the existing ones.
    pub fn extend(&mut self, field: LogicalField, aliases: impl IntoIterator<Item = String>) {
        if let Some((_, existing)) = self.table.iter_mut().find(|(f, _)| *f == field) {
            for alias in aliases {
                let normalised = normalize_header(&alias);
                if !normalised.is_empty() && !existing.contains(&normalised) {
                    existing.push(normalised);
                }
            }
        }
    }

    /// Built-in aliases extended with a JSON alias file.
    ///
    /// The file holds an object mapping field keys (`"story_point"`, …) to
    /// arrays of extra header spellings.
    pub fn with_overrides_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TaskboardError::Config(format!("cannot read alias file {}: {}", path.display(), e))
        })?;
        let extra: HashMap<String, Vec<String>> = serde_json::from_str(&content)?;

        let mut aliases = Self::default();
        for (key, values) in extra {
            let field = LogicalField::from_key(&key).ok_or_else(|| {
                TaskboardError::Config(format!("unknown field \"{}\" in alias file", key))
            })?;
            aliases.extend(field, values);
        }
        Ok(aliases)
    }

    pub fn aliases_for(&self, field: LogicalField) -> &[String] {
        self.table
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, a)| a.as_slice())
            .unwrap_or(&[])
    }
}

// ── Resolution ────────────────────────────────────────────────────────────────

/// Successful field → source-header mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    headers: HashMap<LogicalField, String>,
}

impl ColumnMapping {
    /// Source header resolved for `field`.
    pub fn header(&self, field: LogicalField) -> &str {
        self.headers.get(&field).map(String::as_str).unwrap_or("")
    }
}

/// Per-field resolution result, unresolved fields included.
pub fn match_columns(headers: &[String], aliases: &ColumnAliases) -> Vec<(LogicalField, Option<String>)> {
    let normalised: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();

    LogicalField::ALL
        .into_iter()
        .map(|field| {
            let accepted = aliases.aliases_for(field);
            let found = normalised
                .iter()
                .position(|h| accepted.iter().any(|a| a == h))
                .map(|idx| headers[idx].clone());
            (field, found)
        })
        .collect()
}

/// Resolve every logical field against `headers`.
///
/// Fails with a single [`TaskboardError::MissingRequiredColumns`] naming
/// every unresolved field.
pub fn resolve_columns(headers: &[String], aliases: &ColumnAliases) -> Result<ColumnMapping> {
    let matches = match_columns(headers, aliases);

    let missing: Vec<String> = matches
        .iter()
        .filter(|(_, h)| h.is_none())
        .map(|(f, _)| f.display_name().to_string())
        .collect();

    if !missing.is_empty() {
        warn!("Unresolved columns: {}", missing.join(", "));
        return Err(TaskboardError::MissingRequiredColumns { missing });
    }

    let headers: HashMap<LogicalField, String> = matches
        .into_iter()
        .filter_map(|(f, h)| h.map(|h| (f, h)))
        .collect();

    debug!("Resolved {} columns", headers.len());
    Ok(ColumnMapping { headers })
}
