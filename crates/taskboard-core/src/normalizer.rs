//! Conversion of raw spreadsheet rows into typed [`Task`] records.
//!
//! Nothing in here fails: every malformed value degrades to a sentinel
//! (`"-"`, `Status::Other`, story point `0`) so one bad cell never blocks the
//! rest of the file.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::columns::{ColumnMapping, LogicalField};
use crate::models::{CellValue, RawRecord, Status, Task, WeekCode, PLACEHOLDER, UNKNOWN};

// ── Patterns ──────────────────────────────────────────────────────────────────

fn markdown_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("regex is valid"))
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)https?://[^\s<>"'\])]+"#).expect("regex is valid"))
}

fn task_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Za-z]+[0-9]*-[0-9]+\b").expect("regex is valid"))
}

fn label_separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[;,|\s]+").expect("regex is valid"))
}

// ── Field parsers ─────────────────────────────────────────────────────────────

/// Split a task-key cell into `(task_id, task_url)`.
///
/// Recognised shapes, tried in order:
/// 1. `[PROJ-1](https://tracker/browse/PROJ-1)`: both parts captured.
/// 2. Text with a URL: the key found outside the URL, else the last key
///    inside the URL, else the raw text; upper-cased either way.
/// 3. Text with a bare key: the key, upper-cased, no URL.
/// 4. Anything else: the trimmed text, or `"-"` when blank.
pub fn parse_task_key_cell(raw: &str) -> (String, String) {
    let text = raw.trim();
    if text.is_empty() {
        return (PLACEHOLDER.to_string(), String::new());
    }

    if let Some(caps) = markdown_link_re().captures(text) {
        let key = caps[1].trim();
        let url = caps[2].trim();
        if !key.is_empty() {
            return (key.to_string(), url.to_string());
        }
    }

    if let Some(url_match) = url_re().find(text) {
        let url = url_match.as_str().to_string();
        let outside = format!("{}{}", &text[..url_match.start()], &text[url_match.end()..]);

        let key = task_key_re()
            .find(&outside)
            .map(|m| m.as_str().to_string())
            .or_else(|| task_key_re().find_iter(&url).last().map(|m| m.as_str().to_string()));

        return match key {
            Some(k) => (k.to_uppercase(), url),
            None => (text.to_uppercase(), url),
        };
    }

    if let Some(key) = task_key_re().find(text) {
        return (key.as_str().to_uppercase(), String::new());
    }

    (text.to_string(), String::new())
}

/// Map free-text status synonyms onto [`Status`].
///
/// Case and whitespace are ignored, so `"In Progress"` and `"in-progress"`
/// both become `InProgress`.
pub fn normalize_status(raw: &str) -> Status {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    match compact.as_str() {
        "open" | "todo" | "to-do" | "new" | "backlog" => Status::Open,
        "inprogress" | "in-progress" | "doing" | "progress" => Status::InProgress,
        "done" | "closed" => Status::Done,
        _ => Status::Other,
    }
}

/// Parse every week code out of a labels cell.
///
/// Tokens are separated by commas, semicolons, pipes or whitespace; bracket
/// and quote characters are ignored. Tokens that are not `W` + 1–2 digits
/// are dropped. `W1` and `W01` collapse to the same code.
pub fn parse_week_labels(raw: &str) -> BTreeSet<WeekCode> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '(' | ')' | '{' | '}' | '"' | '\''))
        .collect();

    label_separator_re()
        .split(&cleaned)
        .filter(|t| !t.is_empty())
        .filter_map(|t| WeekCode::parse(&t.to_uppercase()))
        .collect()
}

/// Difficulty score from a raw cell.
///
/// Non-numeric or non-finite input yields `0` ("unscored"); anything else is
/// rounded and clamped into `1..=5`.
pub fn parse_story_point(value: &CellValue) -> u8 {
    let number = match value {
        CellValue::Empty => return 0,
        CellValue::Number(n) => *n,
        CellValue::Text(s) => match s.trim().parse::<f64>() {
            Ok(n) => n,
            Err(_) => return 0,
        },
    };

    if !number.is_finite() {
        return 0;
    }
    number.round().clamp(1.0, 5.0) as u8
}

// ── RowNormalizer ─────────────────────────────────────────────────────────────

/// Turns raw records into [`Task`]s using a resolved [`ColumnMapping`].
pub struct RowNormalizer<'a> {
    mapping: &'a ColumnMapping,
}

impl<'a> RowNormalizer<'a> {
    pub fn new(mapping: &'a ColumnMapping) -> Self {
        Self { mapping }
    }

    fn cell<'r>(&self, record: &'r RawRecord, field: LogicalField) -> Option<&'r CellValue> {
        record.get(self.mapping.header(field))
    }

    fn text_or(&self, record: &RawRecord, field: LogicalField, default: &str) -> String {
        let text = self
            .cell(record, field)
            .map(CellValue::as_text)
            .unwrap_or_default();
        if text.is_empty() {
            default.to_string()
        } else {
            text
        }
    }

    /// Normalise a single record.
    pub fn normalize(&self, record: &RawRecord) -> Task {
        let key_text = self
            .cell(record, LogicalField::TaskKey)
            .map(CellValue::as_text)
            .unwrap_or_default();
        let (task_id, task_url) = parse_task_key_cell(&key_text);

        let story_point = self
            .cell(record, LogicalField::StoryPoint)
            .map(parse_story_point)
            .unwrap_or(0);

        let weeks = self
            .cell(record, LogicalField::Labels)
            .map(|v| parse_week_labels(&v.as_text()))
            .unwrap_or_default();

        let status = normalize_status(
            &self
                .cell(record, LogicalField::Status)
                .map(CellValue::as_text)
                .unwrap_or_default(),
        );

        Task {
            task_id,
            task_url,
            issue_type: self.text_or(record, LogicalField::IssueType, PLACEHOLDER),
            assignee: self.text_or(record, LogicalField::Assignee, UNKNOWN),
            name: self.text_or(record, LogicalField::Name, PLACEHOLDER),
            epic_link: self.text_or(record, LogicalField::EpicLink, PLACEHOLDER),
            module: self.text_or(record, LogicalField::Module, UNKNOWN),
            story_point,
            weeks,
            status,
        }
    }

    /// Normalise every record, preserving source order.
    pub fn normalize_all(&self, records: &[RawRecord]) -> Vec<Task> {
        let tasks: Vec<Task> = records.iter().map(|r| self.normalize(r)).collect();
        debug!(
            "Normalised {} rows ({} unscored, {} without week labels)",
            tasks.len(),
            tasks.iter().filter(|t| !t.is_scored()).count(),
            tasks.iter().filter(|t| t.weeks.is_empty()).count()
        );
        tasks
    }
}
