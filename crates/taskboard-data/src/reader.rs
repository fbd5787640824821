//! Decoding of tracker exports into a [`RawTable`].
//!
//! CSV text goes through the `csv` crate; spreadsheets (first worksheet only)
//! through `calamine`. The first row is always the header row.

use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use taskboard_core::models::{CellValue, RawRecord, RawTable};
use taskboard_core::{Result, TaskboardError};
use tracing::debug;

/// Input formats recognised by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Spreadsheet,
}

impl InputFormat {
    /// Detect the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "txt" => Some(InputFormat::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(InputFormat::Spreadsheet),
            _ => None,
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Read a tracker export from disk.
///
/// Any I/O or decoding failure, and any unsupported extension, is reported as
/// [`TaskboardError::UnreadableInput`]. A file without data rows yields an
/// empty table; deciding that this is an error is left to the caller.
pub fn read_table(path: &Path) -> Result<RawTable> {
    let format = InputFormat::from_path(path)
        .ok_or_else(|| TaskboardError::unreadable(path, "unsupported file type"))?;

    let table = match format {
        InputFormat::Csv => {
            let file = std::fs::File::open(path).map_err(|e| TaskboardError::unreadable(path, e))?;
            read_csv(file).map_err(|e| match e {
                TaskboardError::UnreadableInput { reason, .. } => {
                    TaskboardError::unreadable(path, reason)
                }
                other => other,
            })?
        }
        InputFormat::Spreadsheet => read_spreadsheet(path)?,
    };

    debug!(
        "Read {} rows with {} columns from {}",
        table.len(),
        table.headers.len(),
        path.display()
    );
    Ok(table)
}

/// Decode CSV text from any reader.
pub fn read_csv<R: Read>(input: R) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(input);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| TaskboardError::unreadable("<csv>", e))?
        .iter()
        .map(clean_header)
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result.map_err(|e| TaskboardError::unreadable("<csv>", e))?;
        let cells = headers
            .iter()
            .zip(row.iter())
            .filter(|(h, _)| !h.is_empty())
            .map(|(h, v)| (h.clone(), text_cell(v)))
            .collect();
        push_unless_blank(&mut records, RawRecord { cells });
    }

    Ok(RawTable::from_records(records))
}

/// Decode the first worksheet of a spreadsheet file.
pub fn read_spreadsheet(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path).map_err(|e| TaskboardError::unreadable(path, e))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| TaskboardError::unreadable(path, "workbook has no worksheets"))?
        .map_err(|e| TaskboardError::unreadable(path, e))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(RawTable::default());
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| clean_header(&cell.to_string()))
        .collect();

    let mut records = Vec::new();
    for row in rows {
        let cells = headers
            .iter()
            .zip(row.iter())
            .filter(|(h, _)| !h.is_empty())
            .map(|(h, v)| (h.clone(), spreadsheet_cell(v)))
            .collect();
        push_unless_blank(&mut records, RawRecord { cells });
    }

    Ok(RawTable::from_records(records))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn clean_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_string()
}

fn text_cell(raw: &str) -> CellValue {
    if raw.trim().is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(raw.to_string())
    }
}

fn spreadsheet_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => text_cell(s),
        other => text_cell(&other.to_string()),
    }
}

fn push_unless_blank(records: &mut Vec<RawRecord>, record: RawRecord) {
    if record.is_blank() {
        return;
    }
    records.push(record);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
