//! Delimited-text rendering of report tables.
//!
//! A field is quoted, with inner quotes doubled, only when it contains a
//! comma, a newline or a double quote. Lines are joined with `\n` and no
//! trailing terminator is written.

use serde::Serialize;

/// A rendered report: header plus data rows, all cells already text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn new<S: Into<String>>(header: impl IntoIterator<Item = S>) -> Self {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Render the table with [`to_delimited`].
    pub fn to_delimited(&self) -> String {
        to_delimited(&self.header, &self.rows)
    }
}

/// Quote `field` when it contains a comma, newline or double quote.
///
/// # Examples
///
/// ```
/// use taskboard_core::export::escape_field;
///
/// assert_eq!(escape_field("plain"), "plain");
/// assert_eq!(escape_field("a,b"), "\"a,b\"");
/// assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
/// ```
pub fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('\n') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render a header line followed by one line per row.
pub fn to_delimited<H: AsRef<str>, C: AsRef<str>>(header: &[H], rows: &[Vec<C>]) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(rows.len() + 1);
    lines.push(join_line(header));
    lines.extend(rows.iter().map(|row| join_line(row)));
    lines.join("\n")
}

fn join_line<C: AsRef<str>>(cells: &[C]) -> String {
    cells
        .iter()
        .map(|c| escape_field(c.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// `YES` / `NO` rendering used for boolean report columns.
pub fn yes_no(flag: bool) -> String {
    if flag { "YES" } else { "NO" }.to_string()
}
