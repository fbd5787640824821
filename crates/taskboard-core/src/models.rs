use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Placeholder used for blank text cells and unrecognisable task ids.
pub const PLACEHOLDER: &str = "-";

/// Placeholder used for blank assignee and module cells.
pub const UNKNOWN: &str = "Unknown";

// ── Raw input ─────────────────────────────────────────────────────────────────

/// A single scalar cell as decoded from the source file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Text form of the cell, trimmed. Numbers with no fractional part are
    /// rendered without a trailing `.0`.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            CellValue::Text(s) => s.trim().to_string(),
        }
    }

    /// `true` when the cell holds no value or only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Number(_) => false,
            CellValue::Text(s) => s.trim().is_empty(),
        }
    }
}

/// One source row: ordered `(header, value)` pairs, headers already trimmed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub cells: Vec<(String, CellValue)>,
}

impl RawRecord {
    /// Look up the first cell stored under `header`.
    pub fn get(&self, header: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v)
    }

    /// `true` when every cell in the record is blank.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.is_blank())
    }
}

/// All decoded rows of one file together with the header union.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    /// Distinct headers across all records, in first-seen order.
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl RawTable {
    /// Build a table from records, computing the first-seen header union.
    pub fn from_records(records: Vec<RawRecord>) -> Self {
        let mut headers: Vec<String> = Vec::new();
        for record in &records {
            for (header, _) in &record.cells {
                if !headers.iter().any(|h| h == header) {
                    headers.push(header.clone());
                }
            }
        }
        Self { headers, records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

// ── Status ────────────────────────────────────────────────────────────────────

/// Normalised work-item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Open,
    #[serde(rename = "inprogress")]
    InProgress,
    Done,
    Other,
}

impl Status {
    /// Position in the advancement order `open < inprogress < done < other`.
    ///
    /// Used both for sorting listings and for picking the status that wins
    /// when one task reports several statuses for the same week.
    pub fn rank(self) -> u8 {
        match self {
            Status::Open => 0,
            Status::InProgress => 1,
            Status::Done => 2,
            Status::Other => 3,
        }
    }

    /// The more advanced of two statuses.
    pub fn most_advanced(self, other: Status) -> Status {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::InProgress => "inprogress",
            Status::Done => "done",
            Status::Other => "other",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── WeekCode ──────────────────────────────────────────────────────────────────

/// A work-week label such as `W07`.
///
/// `W7` and `W07` denote the same week; the canonical text form is always
/// two digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct WeekCode(u8);

impl WeekCode {
    /// Build a week code from its number. Returns `None` above 99.
    pub fn new(number: u8) -> Option<Self> {
        (number <= 99).then_some(Self(number))
    }

    /// Build a week code, capping the number at 99.
    pub fn saturating(number: u32) -> Self {
        Self(number.min(99) as u8)
    }

    /// Parse a single token of the form `W` + one or two digits
    /// (case-insensitive, surrounding whitespace ignored).
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        let digits = token
            .strip_prefix('W')
            .or_else(|| token.strip_prefix('w'))?;
        if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse::<u8>().ok().and_then(Self::new)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// The week immediately before this one. Weeks 0 and 1 have none.
    pub fn previous(self) -> Option<Self> {
        if self.0 <= 1 {
            None
        } else {
            Some(Self(self.0 - 1))
        }
    }
}

impl fmt::Display for WeekCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W{:02}", self.0)
    }
}

impl From<WeekCode> for String {
    fn from(week: WeekCode) -> Self {
        week.to_string()
    }
}

impl TryFrom<String> for WeekCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        WeekCode::parse(&value).ok_or_else(|| format!("invalid week code: {value}"))
    }
}

impl std::str::FromStr for WeekCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WeekCode::parse(s).ok_or_else(|| format!("invalid week code: {s}"))
    }
}

/// Which weeks a view should include.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum WeekSelection {
    #[default]
    All,
    Only(BTreeSet<WeekCode>),
}

impl WeekSelection {
    /// Build a selection from explicit weeks; an empty set means all weeks.
    pub fn from_weeks(weeks: impl IntoIterator<Item = WeekCode>) -> Self {
        let set: BTreeSet<WeekCode> = weeks.into_iter().collect();
        if set.is_empty() {
            WeekSelection::All
        } else {
            WeekSelection::Only(set)
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, WeekSelection::All)
    }

    /// `true` when `week` is selected.
    pub fn contains(&self, week: WeekCode) -> bool {
        match self {
            WeekSelection::All => true,
            WeekSelection::Only(set) => set.contains(&week),
        }
    }

    /// `true` when the selection is `All` or shares a week with `weeks`.
    pub fn intersects(&self, weeks: &BTreeSet<WeekCode>) -> bool {
        match self {
            WeekSelection::All => true,
            WeekSelection::Only(set) => !set.is_disjoint(weeks),
        }
    }
}

// ── Task ──────────────────────────────────────────────────────────────────────

/// Stable key used to merge rows that describe the same underlying task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaskIdentity {
    /// The row carried a recognisable task id.
    Key(String),
    /// No id: the task is identified by where it lives and what it is called.
    Composite { module: String, name: String },
}

/// One normalised work item row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    /// Link to the task in the tracker; empty when none was found.
    #[serde(default)]
    pub task_url: String,
    pub issue_type: String,
    pub assignee: String,
    pub name: String,
    pub epic_link: String,
    pub module: String,
    /// Difficulty 1–5, or 0 when the source value was not a number.
    pub story_point: u8,
    pub weeks: BTreeSet<WeekCode>,
    pub status: Status,
}

impl Task {
    pub fn identity(&self) -> TaskIdentity {
        let id = self.task_id.trim();
        if id.is_empty() || id == PLACEHOLDER {
            TaskIdentity::Composite {
                module: self.module.clone(),
                name: self.name.clone(),
            }
        } else {
            TaskIdentity::Key(id.to_string())
        }
    }

    /// `true` when the task carries a difficulty score.
    pub fn is_scored(&self) -> bool {
        self.story_point > 0
    }

    pub fn has_week(&self, week: WeekCode) -> bool {
        self.weeks.contains(&week)
    }

    /// Week labels joined with `", "` in numeric order.
    pub fn labels_text(&self) -> String {
        self.weeks
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(n: u8) -> WeekCode {
        WeekCode::new(n).unwrap()
    }

    fn sample_task(task_id: &str, module: &str, name: &str) -> Task {
        Task {
            task_id: task_id.to_string(),
            task_url: String::new(),
            issue_type: "Task".to_string(),
            assignee: "alice".to_string(),
            name: name.to_string(),
            epic_link: PLACEHOLDER.to_string(),
            module: module.to_string(),
            story_point: 3,
            weeks: BTreeSet::new(),
            status: Status::Open,
        }
    }

    #[test]
    fn test_week_code_canonical_form() {
        assert_eq!(WeekCode::parse("w1").unwrap().to_string(), "W01");
        assert_eq!(WeekCode::parse("W01"), WeekCode::parse("w1"));
        assert_eq!(WeekCode::parse(" W52 ").unwrap().number(), 52);
    }

    #[test]
    fn test_week_code_rejects_malformed() {
        assert!(WeekCode::parse("W").is_none());
        assert!(WeekCode::parse("W123").is_none());
        assert!(WeekCode::parse("WK1").is_none());
        assert!(WeekCode::parse("1").is_none());
        assert!(WeekCode::parse("W1a").is_none());
    }

    #[test]
    fn test_week_code_previous() {
        assert_eq!(week(5).previous(), Some(week(4)));
        assert_eq!(week(1).previous(), None);
        assert_eq!(week(0).previous(), None);
    }

    #[test]
    fn test_week_code_serde_uses_canonical_text() {
        let json = serde_json::to_string(&week(3)).unwrap();
        assert_eq!(json, "\"W03\"");
        let back: WeekCode = serde_json::from_str("\"w3\"").unwrap();
        assert_eq!(back, week(3));
    }

    #[test]
    fn test_status_rank_order() {
        assert!(Status::Open.rank() < Status::InProgress.rank());
        assert!(Status::InProgress.rank() < Status::Done.rank());
        assert!(Status::Done.rank() < Status::Other.rank());
    }

    #[test]
    fn test_status_most_advanced() {
        assert_eq!(Status::Open.most_advanced(Status::Done), Status::Done);
        assert_eq!(Status::Done.most_advanced(Status::InProgress), Status::Done);
        assert_eq!(Status::Done.most_advanced(Status::Other), Status::Other);
    }

    #[test]
    fn test_status_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&Status::InProgress).unwrap(),
            "\"inprogress\""
        );
    }

    #[test]
    fn test_week_selection_empty_is_all() {
        assert!(WeekSelection::from_weeks(Vec::new()).is_all());
        let only = WeekSelection::from_weeks([week(2)]);
        assert!(only.contains(week(2)));
        assert!(!only.contains(week(3)));
    }

    #[test]
    fn test_week_selection_intersects() {
        let selection = WeekSelection::from_weeks([week(2), week(4)]);
        let weeks: BTreeSet<WeekCode> = [week(1), week(4)].into_iter().collect();
        assert!(selection.intersects(&weeks));
        let other: BTreeSet<WeekCode> = [week(3)].into_iter().collect();
        assert!(!selection.intersects(&other));
        assert!(WeekSelection::All.intersects(&BTreeSet::new()));
    }

    #[test]
    fn test_identity_uses_key_when_present() {
        let task = sample_task("PROJ-1", "Billing", "Invoice export");
        assert_eq!(task.identity(), TaskIdentity::Key("PROJ-1".to_string()));
    }

    #[test]
    fn test_identity_falls_back_to_composite() {
        let a = sample_task(PLACEHOLDER, "Billing", "Invoice export");
        let b = sample_task(PLACEHOLDER, "Search", "Invoice export");
        assert_eq!(
            a.identity(),
            TaskIdentity::Composite {
                module: "Billing".to_string(),
                name: "Invoice export".to_string(),
            }
        );
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn test_cell_value_text_forms() {
        assert_eq!(CellValue::Number(3.0).as_text(), "3");
        assert_eq!(CellValue::Number(2.5).as_text(), "2.5");
        assert_eq!(CellValue::Text("  x ".to_string()).as_text(), "x");
        assert!(CellValue::Text("   ".to_string()).is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
    }

    #[test]
    fn test_raw_table_header_union_first_seen() {
        let r1 = RawRecord {
            cells: vec![
                ("Key".to_string(), CellValue::Text("A-1".to_string())),
                ("Status".to_string(), CellValue::Empty),
            ],
        };
        let r2 = RawRecord {
            cells: vec![
                ("Module".to_string(), CellValue::Empty),
                ("Key".to_string(), CellValue::Empty),
            ],
        };
        let table = RawTable::from_records(vec![r1, r2]);
        assert_eq!(table.headers, vec!["Key", "Status", "Module"]);
        assert_eq!(table.len(), 2);
    }
}
