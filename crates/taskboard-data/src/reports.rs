//! Conversion of aggregated views into exportable [`ReportTable`]s.

use taskboard_core::columns::LogicalField;
use taskboard_core::export::{yes_no, ReportTable};
use taskboard_core::models::{Task, WeekCode};

use crate::aggregator::{status_text, Comparison, ProjectRow, WorkloadRow};
use crate::analyzer::{FollowUpReport, LoadBuckets};

/// Optional columns of the project listing export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingColumns {
    pub labels: bool,
    pub stale: bool,
}

/// Project listing: one line per task row, in listing order.
pub fn listing_report(rows: &[ProjectRow], columns: ListingColumns) -> ReportTable {
    let mut header = vec![
        "Module Name",
        "Assignee",
        "Task ID",
        "Issue Type",
        "Summary",
        "Epic Link",
        "Status",
        "Story Points",
    ];
    if columns.labels {
        header.push("Labels");
    }
    if columns.stale {
        header.push("Stale");
    }

    let mut table = ReportTable::new(header);
    for row in rows {
        let t = &row.task;
        let mut cells = vec![
            t.module.clone(),
            t.assignee.clone(),
            t.task_id.clone(),
            t.issue_type.clone(),
            t.name.clone(),
            t.epic_link.clone(),
            t.status.to_string(),
            t.story_point.to_string(),
        ];
        if columns.labels {
            cells.push(t.labels_text());
        }
        if columns.stale {
            cells.push(yes_no(row.stale));
        }
        table.push_row(cells);
    }
    table
}

/// Workload histogram: counts per difficulty bucket and total.
pub fn workload_report(rows: &[WorkloadRow]) -> ReportTable {
    let mut table = ReportTable::new(["Assignee", "SP 1", "SP 2", "SP 3", "SP 4", "SP 5", "Total"]);
    for row in rows {
        let mut cells = vec![row.assignee.clone()];
        cells.extend(row.buckets.iter().map(|c| c.to_string()));
        cells.push(row.total.to_string());
        table.push_row(cells);
    }
    table
}

fn week_header(week: Option<WeekCode>, fallback: &str) -> String {
    match week {
        Some(w) => format!("Status {w}"),
        None => format!("Status {fallback}"),
    }
}

/// Two-week comparison.
pub fn comparison_report(comparison: &Comparison) -> ReportTable {
    let mut table = ReportTable::new([
        "Task ID".to_string(),
        "Task Name".to_string(),
        "Module Name".to_string(),
        "Assignee".to_string(),
        week_header(comparison.week_a, "A"),
        week_header(comparison.week_b, "B"),
        "Transition".to_string(),
        "Done In Both".to_string(),
    ]);
    for row in &comparison.rows {
        table.push_row(vec![
            row.task_id.clone(),
            row.name.clone(),
            row.module.clone(),
            row.assignee.clone(),
            status_text(row.status_a),
            status_text(row.status_b),
            row.transition.clone(),
            yes_no(row.invalid_done_both),
        ]);
    }
    table
}

/// Follow-up list: the comparison columns plus the missing-label flag.
pub fn follow_up_report(report: &FollowUpReport) -> ReportTable {
    let mut table = ReportTable::new([
        "Task ID".to_string(),
        "Task Name".to_string(),
        "Module Name".to_string(),
        "Assignee".to_string(),
        week_header(report.previous_week, "previous"),
        week_header(Some(report.current_week), "current"),
        "Transition".to_string(),
        "Done In Both".to_string(),
        "Needs Label Update".to_string(),
    ]);
    for row in &report.rows {
        table.push_row(vec![
            row.task_id.clone(),
            row.name.clone(),
            row.module.clone(),
            row.assignee.clone(),
            status_text(row.status_a),
            status_text(row.status_b),
            row.transition.clone(),
            yes_no(row.invalid_done_both),
            yes_no(row.missing_next_week_label),
        ]);
    }
    table
}

/// Tasks stuck in progress across several weeks.
pub fn stalled_report(tasks: &[Task]) -> ReportTable {
    let mut table = ReportTable::new([
        "Module Name",
        "Assignee",
        "Task ID",
        "Summary",
        "Status",
        "Labels",
        "Weeks",
    ]);
    for t in tasks {
        table.push_row(vec![
            t.module.clone(),
            t.assignee.clone(),
            t.task_id.clone(),
            t.name.clone(),
            t.status.to_string(),
            t.labels_text(),
            t.weeks.len().to_string(),
        ]);
    }
    table
}

/// Light / medium / heavy counts per assignee.
pub fn load_report(rows: &[LoadBuckets]) -> ReportTable {
    let mut table = ReportTable::new(["Assignee", "Light", "Medium", "Heavy", "Total"]);
    for row in rows {
        table.push_row(vec![
            row.assignee.clone(),
            row.light.to_string(),
            row.medium.to_string(),
            row.heavy.to_string(),
            row.total.to_string(),
        ]);
    }
    table
}

/// Logical field → resolved source header, `(missing)` when unresolved.
pub fn columns_report(matches: &[(LogicalField, Option<String>)]) -> ReportTable {
    let mut table = ReportTable::new(["Field", "Header"]);
    for (field, header) in matches {
        table.push_row(vec![
            field.display_name().to_string(),
            header.clone().unwrap_or_else(|| "(missing)".to_string()),
        ]);
    }
    table
}
