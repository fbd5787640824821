//! Report selection and delivery for the command line.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use taskboard_core::settings::Settings;
use taskboard_core::time_utils::current_week;
use taskboard_core::TaskboardError;
use taskboard_data::aggregator::ListingFilter;
use taskboard_data::reports::{
    columns_report, comparison_report, follow_up_report, listing_report, load_report,
    stalled_report, workload_report, ListingColumns,
};
use taskboard_runtime::data_manager::DatasetManager;

/// Output encodings of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    pub fn from_setting(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            OutputFormat::Json
        } else {
            OutputFormat::Csv
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value).map_err(TaskboardError::from)?)
}

/// Render the view selected in `settings` from the manager's current dataset.
pub fn render(manager: &DatasetManager, settings: &Settings) -> Result<String> {
    let format = OutputFormat::from_setting(&settings.format);
    let json = format == OutputFormat::Json;

    let text = match settings.view.as_str() {
        "listing" => {
            let filter = ListingFilter {
                weeks: settings.week_selection()?,
                module: settings.module.clone(),
                assignee: settings.assignee.clone(),
            };
            let rows = manager.listing(&filter);
            tracing::debug!("listing: {} rows", rows.len());
            if json {
                to_json(rows.as_slice())?
            } else {
                let columns = ListingColumns {
                    labels: settings.with_labels,
                    stale: settings.with_stale,
                };
                listing_report(&rows, columns).to_delimited()
            }
        }
        "workload" => {
            let rows = manager.workload(&settings.week_selection()?);
            if json {
                to_json(&rows)?
            } else {
                workload_report(&rows).to_delimited()
            }
        }
        "compare" => {
            let (week_a, week_b) = settings.comparison_weeks()?;
            if week_a.is_none() || week_b.is_none() {
                tracing::warn!("comparison needs both --week-a and --week-b");
            }
            let comparison = manager.comparison(week_a, week_b);
            if comparison.summary.same_week {
                tracing::warn!("comparing a week with itself; every row will read unchanged");
            }
            if json {
                to_json(&comparison)?
            } else {
                comparison_report(&comparison).to_delimited()
            }
        }
        "followup" | "stalled" | "load" => {
            let week = current_week(&settings.timezone, settings.today_override()?);
            tracing::info!("Current week: {week}");
            match (settings.view.as_str(), json) {
                ("followup", true) => to_json(&manager.follow_up(week))?,
                ("followup", false) => follow_up_report(&manager.follow_up(week)).to_delimited(),
                ("stalled", true) => to_json(&manager.stalled(week))?,
                ("stalled", false) => stalled_report(&manager.stalled(week)).to_delimited(),
                (_, true) => to_json(&manager.load_buckets(week))?,
                (_, false) => load_report(&manager.load_buckets(week)).to_delimited(),
            }
        }
        "columns" => {
            let matches = manager.column_matches().unwrap_or_default();
            if json {
                to_json(&matches)?
            } else {
                columns_report(&matches).to_delimited()
            }
        }
        other => anyhow::bail!("Unknown view: {other}"),
    };

    Ok(text)
}

/// Write a rendered report to `destination`, or to stdout when `None`.
pub fn deliver(text: &str, destination: Option<&Path>) -> taskboard_core::Result<()> {
    match destination {
        Some(path) => {
            std::fs::write(path, text).map_err(|source| {
                tracing::warn!("export to {} failed: {source}", path.display());
                TaskboardError::ExportDelivery {
                    destination: path.display().to_string(),
                    source,
                }
            })?;
            tracing::info!("Report written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{text}").map_err(|source| TaskboardError::ExportDelivery {
                destination: "stdout".to_string(),
                source,
            })?;
        }
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use taskboard_core::columns::ColumnAliases;
    use tempfile::TempDir;

    const HEADER: &str =
        "Task Key,Issue Type,Assignee,Story Point,Summary,Labels,Epic Link,Module,Status";

    async fn loaded_manager(dir: &TempDir) -> DatasetManager {
        let path = dir.path().join("export.csv");
        std::fs::write(
            &path,
            [
                HEADER,
                "PROJ-1,Story,alice,3,Checkout,W01,EPIC-1,Payments,Done",
                "PROJ-1,Story,alice,3,Checkout,W02,EPIC-1,Payments,In Progress",
                "PROJ-2,Bug,bob,5,Crash,\"W01, W02\",EPIC-2,Mobile,done",
            ]
            .join("\n"),
        )
        .unwrap();
        let manager = DatasetManager::new(ColumnAliases::default());
        manager.load(path).await.unwrap();
        manager
    }

    fn settings(args: &[&str]) -> Settings {
        Settings::parse_from(std::iter::once("taskboard").chain(args.iter().copied()))
    }

    #[tokio::test]
    async fn test_render_listing_csv() {
        let dir = TempDir::new().unwrap();
        let manager = loaded_manager(&dir).await;

        let text = render(&manager, &settings(&["--weeks", "W02", "--with-stale"])).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("Story Points,Stale"));
        // PROJ-1 was done in W01 and still labelled W02.
        assert!(lines.iter().any(|l| l.contains("PROJ-1") && l.ends_with(",YES")));
    }

    #[tokio::test]
    async fn test_render_compare_json() {
        let dir = TempDir::new().unwrap();
        let manager = loaded_manager(&dir).await;

        let text = render(
            &manager,
            &settings(&["--view", "compare", "--week-a", "W01", "--week-b", "W02", "--format", "json"]),
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["summary"]["invalid_done_both"], 1);
        assert_eq!(value["rows"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_render_followup_uses_today_override() {
        let dir = TempDir::new().unwrap();
        let manager = loaded_manager(&dir).await;

        // 2024-01-10 falls in ISO week 2.
        let text = render(
            &manager,
            &settings(&["--view", "followup", "--today", "2024-01-10", "--timezone", "UTC"]),
        )
        .unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].contains("Status W01,Status W02"));
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("PROJ-2,"));
    }

    #[tokio::test]
    async fn test_render_columns_after_missing_status() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.csv");
        std::fs::write(&path, "Key,Summary\nPROJ-1,Checkout\n").unwrap();
        let manager = DatasetManager::new(ColumnAliases::default());
        assert!(manager.load(path).await.is_err());

        let text = render(&manager, &settings(&["--view", "columns"])).unwrap();
        assert!(text.contains("Task Key,Key"));
        assert!(text.contains("Status,(missing)"));
    }

    #[test]
    fn test_deliver_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.csv");
        deliver("a,b\n1,2", Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n1,2");
    }

    #[test]
    fn test_deliver_failure_is_export_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no-such-dir").join("report.csv");
        let err = deliver("a,b", Some(&path)).unwrap_err();
        assert!(matches!(err, TaskboardError::ExportDelivery { .. }));
    }

    #[test]
    fn test_output_format_from_setting() {
        assert_eq!(OutputFormat::from_setting("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_setting("csv"), OutputFormat::Csv);
    }
}
