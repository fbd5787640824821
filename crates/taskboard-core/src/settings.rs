use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, TaskboardError};
use crate::models::{WeekCode, WeekSelection};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Weekly task reports from tracker exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskboard",
    about = "Weekly task reports from spreadsheet or CSV tracker exports",
    version
)]
pub struct Settings {
    /// Spreadsheet (.xlsx, .xls, .ods) or CSV export to analyse
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Report to produce
    #[arg(long, default_value = "listing", value_parser = ["listing", "workload", "compare", "followup", "stalled", "load", "columns"])]
    pub view: String,

    /// Weeks to include, e.g. `W01,W02` (all weeks when omitted)
    #[arg(long, value_delimiter = ',')]
    pub weeks: Vec<String>,

    /// Only show tasks of this module
    #[arg(long)]
    pub module: Option<String>,

    /// Only show tasks of this assignee
    #[arg(long)]
    pub assignee: Option<String>,

    /// First week of a comparison
    #[arg(long)]
    pub week_a: Option<String>,

    /// Second week of a comparison
    #[arg(long)]
    pub week_b: Option<String>,

    /// Add the Labels column to the listing
    #[arg(long)]
    pub with_labels: bool,

    /// Add the staleness column to the listing
    #[arg(long)]
    pub with_stale: bool,

    /// Output format
    #[arg(long, default_value = "csv", value_parser = ["csv", "json"])]
    pub format: String,

    /// Write the report to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Date used as "today" for current-week reports (YYYY-MM-DD)
    #[arg(long)]
    pub today: Option<String>,

    /// Timezone used to derive the current week (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// JSON file with extra column aliases
    #[arg(long)]
    pub aliases: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.taskboard/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliases: Option<PathBuf>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".taskboard").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments and merge with last-used params where no explicit
    /// CLI value was provided, then persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation; accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::apply_debug(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins over persisted values.
        if !is_arg_explicitly_set(&matches, "view") {
            if let Some(v) = last.view {
                settings.view = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "format") {
            if let Some(v) = last.format {
                settings.format = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if settings.aliases.is_none() {
            settings.aliases = last.aliases;
        }

        settings = Self::apply_debug(settings);

        let params = LastUsedParams::from(&settings);
        if let Err(e) = params.save_to(config_path) {
            tracing::debug!("could not persist last-used params: {}", e);
        }

        settings
    }

    fn apply_debug(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Week filter built from `--weeks`; no weeks means all weeks.
    pub fn week_selection(&self) -> Result<WeekSelection> {
        let weeks = self
            .weeks
            .iter()
            .filter(|w| !w.trim().is_empty())
            .map(|w| parse_week_arg(w))
            .collect::<Result<Vec<WeekCode>>>()?;
        Ok(WeekSelection::from_weeks(weeks))
    }

    /// The two comparison weeks; either may be unset.
    pub fn comparison_weeks(&self) -> Result<(Option<WeekCode>, Option<WeekCode>)> {
        let a = self.week_a.as_deref().map(parse_week_arg).transpose()?;
        let b = self.week_b.as_deref().map(parse_week_arg).transpose()?;
        Ok((a, b))
    }

    /// `--today` parsed as a date.
    pub fn today_override(&self) -> Result<Option<chrono::NaiveDate>> {
        match self.today.as_deref() {
            None => Ok(None),
            Some(s) => crate::time_utils::parse_date(s)
                .map(Some)
                .ok_or_else(|| TaskboardError::Config(format!("invalid --today date: {s}"))),
        }
    }
}

fn parse_week_arg(raw: &str) -> Result<WeekCode> {
    WeekCode::parse(raw).ok_or_else(|| TaskboardError::Config(format!("invalid week code: {raw}")))
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            view: Some(s.view.clone()),
            format: Some(s.format.clone()),
            timezone: Some(s.timezone.clone()),
            aliases: s.aliases.clone(),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}
