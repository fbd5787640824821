//! Follow-up checks pinned to the current work week.
//!
//! Compares the current week against the one before it and flags the rows a
//! manager should chase: tasks reported done twice, tasks that silently lost
//! their week label, tasks stuck in progress across several weeks, and how
//! heavy each assignee's current week is.

use std::collections::HashMap;

use serde::Serialize;
use taskboard_core::models::{Status, Task, WeekCode};
use tracing::debug;

use crate::aggregator::{CompareRow, TaskAggregator, WeeklyStatusMap};

// ── Output types ──────────────────────────────────────────────────────────────

/// Rows needing attention when moving from the previous week to the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowUpReport {
    pub current_week: WeekCode,
    /// `None` in week 1, which has no predecessor.
    pub previous_week: Option<WeekCode>,
    pub rows: Vec<CompareRow>,
}

/// Current-week effort per assignee, bucketed by difficulty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadBuckets {
    pub assignee: String,
    /// Story points 1–2.
    pub light: u32,
    /// Story point 3.
    pub medium: u32,
    /// Story points 4–5.
    pub heavy: u32,
    pub total: u32,
}

impl LoadBuckets {
    fn add(&mut self, story_point: u8) {
        match story_point {
            1 | 2 => self.light += 1,
            3 => self.medium += 1,
            4 | 5 => self.heavy += 1,
            _ => return,
        }
        self.total += 1;
    }
}

// ── AnomalyDetector ───────────────────────────────────────────────────────────

/// Runs the current-week checks over a task collection.
pub struct AnomalyDetector {
    current_week: WeekCode,
}

impl AnomalyDetector {
    pub fn new(current_week: WeekCode) -> Self {
        Self { current_week }
    }

    pub fn current_week(&self) -> WeekCode {
        self.current_week
    }

    /// Comparison of the previous week against the current one, keeping only
    /// rows done in both weeks or missing their current-week label while
    /// still open.
    pub fn follow_up(&self, tasks: &[Task]) -> FollowUpReport {
        let previous = self.current_week.previous();
        let status_map = WeeklyStatusMap::build(tasks);
        let comparison =
            TaskAggregator::compare_weeks_with(tasks, previous, Some(self.current_week), &status_map);

        let rows: Vec<CompareRow> = comparison
            .rows
            .into_iter()
            .filter(|r| r.invalid_done_both || r.missing_next_week_label)
            .collect();

        debug!(
            "Follow-up for {}: {} rows need attention",
            self.current_week,
            rows.len()
        );

        FollowUpReport {
            current_week: self.current_week,
            previous_week: previous,
            rows,
        }
    }

    /// Current-week tasks still in progress while carrying two or more week
    /// labels, sorted by module, assignee and task id.
    pub fn stalled_tasks(&self, tasks: &[Task]) -> Vec<Task> {
        let mut stalled: Vec<Task> = tasks
            .iter()
            .filter(|t| t.has_week(self.current_week))
            .filter(|t| t.status == Status::InProgress && t.weeks.len() >= 2)
            .cloned()
            .collect();

        stalled.sort_by(|a, b| {
            a.module
                .cmp(&b.module)
                .then_with(|| a.assignee.cmp(&b.assignee))
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        stalled
    }

    /// Light / medium / heavy counts per assignee for current-week tasks.
    ///
    /// Unscored tasks are not bucketed. Sorted by total descending, then
    /// assignee.
    pub fn load_buckets(&self, tasks: &[Task]) -> Vec<LoadBuckets> {
        let mut by_assignee: HashMap<&str, LoadBuckets> = HashMap::new();

        for task in tasks.iter().filter(|t| t.has_week(self.current_week)) {
            by_assignee
                .entry(task.assignee.as_str())
                .or_insert_with(|| LoadBuckets {
                    assignee: task.assignee.clone(),
                    ..Default::default()
                })
                .add(task.story_point);
        }

        let mut rows: Vec<LoadBuckets> = by_assignee.into_values().collect();
        rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.assignee.cmp(&b.assignee)));
        rows
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
