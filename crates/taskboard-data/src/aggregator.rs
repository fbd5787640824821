//! Read-only views over the normalised task collection.
//!
//! Every view is a pure function of `(tasks, parameters)`: the grouped
//! project listing, the assignee workload histogram and the two-week status
//! comparison. All three share [`WeeklyStatusMap`], the per-task, per-week
//! merged status.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use taskboard_core::models::{Status, Task, TaskIdentity, WeekCode, WeekSelection};

// ── WeeklyStatusMap ───────────────────────────────────────────────────────────

/// Most advanced status seen for each task identity in each week.
///
/// Built over the whole collection regardless of any view filter.
#[derive(Debug, Clone, Default)]
pub struct WeeklyStatusMap {
    statuses: HashMap<TaskIdentity, BTreeMap<WeekCode, Status>>,
}

impl WeeklyStatusMap {
    pub fn build(tasks: &[Task]) -> Self {
        let mut statuses: HashMap<TaskIdentity, BTreeMap<WeekCode, Status>> = HashMap::new();
        for task in tasks {
            let weeks = statuses.entry(task.identity()).or_default();
            for &week in &task.weeks {
                weeks
                    .entry(week)
                    .and_modify(|s| *s = s.most_advanced(task.status))
                    .or_insert(task.status);
            }
        }
        Self { statuses }
    }

    /// Merged status of `identity` in `week`, if the task was labelled with it.
    pub fn status(&self, identity: &TaskIdentity, week: WeekCode) -> Option<Status> {
        self.statuses.get(identity)?.get(&week).copied()
    }

    /// Number of distinct task identities.
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

// ── Group spans ───────────────────────────────────────────────────────────────

/// Run lengths for hierarchical display.
///
/// For each item, returns the length of the run of consecutive items sharing
/// `key` when the item starts that run, and `0` for every other item of the
/// run.
pub fn first_of_run_spans<T, K, F>(items: &[T], key: F) -> Vec<usize>
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let mut spans = vec![0; items.len()];
    let mut start = 0;
    while start < items.len() {
        let run_key = key(&items[start]);
        let mut end = start + 1;
        while end < items.len() && key(&items[end]) == run_key {
            end += 1;
        }
        spans[start] = end - start;
        start = end;
    }
    spans
}

// ── Project listing ───────────────────────────────────────────────────────────

/// Parameters of the grouped project listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ListingFilter {
    pub weeks: WeekSelection,
    /// `None` means every module.
    pub module: Option<String>,
    /// `None` means every assignee.
    pub assignee: Option<String>,
}

impl ListingFilter {
    fn matches(&self, task: &Task) -> bool {
        self.weeks.intersects(&task.weeks)
            && self.module.as_ref().map_or(true, |m| *m == task.module)
            && self.assignee.as_ref().map_or(true, |a| *a == task.assignee)
    }
}

/// One row of the grouped listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectRow {
    #[serde(flatten)]
    pub task: Task,
    /// A task marked done the week before a selected week is still labelled
    /// as active.
    pub stale: bool,
    /// Rows covered by this row's module label; `0` unless the row opens a
    /// module run.
    pub module_span: usize,
    /// Rows covered by this row's assignee label within its module; `0`
    /// unless the row opens a `(module, assignee)` run.
    pub assignee_span: usize,
}

// ── Workload ──────────────────────────────────────────────────────────────────

/// Per-assignee counts of tasks by difficulty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadRow {
    pub assignee: String,
    /// Task counts for story points 1 to 5.
    pub buckets: [u32; 5],
    pub total: u32,
}

// ── Comparison ────────────────────────────────────────────────────────────────

/// Status of one task in two weeks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompareRow {
    pub task_id: String,
    pub task_url: String,
    pub name: String,
    pub module: String,
    pub assignee: String,
    /// `None` means the task had no label for that week.
    pub status_a: Option<Status>,
    pub status_b: Option<Status>,
    pub transition: String,
    /// Done in both weeks: the label was probably carried over by mistake.
    pub invalid_done_both: bool,
    /// Still open in week A but not labelled for week B.
    pub missing_next_week_label: bool,
}

/// Counters shown next to a comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonSummary {
    pub total: usize,
    pub changed: usize,
    pub invalid_done_both: usize,
    /// Both weeks are the same; allowed but almost never intended.
    pub same_week: bool,
}

/// A full two-week comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Comparison {
    pub week_a: Option<WeekCode>,
    pub week_b: Option<WeekCode>,
    pub rows: Vec<CompareRow>,
    pub summary: ComparisonSummary,
}

/// Text shown for a missing week status.
pub const NO_DATA: &str = "no data";

/// Render an optional status, using [`NO_DATA`] for `None`.
pub fn status_text(status: Option<Status>) -> String {
    status.map_or_else(|| NO_DATA.to_string(), |s| s.to_string())
}

fn transition_text(a: Option<Status>, b: Option<Status>, week_b: WeekCode) -> String {
    match (a, b) {
        (None, None) => "no data in both".to_string(),
        (None, Some(_)) => format!("new in {week_b}"),
        (Some(_), None) => format!("missing in {week_b}"),
        (Some(x), Some(y)) if x == y => "unchanged".to_string(),
        (Some(x), Some(y)) => format!("{x} -> {y}"),
    }
}

// ── Filter options ────────────────────────────────────────────────────────────

/// Distinct values available for filtering, each sorted ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub weeks: Vec<WeekCode>,
    pub modules: Vec<String>,
    pub assignees: Vec<String>,
}

// ── TaskAggregator ────────────────────────────────────────────────────────────

/// Stateless helper producing the aggregated views.
pub struct TaskAggregator;

impl TaskAggregator {
    /// Grouped, sorted listing with staleness flags and group spans.
    pub fn project_listing(tasks: &[Task], filter: &ListingFilter) -> Vec<ProjectRow> {
        let status_map = WeeklyStatusMap::build(tasks);
        Self::project_listing_with(tasks, filter, &status_map)
    }

    /// [`project_listing`](Self::project_listing) with a pre-built status map.
    pub fn project_listing_with(
        tasks: &[Task],
        filter: &ListingFilter,
        status_map: &WeeklyStatusMap,
    ) -> Vec<ProjectRow> {
        let mut rows: Vec<ProjectRow> = tasks
            .iter()
            .filter(|t| filter.matches(t))
            .map(|t| ProjectRow {
                stale: Self::is_stale(t, &filter.weeks, status_map),
                task: t.clone(),
                module_span: 0,
                assignee_span: 0,
            })
            .collect();

        rows.sort_by(|a, b| {
            a.task
                .module
                .cmp(&b.task.module)
                .then_with(|| a.task.assignee.cmp(&b.task.assignee))
                .then_with(|| a.task.status.rank().cmp(&b.task.status.rank()))
                .then_with(|| a.task.name.cmp(&b.task.name))
                .then_with(|| a.task.task_id.cmp(&b.task.task_id))
        });

        let module_spans = first_of_run_spans(&rows, |r| r.task.module.clone());
        let assignee_spans =
            first_of_run_spans(&rows, |r| (r.task.module.clone(), r.task.assignee.clone()));
        for (row, (m, a)) in rows.iter_mut().zip(module_spans.into_iter().zip(assignee_spans)) {
            row.module_span = m;
            row.assignee_span = a;
        }

        rows
    }

    /// `true` when the task was done in the week before any selected week
    /// while still carrying a selected week's label.
    ///
    /// With no explicit selection the selected weeks are the ones the row
    /// itself carries.
    fn is_stale(task: &Task, selection: &WeekSelection, status_map: &WeeklyStatusMap) -> bool {
        let identity = task.identity();
        let done_before = |week: WeekCode| {
            week.previous()
                .is_some_and(|prev| status_map.status(&identity, prev) == Some(Status::Done))
        };
        match selection {
            WeekSelection::All => task.weeks.iter().any(|&w| done_before(w)),
            WeekSelection::Only(selected) => {
                selection.intersects(&task.weeks) && selected.iter().any(|&w| done_before(w))
            }
        }
    }

    /// Difficulty histogram per assignee, busiest first.
    pub fn workload(tasks: &[Task], selection: &WeekSelection) -> Vec<WorkloadRow> {
        let mut by_assignee: HashMap<&str, [u32; 5]> = HashMap::new();

        for task in tasks.iter().filter(|t| selection.intersects(&t.weeks)) {
            let buckets = by_assignee.entry(task.assignee.as_str()).or_default();
            if (1..=5).contains(&task.story_point) {
                buckets[usize::from(task.story_point) - 1] += 1;
            }
        }

        let mut rows: Vec<WorkloadRow> = by_assignee
            .into_iter()
            .map(|(assignee, buckets)| WorkloadRow {
                assignee: assignee.to_string(),
                total: buckets.iter().sum(),
                buckets,
            })
            .collect();

        rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.assignee.cmp(&b.assignee)));
        rows
    }

    /// Compare every task's merged status in `week_a` against `week_b`.
    ///
    /// Returns an empty comparison when either week is unset.
    pub fn compare_weeks(
        tasks: &[Task],
        week_a: Option<WeekCode>,
        week_b: Option<WeekCode>,
    ) -> Comparison {
        let status_map = WeeklyStatusMap::build(tasks);
        Self::compare_weeks_with(tasks, week_a, week_b, &status_map)
    }

    /// [`compare_weeks`](Self::compare_weeks) with a pre-built status map.
    pub fn compare_weeks_with(
        tasks: &[Task],
        week_a: Option<WeekCode>,
        week_b: Option<WeekCode>,
        status_map: &WeeklyStatusMap,
    ) -> Comparison {
        let (Some(a), Some(b)) = (week_a, week_b) else {
            return Comparison {
                week_a,
                week_b,
                ..Default::default()
            };
        };

        // Representative row per identity: labelled with B, else with A.
        let mut order: Vec<TaskIdentity> = Vec::new();
        let mut representative: HashMap<TaskIdentity, &Task> = HashMap::new();
        for task in tasks {
            let identity = task.identity();
            let in_b = task.has_week(b);
            if !in_b && !task.has_week(a) {
                continue;
            }
            let store = match representative.get(&identity) {
                None => {
                    order.push(identity.clone());
                    true
                }
                Some(existing) => in_b && !existing.has_week(b),
            };
            if store {
                representative.insert(identity, task);
            }
        }

        let mut rows: Vec<CompareRow> = order
            .iter()
            .filter_map(|identity| {
                let task = representative.get(identity)?;
                let status_a = status_map.status(identity, a);
                let status_b = status_map.status(identity, b);
                if status_a.is_none() && status_b.is_none() {
                    return None;
                }
                Some(CompareRow {
                    task_id: task.task_id.clone(),
                    task_url: task.task_url.clone(),
                    name: task.name.clone(),
                    module: task.module.clone(),
                    assignee: task.assignee.clone(),
                    status_a,
                    status_b,
                    transition: transition_text(status_a, status_b, b),
                    invalid_done_both: status_a == Some(Status::Done)
                        && status_b == Some(Status::Done),
                    missing_next_week_label: matches!(status_a, Some(s) if s != Status::Done)
                        && status_b.is_none(),
                })
            })
            .collect();

        rows.sort_by(|x, y| {
            x.module
                .cmp(&y.module)
                .then_with(|| x.assignee.cmp(&y.assignee))
                .then_with(|| y.invalid_done_both.cmp(&x.invalid_done_both))
                .then_with(|| x.task_id.cmp(&y.task_id))
        });

        let summary = ComparisonSummary {
            total: rows.len(),
            changed: rows.iter().filter(|r| r.status_a != r.status_b).count(),
            invalid_done_both: rows.iter().filter(|r| r.invalid_done_both).count(),
            same_week: a == b,
        };

        Comparison {
            week_a,
            week_b,
            rows,
            summary,
        }
    }

    /// Distinct weeks, modules and assignees in the collection.
    pub fn filter_options(tasks: &[Task]) -> FilterOptions {
        let weeks: BTreeSet<WeekCode> = tasks.iter().flat_map(|t| t.weeks.iter().copied()).collect();
        let modules: BTreeSet<&str> = tasks.iter().map(|t| t.module.as_str()).collect();
        let assignees: BTreeSet<&str> = tasks.iter().map(|t| t.assignee.as_str()).collect();

        FilterOptions {
            weeks: weeks.into_iter().collect(),
            modules: modules.into_iter().map(String::from).collect(),
            assignees: assignees.into_iter().map(String::from).collect(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
