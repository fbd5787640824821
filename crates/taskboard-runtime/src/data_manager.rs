//! Lifecycle of the currently loaded dataset.
//!
//! [`DatasetManager`] holds one immutable snapshot of the last loaded file:
//! the raw records and, when columns resolved, the task collection. Loading
//! runs the decoder on tokio's blocking pool and swaps the whole snapshot in
//! one step. Views are pure functions of the snapshot and a parameter tuple;
//! the listing is memoised per [`ListingFilter`] and snapshot generation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use taskboard_core::columns::{match_columns, ColumnAliases, ColumnMapping, LogicalField};
use taskboard_core::models::{RawTable, Task, WeekCode, WeekSelection};
use taskboard_core::{Result, TaskboardError};
use taskboard_data::aggregator::{
    Comparison, FilterOptions, ListingFilter, ProjectRow, TaskAggregator, WeeklyStatusMap,
    WorkloadRow,
};
use taskboard_data::analysis::{build_tasks, DatasetMetadata};
use taskboard_data::analyzer::{AnomalyDetector, FollowUpReport, LoadBuckets};
use taskboard_data::reader::read_table;

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// Everything derived from one load attempt.
#[derive(Debug, Default)]
struct Snapshot {
    raw: Option<Arc<RawTable>>,
    tasks: Option<Arc<Vec<Task>>>,
    status_map: Option<Arc<WeeklyStatusMap>>,
    mapping: Option<ColumnMapping>,
    metadata: Option<DatasetMetadata>,
    last_error: Option<String>,
    /// Bumped on every load attempt and clear.
    generation: u64,
}

/// Cached listings, each tagged with the snapshot generation it was built from.
type ListingCache = HashMap<ListingFilter, (u64, Arc<Vec<ProjectRow>>)>;

/// Result of decoding one file on the blocking pool.
enum LoadOutcome {
    Loaded {
        raw: RawTable,
        mapping: ColumnMapping,
        tasks: Vec<Task>,
        metadata: DatasetMetadata,
    },
    Rejected {
        raw: Option<RawTable>,
        error: TaskboardError,
    },
}

/// Clears the pending flag when a load finishes, however it finishes.
struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ── DatasetManager ────────────────────────────────────────────────────────────

/// Owner of the current dataset snapshot.
///
/// # Example
/// ```no_run
/// use taskboard_runtime::data_manager::DatasetManager;
/// use taskboard_core::columns::ColumnAliases;
///
/// # async fn run() -> taskboard_core::Result<()> {
/// let manager = DatasetManager::new(ColumnAliases::default());
/// let metadata = manager.load("export.csv").await?;
/// println!("{} rows", metadata.rows_read);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct DatasetManager {
    aliases: Arc<ColumnAliases>,
    snapshot: RwLock<Snapshot>,
    loading: AtomicBool,
    listing_cache: Mutex<ListingCache>,
}

impl DatasetManager {
    pub fn new(aliases: ColumnAliases) -> Self {
        Self {
            aliases: Arc::new(aliases),
            ..Default::default()
        }
    }

    // ── Loading ───────────────────────────────────────────────────────────

    /// Decode `path` and replace the current snapshot.
    ///
    /// Only one load may be pending; a second call made meanwhile fails with
    /// [`TaskboardError::LoadInProgress`] and leaves the pending load and the
    /// current snapshot alone. Any other failure clears the task collection,
    /// and clears the raw records too unless the failure was
    /// [`TaskboardError::MissingRequiredColumns`].
    pub async fn load(&self, path: impl Into<PathBuf>) -> Result<DatasetMetadata> {
        if self
            .loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("load requested while another load is pending; rejected");
            return Err(TaskboardError::LoadInProgress);
        }
        let _pending = PendingGuard(&self.loading);

        let path = path.into();
        let aliases = Arc::clone(&self.aliases);
        let source = path.clone();
        let outcome = tokio::task::spawn_blocking(move || decode(&source, &aliases))
            .await
            .unwrap_or_else(|e| LoadOutcome::Rejected {
                raw: None,
                error: TaskboardError::unreadable(&path, format!("decoder task failed: {e}")),
            });

        self.apply(outcome)
    }

    /// Drop the current snapshot entirely.
    pub fn clear(&self) {
        {
            let mut snapshot = self.write_snapshot();
            let generation = snapshot.generation + 1;
            *snapshot = Snapshot {
                generation,
                ..Default::default()
            };
        }
        self.invalidate_cache();
        tracing::debug!("dataset cleared");
    }

    /// `true` while a load is running.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    fn apply(&self, outcome: LoadOutcome) -> Result<DatasetMetadata> {
        let result = {
            let mut snapshot = self.write_snapshot();
            let generation = snapshot.generation + 1;
            match outcome {
                LoadOutcome::Loaded {
                    raw,
                    mapping,
                    tasks,
                    metadata,
                } => {
                    let status_map = WeeklyStatusMap::build(&tasks);
                    *snapshot = Snapshot {
                        raw: Some(Arc::new(raw)),
                        tasks: Some(Arc::new(tasks)),
                        status_map: Some(Arc::new(status_map)),
                        mapping: Some(mapping),
                        metadata: Some(metadata.clone()),
                        last_error: None,
                        generation,
                    };
                    Ok(metadata)
                }
                LoadOutcome::Rejected { raw, error } => {
                    tracing::warn!("load failed: {error}");
                    *snapshot = Snapshot {
                        raw: raw.map(Arc::new),
                        last_error: Some(error.to_string()),
                        generation,
                        ..Default::default()
                    };
                    Err(error)
                }
            }
        };
        self.invalidate_cache();
        result
    }

    // ── Snapshot accessors ────────────────────────────────────────────────

    /// Current task collection, `None` when nothing usable is loaded.
    pub fn tasks(&self) -> Option<Arc<Vec<Task>>> {
        self.read_snapshot().tasks.clone()
    }

    /// Raw records of the last load, kept after a column-resolution failure.
    pub fn raw(&self) -> Option<Arc<RawTable>> {
        self.read_snapshot().raw.clone()
    }

    pub fn mapping(&self) -> Option<ColumnMapping> {
        self.read_snapshot().mapping.clone()
    }

    pub fn metadata(&self) -> Option<DatasetMetadata> {
        self.read_snapshot().metadata.clone()
    }

    /// Message of the last failed load, cleared by the next successful one.
    pub fn last_error(&self) -> Option<String> {
        self.read_snapshot().last_error.clone()
    }

    /// Per-field header resolution against the raw headers, for inspection.
    pub fn column_matches(&self) -> Option<Vec<(LogicalField, Option<String>)>> {
        let raw = self.raw()?;
        Some(match_columns(&raw.headers, &self.aliases))
    }

    // ── Views ─────────────────────────────────────────────────────────────

    /// Grouped project listing, memoised per filter until the next load.
    ///
    /// Cache entries only count when built from the current snapshot
    /// generation, so a listing computed across a reload is never served.
    pub fn listing(&self, filter: &ListingFilter) -> Arc<Vec<ProjectRow>> {
        let (generation, tasks, status_map) = {
            let snapshot = self.read_snapshot();
            (
                snapshot.generation,
                snapshot.tasks.clone().unwrap_or_default(),
                snapshot.status_map.clone().unwrap_or_default(),
            )
        };

        if let Some((built, hit)) = self.lock_cache().get(filter) {
            if *built == generation {
                tracing::debug!("listing served from cache");
                return Arc::clone(hit);
            }
        }

        let rows = Arc::new(TaskAggregator::project_listing_with(
            &tasks,
            filter,
            &status_map,
        ));
        self.store_listing(generation, filter, &rows);
        rows
    }

    pub fn workload(&self, selection: &WeekSelection) -> Vec<WorkloadRow> {
        let (tasks, _) = self.task_view();
        TaskAggregator::workload(&tasks, selection)
    }

    pub fn comparison(&self, week_a: Option<WeekCode>, week_b: Option<WeekCode>) -> Comparison {
        let (tasks, status_map) = self.task_view();
        TaskAggregator::compare_weeks_with(&tasks, week_a, week_b, &status_map)
    }

    pub fn follow_up(&self, current_week: WeekCode) -> FollowUpReport {
        let (tasks, _) = self.task_view();
        AnomalyDetector::new(current_week).follow_up(&tasks)
    }

    pub fn stalled(&self, current_week: WeekCode) -> Vec<Task> {
        let (tasks, _) = self.task_view();
        AnomalyDetector::new(current_week).stalled_tasks(&tasks)
    }

    pub fn load_buckets(&self, current_week: WeekCode) -> Vec<LoadBuckets> {
        let (tasks, _) = self.task_view();
        AnomalyDetector::new(current_week).load_buckets(&tasks)
    }

    pub fn filter_options(&self) -> FilterOptions {
        let (tasks, _) = self.task_view();
        TaskAggregator::filter_options(&tasks)
    }

    // ── Private helpers ───────────────────────────────────────────────────

    /// Tasks and status map of the current snapshot; empty when unloaded.
    fn task_view(&self) -> (Arc<Vec<Task>>, Arc<WeeklyStatusMap>) {
        let snapshot = self.read_snapshot();
        (
            snapshot.tasks.clone().unwrap_or_default(),
            snapshot.status_map.clone().unwrap_or_default(),
        )
    }

    /// Cache `rows` unless the snapshot moved on since `generation`.
    fn store_listing(&self, generation: u64, filter: &ListingFilter, rows: &Arc<Vec<ProjectRow>>) {
        // The read guard keeps `apply` from swapping the snapshot mid-insert.
        let snapshot = self.read_snapshot();
        if snapshot.generation != generation {
            tracing::debug!("dataset replaced while building listing; not cached");
            return;
        }
        self.lock_cache()
            .insert(filter.clone(), (generation, Arc::clone(rows)));
    }

    fn invalidate_cache(&self) {
        self.lock_cache().clear();
    }

    fn read_snapshot(&self) -> std::sync::RwLockReadGuard<'_, Snapshot> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_snapshot(&self) -> std::sync::RwLockWriteGuard<'_, Snapshot> {
        self.snapshot.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, ListingCache> {
        self.listing_cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read and normalise one file. Runs on the blocking pool.
fn decode(path: &Path, aliases: &ColumnAliases) -> LoadOutcome {
    let started = Instant::now();

    let raw = match read_table(path) {
        Ok(raw) => raw,
        Err(error) => return LoadOutcome::Rejected { raw: None, error },
    };

    match build_tasks(&raw, aliases) {
        Ok((mapping, tasks)) => {
            let metadata = DatasetMetadata::describe(path, &raw, &tasks, started);
            tracing::info!("Loaded {} tasks from {}", tasks.len(), metadata.source);
            LoadOutcome::Loaded {
                raw,
                mapping,
                tasks,
                metadata,
            }
        }
        Err(error) => {
            let raw = error.keeps_raw_records().then_some(raw);
            LoadOutcome::Rejected { raw, error }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str =
        "Task Key,Issue Type,Assignee,Story Point,Summary,Labels,Epic Link,Module,Status";

    fn write_csv(dir: &TempDir, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, lines.join("\n")).expect("write csv");
        path
    }

    fn week(n: u8) -> WeekCode {
        WeekCode::new(n).unwrap()
    }

    fn valid_file(dir: &TempDir) -> PathBuf {
        write_csv(
            dir,
            "valid.csv",
            &[
                HEADER,
                "PROJ-1,Story,alice,3,Checkout,W01,EPIC-1,Payments,Done",
                "PROJ-1,Story,alice,3,Checkout,W02,EPIC-1,Payments,In Progress",
                "PROJ-2,Bug,bob,5,Crash,\"W01, W02\",EPIC-2,Mobile,done",
            ],
        )
    }

    #[tokio::test]
    async fn test_load_replaces_snapshot() {
        let dir = TempDir::new().unwrap();
        let manager = DatasetManager::new(ColumnAliases::default());

        let metadata = manager.load(valid_file(&dir)).await.unwrap();
        assert_eq!(metadata.rows_read, 3);
        assert_eq!(manager.tasks().unwrap().len(), 3);
        assert!(manager.raw().is_some());
        assert!(manager.mapping().is_some());
        assert!(manager.last_error().is_none());
        assert!(!manager.is_loading());
    }

    #[tokio::test]
    async fn test_missing_columns_keeps_raw_clears_tasks() {
        let dir = TempDir::new().unwrap();
        let manager = DatasetManager::new(ColumnAliases::default());
        manager.load(valid_file(&dir)).await.unwrap();

        let bad = write_csv(
            &dir,
            "bad.csv",
            &[
                "Task Key,Issue Type,Assignee,Story Point,Summary,Labels,Epic Link,Module",
                "PROJ-1,Story,alice,3,Checkout,W01,EPIC-1,Payments",
            ],
        );
        let err = manager.load(bad).await.unwrap_err();

        assert!(matches!(err, TaskboardError::MissingRequiredColumns { .. }));
        assert!(manager.tasks().is_none());
        assert_eq!(manager.raw().unwrap().len(), 1);
        assert!(manager.last_error().unwrap().contains("Status"));

        let matches = manager.column_matches().unwrap();
        let status = matches
            .iter()
            .find(|(field, _)| *field == LogicalField::Status)
            .unwrap();
        assert!(status.1.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_and_empty_clear_everything() {
        let dir = TempDir::new().unwrap();
        let manager = DatasetManager::new(ColumnAliases::default());

        manager.load(valid_file(&dir)).await.unwrap();
        let err = manager.load(dir.path().join("gone.csv")).await.unwrap_err();
        assert!(matches!(err, TaskboardError::UnreadableInput { .. }));
        assert!(manager.tasks().is_none());
        assert!(manager.raw().is_none());

        manager.load(valid_file(&dir)).await.unwrap();
        let empty = write_csv(&dir, "empty.csv", &[HEADER]);
        let err = manager.load(empty).await.unwrap_err();
        assert!(matches!(err, TaskboardError::EmptyInput));
        assert!(manager.tasks().is_none());
        assert!(manager.raw().is_none());
    }

    #[tokio::test]
    async fn test_second_load_rejected_while_pending() {
        let dir = TempDir::new().unwrap();
        let manager = DatasetManager::new(ColumnAliases::default());
        manager.load(valid_file(&dir)).await.unwrap();

        manager.loading.store(true, Ordering::Release);
        let err = manager.load(valid_file(&dir)).await.unwrap_err();
        assert!(matches!(err, TaskboardError::LoadInProgress));
        // Neither the flag nor the snapshot is touched by the rejected call.
        assert!(manager.is_loading());
        assert_eq!(manager.tasks().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_listing_cache_invalidated_on_load() {
        let dir = TempDir::new().unwrap();
        let manager = DatasetManager::new(ColumnAliases::default());
        manager.load(valid_file(&dir)).await.unwrap();

        let filter = ListingFilter::default();
        let first = manager.listing(&filter);
        let second = manager.listing(&filter);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 3);

        let smaller = write_csv(
            &dir,
            "smaller.csv",
            &[HEADER, "PROJ-9,Task,carol,1,Docs,W03,EPIC-3,Docs,open"],
        );
        manager.load(smaller).await.unwrap();
        let third = manager.listing(&filter);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.len(), 1);
    }

    #[tokio::test]
    async fn test_listing_built_before_reload_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let manager = DatasetManager::new(ColumnAliases::default());
        manager.load(valid_file(&dir)).await.unwrap();

        let filter = ListingFilter::default();
        let (generation, tasks, status_map) = {
            let snapshot = manager.read_snapshot();
            (
                snapshot.generation,
                snapshot.tasks.clone().unwrap(),
                snapshot.status_map.clone().unwrap(),
            )
        };
        let old_rows = Arc::new(TaskAggregator::project_listing_with(
            &tasks,
            &filter,
            &status_map,
        ));

        // A reload lands between computing the rows and caching them.
        let smaller = write_csv(
            &dir,
            "smaller.csv",
            &[HEADER, "PROJ-9,Task,carol,1,Docs,W03,EPIC-3,Docs,open"],
        );
        manager.load(smaller).await.unwrap();
        manager.store_listing(generation, &filter, &old_rows);

        assert!(manager.lock_cache().is_empty());
        let fresh = manager.listing(&filter);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].task.task_id, "PROJ-9");
    }

    #[tokio::test]
    async fn test_listing_ignores_entry_from_older_generation() {
        let dir = TempDir::new().unwrap();
        let manager = DatasetManager::new(ColumnAliases::default());
        manager.load(valid_file(&dir)).await.unwrap();

        let filter = ListingFilter::default();
        let current = manager.read_snapshot().generation;
        manager
            .lock_cache()
            .insert(filter.clone(), (current - 1, Arc::new(Vec::new())));

        assert_eq!(manager.listing(&filter).len(), 3);
    }

    #[tokio::test]
    async fn test_views_over_loaded_dataset() {
        let dir = TempDir::new().unwrap();
        let manager = DatasetManager::new(ColumnAliases::default());
        manager.load(valid_file(&dir)).await.unwrap();

        let cmp = manager.comparison(Some(week(1)), Some(week(2)));
        assert_eq!(cmp.rows.len(), 2);
        assert_eq!(cmp.summary.invalid_done_both, 1);

        let workload = manager.workload(&WeekSelection::All);
        assert_eq!(workload.len(), 2);

        let options = manager.filter_options();
        assert_eq!(options.modules, vec!["Mobile", "Payments"]);

        let follow_up = manager.follow_up(week(2));
        assert_eq!(follow_up.rows.len(), 1);
        assert_eq!(follow_up.rows[0].task_id, "PROJ-2");
    }

    #[tokio::test]
    async fn test_views_empty_without_dataset() {
        let manager = DatasetManager::new(ColumnAliases::default());
        assert!(manager.listing(&ListingFilter::default()).is_empty());
        assert!(manager.workload(&WeekSelection::All).is_empty());
        assert!(manager.stalled(week(5)).is_empty());
        assert!(manager.load_buckets(week(5)).is_empty());
        assert!(manager.column_matches().is_none());
    }

    #[tokio::test]
    async fn test_clear_drops_snapshot() {
        let dir = TempDir::new().unwrap();
        let manager = DatasetManager::new(ColumnAliases::default());
        manager.load(valid_file(&dir)).await.unwrap();

        manager.clear();
        assert!(manager.tasks().is_none());
        assert!(manager.raw().is_none());
        assert!(manager.metadata().is_none());
    }
}
