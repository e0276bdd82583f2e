//! Cooperative, cancellable row sorting
//!
//! A sort runs as a [`SortTask`]: keys are snapshotted up front, then rows are
//! binary-inserted into the output a fixed batch at a time. The [`SortEngine`]
//! queues tasks and advances the front one per [`SortEngine::tick`], so the
//! host decides when to yield between batches. Starting a new sort cancels
//! every queued task; a cancelled task notices at its next batch boundary and
//! is dropped without publishing anything.
//!
//! Tasks only ever produce a permutation of row ids. The rows themselves stay
//! where they are.

use std::cmp::Ordering;
use std::collections::VecDeque;

use gridview_core::{
    ColumnSpec, ColumnType, ComparableValue, Comparator, FunctionRegistry, RowId, RowRecord,
    SortDirection, TypeConverter, DEFAULT_SORT_BATCH_SIZE,
};
use tokio_util::sync::CancellationToken;

pub type SortTaskId = u64;

/// Lifecycle of a sort task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortTaskState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Result of advancing a task by one batch
#[derive(Debug, Clone, PartialEq)]
pub enum SortStep {
    /// A batch was inserted; more rows remain
    Yielded { processed: usize, remaining: usize },
    /// All rows are in place
    Completed(Vec<RowId>),
    /// Cancellation was observed; nothing is published
    Cancelled,
}

/// A finished or abandoned task reported by [`SortEngine::tick`]
#[derive(Debug, Clone, PartialEq)]
pub enum SortOutcome {
    Progress {
        task: SortTaskId,
        remaining: usize,
    },
    Completed {
        task: SortTaskId,
        column: usize,
        direction: SortDirection,
        order: Vec<RowId>,
    },
    Cancelled {
        task: SortTaskId,
    },
}

enum KeyOrder {
    Default,
    Custom(Comparator),
}

enum SortKey {
    Value(ComparableValue),
    Raw(String),
}

/// One in-progress sort over a snapshot of row keys
pub struct SortTask {
    id: SortTaskId,
    column: usize,
    direction: SortDirection,
    batch_size: usize,
    state: SortTaskState,
    order: KeyOrder,
    queue: VecDeque<(RowId, SortKey)>,
    sorted: Vec<(RowId, SortKey)>,
    cancel: CancellationToken,
}

impl SortTask {
    /// Snapshot the comparison keys of `rows` for `column`.
    ///
    /// A custom column type whose comparator is not registered falls back to
    /// the default ordering.
    pub fn new(
        id: SortTaskId,
        rows: &[&RowRecord],
        column: &ColumnSpec,
        direction: SortDirection,
        registry: &FunctionRegistry,
        batch_size: usize,
    ) -> Self {
        let comparator = match &column.column_type {
            ColumnType::Custom(name) => registry.comparator(name),
            _ => None,
        };

        let queue = rows
            .iter()
            .map(|row| {
                let raw = row.cell(column.index).unwrap_or_default();
                let key = if comparator.is_some() {
                    SortKey::Raw(raw.to_string())
                } else {
                    SortKey::Value(TypeConverter::convert(
                        raw,
                        &column.column_type,
                        column.wants_markup,
                    ))
                };
                (row.id, key)
            })
            .collect::<VecDeque<_>>();

        Self {
            id,
            column: column.index,
            direction,
            batch_size: batch_size.max(1),
            state: SortTaskState::Idle,
            order: match comparator {
                Some(comparator) => KeyOrder::Custom(comparator),
                None => KeyOrder::Default,
            },
            sorted: Vec::with_capacity(queue.len()),
            queue,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> SortTaskId {
        self.id
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn state(&self) -> SortTaskState {
        self.state
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Token that cancels this task when triggered
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Insert the next batch of rows, checking for cancellation first
    pub fn step(&mut self) -> SortStep {
        match self.state {
            SortTaskState::Cancelled => return SortStep::Cancelled,
            SortTaskState::Completed => return SortStep::Completed(self.published_order()),
            _ => {}
        }
        if self.cancel.is_cancelled() {
            self.state = SortTaskState::Cancelled;
            self.queue.clear();
            self.sorted.clear();
            return SortStep::Cancelled;
        }
        self.state = SortTaskState::Running;

        let mut processed = 0;
        while processed < self.batch_size {
            let Some(item) = self.queue.pop_front() else {
                break;
            };
            let position = self
                .sorted
                .partition_point(|probe| self.compare(&probe.1, &item.1) != Ordering::Greater);
            self.sorted.insert(position, item);
            processed += 1;
        }

        if self.queue.is_empty() {
            self.state = SortTaskState::Completed;
            SortStep::Completed(self.published_order())
        } else {
            SortStep::Yielded {
                processed,
                remaining: self.queue.len(),
            }
        }
    }

    fn published_order(&self) -> Vec<RowId> {
        self.sorted.iter().map(|(id, _)| *id).collect()
    }

    /// `direction` when `a > b`, `-direction` when `a < b`, equal otherwise
    fn compare(&self, a: &SortKey, b: &SortKey) -> Ordering {
        match (&self.order, a, b) {
            (KeyOrder::Custom(comparator), SortKey::Raw(a), SortKey::Raw(b)) => {
                comparator(a, b, self.direction)
            }
            (_, SortKey::Value(a), SortKey::Value(b)) => {
                let ordering = if a > b {
                    Ordering::Greater
                } else if a < b {
                    Ordering::Less
                } else {
                    Ordering::Equal
                };
                match self.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            }
            _ => Ordering::Equal,
        }
    }
}

impl std::fmt::Debug for SortTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortTask")
            .field("id", &self.id)
            .field("column", &self.column)
            .field("direction", &self.direction)
            .field("state", &self.state)
            .field("remaining", &self.queue.len())
            .finish()
    }
}

/// Queue of sort tasks driven one batch per tick
#[derive(Debug)]
pub struct SortEngine {
    batch_size: usize,
    tasks: VecDeque<SortTask>,
    next_id: SortTaskId,
}

impl Default for SortEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SORT_BATCH_SIZE)
    }
}

impl SortEngine {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            tasks: VecDeque::new(),
            next_id: 1,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Queue a sort of `rows` (display order) by `column`.
    ///
    /// Every task already queued is cancelled and dropped first.
    pub fn start(
        &mut self,
        rows: &[&RowRecord],
        column: &ColumnSpec,
        direction: SortDirection,
        registry: &FunctionRegistry,
    ) -> SortTaskId {
        self.cancel();
        self.tasks.clear();
        let id = self.next_id;
        self.next_id += 1;
        let task = SortTask::new(id, rows, column, direction, registry, self.batch_size);
        tracing::debug!(
            task = id,
            column = column.index,
            direction = ?direction,
            rows = rows.len(),
            "sort task queued"
        );
        self.tasks.push_back(task);
        id
    }

    /// Cancel every queued task; they are discarded on the next ticks
    pub fn cancel(&mut self) {
        for task in &self.tasks {
            if !task.is_cancelled() {
                tracing::debug!(task = task.id(), "cancelling sort task");
                task.cancel();
            }
        }
    }

    /// Whether a task that can still publish is queued
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|task| !task.is_cancelled())
    }

    /// Whether any task, cancelled or not, still needs a tick
    pub fn has_pending(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Advance the front task by one batch
    pub fn tick(&mut self) -> Option<SortOutcome> {
        let task = self.tasks.front_mut()?;
        let id = task.id();
        match task.step() {
            SortStep::Yielded { remaining, .. } => Some(SortOutcome::Progress {
                task: id,
                remaining,
            }),
            SortStep::Completed(order) => {
                let column = task.column();
                let direction = task.direction();
                self.tasks.pop_front();
                tracing::info!(task = id, column, direction = ?direction, rows = order.len(), "sort completed");
                Some(SortOutcome::Completed {
                    task: id,
                    column,
                    direction,
                    order,
                })
            }
            SortStep::Cancelled => {
                self.tasks.pop_front();
                tracing::debug!(task = id, "sort task discarded after cancellation");
                Some(SortOutcome::Cancelled { task: id })
            }
        }
    }

    /// Sort `rows` in a single pass, outside the queue
    pub fn sort_now(
        rows: &[&RowRecord],
        column: &ColumnSpec,
        direction: SortDirection,
        registry: &FunctionRegistry,
    ) -> Vec<RowId> {
        let mut task = SortTask::new(0, rows, column, direction, registry, rows.len().max(1));
        loop {
            match task.step() {
                SortStep::Completed(order) => return order,
                SortStep::Yielded { .. } => continue,
                SortStep::Cancelled => return rows.iter().map(|row| row.id).collect(),
            }
        }
    }

    /// Run ticks until a task completes or the queue drains
    pub fn run_to_completion(&mut self) -> Option<SortOutcome> {
        while let Some(outcome) = self.tick() {
            if matches!(outcome, SortOutcome::Completed { .. }) {
                return Some(outcome);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rows(values: &[&str]) -> Vec<RowRecord> {
        values
            .iter()
            .enumerate()
            .map(|(id, v)| RowRecord::new(id, vec![id.to_string(), v.to_string()]))
            .collect()
    }

    fn completed_order(outcome: Option<SortOutcome>) -> Vec<RowId> {
        match outcome {
            Some(SortOutcome::Completed { order, .. }) => order,
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[test]
    fn sorts_names_both_ways() {
        let data = rows(&["c", "a", "b"]);
        let refs: Vec<&RowRecord> = data.iter().collect();
        let spec = ColumnSpec::new(1, ColumnType::StrSensitive);
        let registry = FunctionRegistry::new();
        let mut engine = SortEngine::default();

        engine.start(&refs, &spec, SortDirection::Ascending, &registry);
        assert_eq!(completed_order(engine.run_to_completion()), vec![1, 2, 0]);

        engine.start(&refs, &spec, SortDirection::Descending, &registry);
        assert_eq!(completed_order(engine.run_to_completion()), vec![0, 2, 1]);
    }

    #[test]
    fn numeric_columns_sort_by_value() {
        let data = rows(&["10", "9", "100", "-1"]);
        let refs: Vec<&RowRecord> = data.iter().collect();
        let mut engine = SortEngine::default();
        engine.start(
            &refs,
            &ColumnSpec::new(1, ColumnType::Int),
            SortDirection::Ascending,
            &FunctionRegistry::new(),
        );
        assert_eq!(completed_order(engine.run_to_completion()), vec![3, 1, 0, 2]);
    }

    #[test]
    fn equal_keys_keep_input_order() {
        let data = rows(&["b", "a", "B", "A"]);
        let refs: Vec<&RowRecord> = data.iter().collect();
        let mut engine = SortEngine::default();
        engine.start(
            &refs,
            &ColumnSpec::new(1, ColumnType::StrInsensitive),
            SortDirection::Ascending,
            &FunctionRegistry::new(),
        );
        assert_eq!(completed_order(engine.run_to_completion()), vec![1, 3, 0, 2]);
    }

    #[test]
    fn unparsable_numbers_do_not_panic() {
        let data = rows(&["3", "oops", "1", "", "2"]);
        let refs: Vec<&RowRecord> = data.iter().collect();
        let mut engine = SortEngine::default();
        engine.start(
            &refs,
            &ColumnSpec::new(1, ColumnType::Float),
            SortDirection::Ascending,
            &FunctionRegistry::new(),
        );
        let order = completed_order(engine.run_to_completion());
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn large_sorts_yield_between_batches() {
        let values: Vec<String> = (0..35).rev().map(|n| n.to_string()).collect();
        let data: Vec<RowRecord> = values
            .iter()
            .enumerate()
            .map(|(id, v)| RowRecord::new(id, vec![v.clone()]))
            .collect();
        let refs: Vec<&RowRecord> = data.iter().collect();
        let mut engine = SortEngine::new(10);
        engine.start(
            &refs,
            &ColumnSpec::new(0, ColumnType::Int),
            SortDirection::Ascending,
            &FunctionRegistry::new(),
        );

        let mut progress = Vec::new();
        let order = loop {
            match engine.tick() {
                Some(SortOutcome::Progress { remaining, .. }) => progress.push(remaining),
                Some(SortOutcome::Completed { order, .. }) => break order,
                other => panic!("unexpected {:?}", other),
            }
        };
        assert_eq!(progress, vec![25, 15, 5]);
        assert_eq!(order, (0..35).rev().collect::<Vec<_>>());
        assert!(!engine.has_pending());
    }

    #[test]
    fn new_sort_cancels_the_running_one() {
        let values: Vec<String> = (0..50).map(|n| format!("{:02}", n)).collect();
        let data: Vec<RowRecord> = values
            .iter()
            .enumerate()
            .map(|(id, v)| RowRecord::new(id, vec![v.clone()]))
            .collect();
        let refs: Vec<&RowRecord> = data.iter().collect();
        let registry = FunctionRegistry::new();
        let spec = ColumnSpec::new(0, ColumnType::Int);
        let mut engine = SortEngine::new(10);

        let first = engine.start(&refs, &spec, SortDirection::Ascending, &registry);
        assert!(matches!(engine.tick(), Some(SortOutcome::Progress { .. })));

        let second = engine.start(&refs, &spec, SortDirection::Descending, &registry);
        assert!(matches!(
            engine.tick(),
            Some(SortOutcome::Progress { task, .. }) if task == second
        ));
        assert_ne!(first, second);

        let mut completions = Vec::new();
        while let Some(outcome) = engine.tick() {
            if let SortOutcome::Completed { task, direction, .. } = outcome {
                completions.push((task, direction));
            }
        }
        assert_eq!(completions, vec![(second, SortDirection::Descending)]);
    }

    #[test]
    fn restarting_drops_superseded_tasks() {
        let data = rows(&["c", "b", "a"]);
        let refs: Vec<&RowRecord> = data.iter().collect();
        let spec = ColumnSpec::new(1, ColumnType::None);
        let registry = FunctionRegistry::new();
        let mut engine = SortEngine::default();
        for _ in 0..5 {
            engine.start(&refs, &spec, SortDirection::Ascending, &registry);
        }
        assert_eq!(engine.tasks.len(), 1);
        assert_eq!(completed_order(engine.run_to_completion()), vec![2, 1, 0]);
        assert!(!engine.has_pending());
    }

    #[test]
    fn one_pass_sort_matches_queued_sort() {
        let data = rows(&["10", "9", "100", "-1"]);
        let refs: Vec<&RowRecord> = data.iter().collect();
        let spec = ColumnSpec::new(1, ColumnType::Int);
        let order =
            SortEngine::sort_now(&refs, &spec, SortDirection::Descending, &FunctionRegistry::new());
        assert_eq!(order, vec![2, 0, 1, 3]);
    }

    #[test]
    fn explicit_cancel_discards_the_task() {
        let data = rows(&["b", "a"]);
        let refs: Vec<&RowRecord> = data.iter().collect();
        let mut engine = SortEngine::default();
        let id = engine.start(
            &refs,
            &ColumnSpec::new(1, ColumnType::None),
            SortDirection::Ascending,
            &FunctionRegistry::new(),
        );
        engine.cancel();
        assert!(!engine.is_running());
        assert_eq!(engine.tick(), Some(SortOutcome::Cancelled { task: id }));
        assert_eq!(engine.tick(), None);
    }

    #[test]
    fn task_reports_its_state_transitions() {
        let data = rows(&["b", "a"]);
        let refs: Vec<&RowRecord> = data.iter().collect();
        let mut task = SortTask::new(
            7,
            &refs,
            &ColumnSpec::new(1, ColumnType::None),
            SortDirection::Ascending,
            &FunctionRegistry::new(),
            1,
        );
        assert_eq!(task.state(), SortTaskState::Idle);
        assert_eq!(task.step(), SortStep::Yielded { processed: 1, remaining: 1 });
        assert_eq!(task.state(), SortTaskState::Running);
        assert_eq!(task.step(), SortStep::Completed(vec![1, 0]));
        assert_eq!(task.state(), SortTaskState::Completed);
    }

    #[test]
    fn custom_comparator_replaces_default_ordering() {
        let data = rows(&["low", "high", "medium"]);
        let refs: Vec<&RowRecord> = data.iter().collect();
        let mut registry = FunctionRegistry::new();
        registry.register_comparator("priority", |a: &str, b: &str, dir: SortDirection| {
            let rank = |s: &str| match s {
                "high" => 0,
                "medium" => 1,
                _ => 2,
            };
            let ordering = rank(a).cmp(&rank(b));
            if dir == SortDirection::Descending { ordering.reverse() } else { ordering }
        });
        let spec = ColumnSpec::new(1, ColumnType::Custom("priority".into()));
        let mut engine = SortEngine::default();
        engine.start(&refs, &spec, SortDirection::Ascending, &registry);
        assert_eq!(completed_order(engine.run_to_completion()), vec![1, 2, 0]);

        // Unknown comparator names fall back to the default string order
        let spec = ColumnSpec::new(1, ColumnType::Custom("unknown".into()));
        engine.start(&refs, &spec, SortDirection::Ascending, &registry);
        assert_eq!(completed_order(engine.run_to_completion()), vec![1, 0, 2]);
    }
}
