//! Progress tracking for worker pools
//!
//! A [`Progress`] is a shared handle over completed/error counters and an
//! optional total. Observers are notified on every change.

use codeharvest_core::PoolError;
use std::sync::{Arc, Mutex, PoisonError, Weak};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub errors: usize,
    pub total: Option<usize>,
}

impl ProgressSnapshot {
    /// Items finished either way.
    pub fn processed(&self) -> usize {
        self.completed + self.errors
    }
}

/// Direct field assignment; `None` leaves a field untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressUpdate {
    pub completed: Option<usize>,
    pub errors: Option<usize>,
    pub total: Option<Option<usize>>,
}

pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, label: &str, snapshot: &ProgressSnapshot);
}

/// Logs progress through `tracing`: every change at debug, every `every`
/// processed items at info.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    every: usize,
}

impl TracingObserver {
    pub fn new(every: usize) -> Self {
        Self { every: every.max(1) }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ProgressObserver for TracingObserver {
    fn on_progress(&self, label: &str, snapshot: &ProgressSnapshot) {
        let processed = snapshot.processed();
        let total = snapshot
            .total
            .map(|t| t.to_string())
            .unwrap_or_else(|| "?".to_string());
        if processed > 0 && processed % self.every == 0 {
            tracing::info!(
                "{}: {}/{} ({} errors)",
                label, snapshot.completed, total, snapshot.errors
            );
        } else {
            tracing::debug!(
                "{}: {}/{} ({} errors)",
                label, snapshot.completed, total, snapshot.errors
            );
        }
    }
}

struct ProgressState {
    snapshot: ProgressSnapshot,
    observers: Vec<Arc<dyn ProgressObserver>>,
}

/// Shared progress counters. Clones refer to the same counters.
#[derive(Clone)]
pub struct Progress {
    label: Arc<str>,
    state: Arc<Mutex<ProgressState>>,
}

impl Progress {
    pub fn new(label: &str, total: Option<usize>) -> Self {
        Self {
            label: Arc::from(label),
            state: Arc::new(Mutex::new(ProgressState {
                snapshot: ProgressSnapshot {
                    total,
                    ..Default::default()
                },
                observers: Vec::new(),
            })),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn modify(&self, change: impl FnOnce(&mut ProgressSnapshot)) {
        let (snapshot, observers) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            change(&mut state.snapshot);
            (state.snapshot, state.observers.clone())
        };
        for observer in observers {
            observer.on_progress(&self.label, &snapshot);
        }
    }

    /// Count `by` more items as completed, or as errors.
    pub fn advance(&self, by: usize, is_error: bool) {
        self.modify(|s| {
            if is_error {
                s.errors += by;
            } else {
                s.completed += by;
            }
        });
    }

    pub fn update(&self, update: ProgressUpdate) {
        self.modify(|s| {
            if let Some(completed) = update.completed {
                s.completed = completed;
            }
            if let Some(errors) = update.errors {
                s.errors = errors;
            }
            if let Some(total) = update.total {
                s.total = total;
            }
        });
    }

    pub fn set_total(&self, total: Option<usize>) {
        self.update(ProgressUpdate {
            total: Some(total),
            ..Default::default()
        });
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).snapshot
    }

    pub fn subscribe(&self, observer: Arc<dyn ProgressObserver>) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observers
            .push(observer);
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("label", &self.label)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

/// Several progress trackers reported as one aggregate.
#[derive(Clone, Default)]
pub struct ProgressGroup {
    members: Arc<Mutex<Vec<Progress>>>,
    observers: Arc<Mutex<Vec<Arc<dyn ProgressObserver>>>>,
}

/// Member observer that republishes the aggregate. Holds weak references so
/// members do not keep their group alive.
struct GroupForwarder {
    members: Weak<Mutex<Vec<Progress>>>,
    observers: Weak<Mutex<Vec<Arc<dyn ProgressObserver>>>>,
}

impl ProgressObserver for GroupForwarder {
    fn on_progress(&self, _label: &str, _snapshot: &ProgressSnapshot) {
        let (Some(members), Some(observers)) = (self.members.upgrade(), self.observers.upgrade()) else {
            return;
        };
        let members = members.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let aggregate = aggregate(&members);
        let observers = observers.lock().unwrap_or_else(PoisonError::into_inner).clone();
        for observer in observers {
            observer.on_progress("total", &aggregate);
        }
    }
}

/// Sum of every member. The total is unknown if any member's is.
fn aggregate(members: &[Progress]) -> ProgressSnapshot {
    let mut aggregate = ProgressSnapshot {
        total: Some(0),
        ..Default::default()
    };
    for member in members {
        let s = member.snapshot();
        aggregate.completed += s.completed;
        aggregate.errors += s.errors;
        aggregate.total = match (aggregate.total, s.total) {
            (Some(a), Some(b)) => Some(a + b),
            _ => None,
        };
    }
    aggregate
}

impl ProgressGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member tracker whose changes feed the aggregate.
    pub fn add(&self, label: &str, total: Option<usize>) -> Progress {
        let progress = Progress::new(label, total);
        progress.subscribe(Arc::new(GroupForwarder {
            members: Arc::downgrade(&self.members),
            observers: Arc::downgrade(&self.observers),
        }));
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(progress.clone());
        progress
    }

    pub fn members(&self) -> Vec<Progress> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        aggregate(&self.members())
    }

    /// Observe the aggregate. Called with the label `"total"`.
    pub fn subscribe(&self, observer: Arc<dyn ProgressObserver>) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Run every job on its own scoped thread, each with its own member
    /// tracker. Outcomes are returned in job order; a job that fails or
    /// panics does not affect the others.
    pub fn drive<T, F>(&self, jobs: Vec<(String, Option<usize>, F)>) -> Vec<Result<T, PoolError>>
    where
        T: Send,
        F: FnOnce(&Progress) -> Result<T, PoolError> + Send,
    {
        let tracked: Vec<(Progress, F)> = jobs
            .into_iter()
            .map(|(label, total, job)| (self.add(&label, total), job))
            .collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = tracked
                .into_iter()
                .map(|(progress, job)| {
                    let label = progress.label().to_string();
                    (label, scope.spawn(move || job(&progress)))
                })
                .collect();

            handles
                .into_iter()
                .map(|(label, handle)| match handle.join() {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::error!("Job {} panicked", label);
                        Err(PoolError::Panicked(label))
                    }
                })
                .collect()
        })
    }
}
