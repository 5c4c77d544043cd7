//! Thread-backed worker pool
//!
//! Work items are fed through a bounded channel to a fixed set of worker
//! threads sharing one receiver. Results come back over an unbounded channel
//! and are yielded by iterating the pool, in completion order. Failed items
//! are logged and counted in the progress error counter, never yielded.

use crate::progress::Progress;
use codeharvest_core::PoolError;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

type Outcome<R> = Result<R, PoolError>;

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Pool running `work` over every item of a sequence.
///
/// Dropping the pool before it is exhausted stops feeding new items and
/// joins every thread.
pub struct WorkerPool<R: Send + 'static> {
    results: Receiver<Outcome<R>>,
    progress: Progress,
    cancel: Arc<AtomicBool>,
    feeder: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl<R: Send + 'static> WorkerPool<R> {
    pub fn new<T, I, F, E>(items: I, num_workers: usize, progress: Progress, work: F) -> Self
    where
        T: Send + 'static,
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
        F: Fn(T) -> Result<R, E> + Send + Sync + 'static,
        E: std::fmt::Display,
    {
        let num_workers = num_workers.max(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let (item_sender, item_receiver) = mpsc::sync_channel::<T>(num_workers * 2);
        let item_receiver = Arc::new(Mutex::new(item_receiver));
        let (result_sender, results) = mpsc::channel::<Outcome<R>>();
        let work = Arc::new(work);

        let feeder = {
            let cancel = cancel.clone();
            let items = items.into_iter();
            std::thread::spawn(move || Self::feed(items, item_sender, cancel))
        };

        let workers = (0..num_workers)
            .map(|worker_id| {
                let receiver = item_receiver.clone();
                let sender = result_sender.clone();
                let work = work.clone();
                let cancel = cancel.clone();
                std::thread::spawn(move || Self::worker_thread(worker_id, receiver, sender, work, cancel))
            })
            .collect();

        Self {
            results,
            progress,
            cancel,
            feeder: Some(feeder),
            workers,
        }
    }

    fn feed<T>(items: impl Iterator<Item = T>, sender: SyncSender<T>, cancel: Arc<AtomicBool>) {
        for item in items {
            if cancel.load(Ordering::Relaxed) || sender.send(item).is_err() {
                tracing::debug!("Work feeder stopped early");
                return;
            }
        }
    }

    fn worker_thread<T, F, E>(
        worker_id: usize,
        receiver: Arc<Mutex<Receiver<T>>>,
        sender: mpsc::Sender<Outcome<R>>,
        work: Arc<F>,
        cancel: Arc<AtomicBool>,
    ) where
        F: Fn(T) -> Result<R, E>,
        E: std::fmt::Display,
    {
        tracing::debug!("Worker {} started", worker_id);

        loop {
            let item = {
                let receiver = receiver.lock().unwrap_or_else(PoisonError::into_inner);
                receiver.recv()
            };
            let Ok(item) = item else {
                break;
            };
            if cancel.load(Ordering::Relaxed) {
                break;
            }

            let outcome = match catch_unwind(AssertUnwindSafe(|| work(item))) {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(e)) => Err(PoolError::Failed(e.to_string())),
                Err(payload) => Err(PoolError::Panicked(panic_message(payload))),
            };
            if sender.send(outcome).is_err() {
                break;
            }
        }

        tracing::debug!("Worker {} shutting down", worker_id);
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    fn shutdown(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        // Workers exit on their next receive; the feeder then sees a closed queue.
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("Worker thread panicked outside of a work item");
            }
        }
        if let Some(feeder) = self.feeder.take() {
            if feeder.join().is_err() {
                tracing::error!("Work feeder panicked");
            }
        }
    }
}

impl<R: Send + 'static> Iterator for WorkerPool<R> {
    type Item = R;

    fn next(&mut self) -> Option<R> {
        loop {
            match self.results.recv() {
                Ok(Ok(result)) => {
                    self.progress.advance(1, false);
                    return Some(result);
                }
                Ok(Err(e)) => {
                    tracing::warn!("Work item failed: {}", e);
                    self.progress.advance(1, true);
                }
                Err(_) => return None,
            }
        }
    }
}

impl<R: Send + 'static> Drop for WorkerPool<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yields_every_success() {
        let progress = Progress::new("test", Some(100));
        let pool = WorkerPool::new(0..100u64, 4, progress.clone(), |n| Ok::<_, String>(n * 2));

        let mut results: Vec<u64> = pool.collect();
        results.sort();

        assert_eq!(results, (0..100).map(|n| n * 2).collect::<Vec<_>>());
        assert_eq!(progress.snapshot().completed, 100);
        assert_eq!(progress.snapshot().errors, 0);
    }

    #[test]
    fn test_failures_are_counted_not_yielded() {
        let progress = Progress::new("test", None);
        let pool = WorkerPool::new(0..10u32, 3, progress.clone(), |n| {
            if n % 5 == 0 { Err(format!("bad item {}", n)) } else { Ok(n) }
        });

        assert_eq!(pool.count(), 8);
        let snapshot = progress.snapshot();
        assert_eq!((snapshot.completed, snapshot.errors), (8, 2));
    }

    #[test]
    fn test_panicking_item_is_isolated() {
        let progress = Progress::new("test", None);
        let pool = WorkerPool::new(0..6u32, 2, progress.clone(), |n| {
            if n == 3 {
                panic!("cannot handle {}", n);
            }
            Ok::<_, String>(n)
        });

        assert_eq!(pool.count(), 5);
        assert_eq!(progress.snapshot().errors, 1);
    }

    #[test]
    fn test_early_drop_joins_threads() {
        let progress = Progress::new("test", None);
        let mut pool = WorkerPool::new(0..10_000u32, 2, progress, Ok::<_, String>);

        assert!(pool.next().is_some());
        drop(pool);
    }
}
