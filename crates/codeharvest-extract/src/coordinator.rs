//! Orchestrates parallel extraction

use crate::aggregator::ResultAggregator;
use crate::config::ExtractConfig;
use crate::enumerator::{WorkEnumerator, WorkItem, WorkQueue};
use crate::pool::WorkerPool;
use crate::progress::{Progress, TracingObserver};
use crate::registry::{self, ExtractorRegistry};
use codeharvest_core::{FunctionCollection, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

/// A validated, enumerated extraction that has not started yet.
pub struct ExtractionJob {
    root: PathBuf,
    config: ExtractConfig,
    queue: WorkQueue,
}

impl ExtractionJob {
    /// Validate `config` against `root` and enumerate the work.
    ///
    /// With accurate progress the whole tree is walked here.
    pub fn new(root: &Path, config: ExtractConfig, registry: &ExtractorRegistry) -> Result<Self> {
        let queue = WorkEnumerator::new(root, &config, registry)?.enumerate();
        Ok(Self {
            root: root.to_path_buf(),
            config,
            queue,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of work items, when enumerated up front.
    pub fn total(&self) -> Option<usize> {
        self.queue.total()
    }

    /// Run to completion, reporting into `progress`.
    pub fn run(self, progress: &Progress) -> Result<FunctionCollection> {
        let ExtractionJob { root, config, queue } = self;

        let mut aggregator = ResultAggregator::from_config(&root, &config);
        if config.use_checkpoint() {
            aggregator.resume()?;
        }

        progress.set_total(queue.total());
        let workers = config.workers().count();
        tracing::debug!("Extracting with {} workers", workers);
        let pool = WorkerPool::new(queue, workers, progress.clone(), |item: WorkItem| item.run());
        for batch in pool {
            aggregator.ingest(batch)?;
        }

        let stats = aggregator.stats();
        let snapshot = progress.snapshot();
        tracing::info!(
            "Extracted {} functions from {} files ({} failed, {} duplicates, {} transform failures, {} resumed)",
            aggregator.results().len(),
            snapshot.completed,
            snapshot.errors,
            stats.duplicates,
            stats.transform_failures,
            stats.resumed
        );

        match aggregator.store().clear() {
            Ok(0) => {}
            Ok(n) => tracing::debug!("Removed {} checkpoints after a completed run", n),
            Err(e) => tracing::warn!("Failed to remove checkpoints: {}", e),
        }

        Ok(aggregator.finish())
    }
}

/// Extract every function under `root` using `registry`.
pub fn extract_with(root: &Path, config: ExtractConfig, registry: &ExtractorRegistry) -> Result<FunctionCollection> {
    let job = ExtractionJob::new(root, config, registry)?;
    let progress = Progress::new("Extracting functions", job.total());
    progress.subscribe(Arc::new(TracingObserver::default()));
    job.run(&progress)
}

/// Extract every function under `root` using the process-wide registry.
pub fn extract(root: &Path, config: ExtractConfig) -> Result<FunctionCollection> {
    let registry = registry::global()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    extract_with(root, config, &registry)
}
