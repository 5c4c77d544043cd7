//! Result aggregation: dedup, transform, and periodic checkpoints.

use crate::config::{ExtractConfig, Transform};
use codeharvest_core::{
    CheckpointError, CheckpointStore, EXTRACTOR_CHECKPOINT_PREFIX, FunctionCollection, SourceFunction,
    TransformError,
};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

/// Counters describing one aggregation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub resumed: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub transform_failures: usize,
    pub checkpoints_saved: usize,
}

/// Owns the result map for one run.
///
/// The first unit seen for an identifier wins. Every checkpoint holds the
/// complete result set at the time it was saved.
pub struct ResultAggregator {
    results: FunctionCollection,
    transform: Option<Transform>,
    store: CheckpointStore,
    checkpoint_interval: usize,
    stats: AggregateStats,
}

impl ResultAggregator {
    pub fn new(store: CheckpointStore, checkpoint_interval: usize, transform: Option<Transform>) -> Self {
        Self {
            results: FunctionCollection::new(),
            transform,
            store,
            checkpoint_interval,
            stats: AggregateStats::default(),
        }
    }

    pub fn from_config(root: &Path, config: &ExtractConfig) -> Self {
        let store = CheckpointStore::new(config.checkpoint_dir(root), EXTRACTOR_CHECKPOINT_PREFIX);
        Self::new(store, config.checkpoint_interval(), config.transform().cloned())
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Seed the results from existing checkpoints, then delete them.
    ///
    /// When checkpointing is enabled the loaded units are saved again as one
    /// fresh snapshot before the old files go, so an interruption right after
    /// resuming loses nothing. Returns how many units were loaded.
    pub fn resume(&mut self) -> Result<usize, CheckpointError> {
        let files = self.store.list()?;
        if files.is_empty() {
            return Ok(0);
        }

        let loaded = self.store.load_files(&files)?;
        let count = loaded.len();
        for function in loaded {
            self.results.insert(function);
        }
        if count > 0 && self.checkpoint_interval > 0 {
            self.save_checkpoint()?;
        }
        self.store.remove_files(&files)?;

        self.stats.resumed = count;
        if count > 0 {
            tracing::info!("Loaded {} checkpoint results", count);
        }
        Ok(count)
    }

    fn save_checkpoint(&mut self) -> Result<(), CheckpointError> {
        self.store.save(self.results.as_slice())?;
        self.stats.checkpoints_saved += 1;
        tracing::info!("Extraction checkpoint saved ({} functions)", self.results.len());
        Ok(())
    }

    fn apply_transform(&self, function: SourceFunction) -> Result<SourceFunction, TransformError> {
        let Some(transform) = &self.transform else {
            return Ok(function);
        };
        let uid = function.uid.clone();
        match catch_unwind(AssertUnwindSafe(|| transform(function))) {
            Ok(Ok(transformed)) => Ok(transformed),
            Ok(Err(e)) => Err(TransformError {
                uid,
                message: format!("{:#}", e),
            }),
            Err(_) => Err(TransformError {
                uid,
                message: "transform panicked".to_string(),
            }),
        }
    }

    /// Add one unit. Returns whether it was kept.
    pub fn ingest_one(&mut self, function: SourceFunction) -> Result<bool, CheckpointError> {
        if self.results.contains(&function.uid) {
            tracing::warn!("Function \"{}\" was already extracted. Ignoring duplicate entry", function.uid);
            self.stats.duplicates += 1;
            return Ok(false);
        }

        let function = match self.apply_transform(function) {
            Ok(function) => function,
            Err(e) => {
                tracing::warn!("Error occurred during transformation: {}", e);
                self.stats.transform_failures += 1;
                return Ok(false);
            }
        };

        if !self.results.insert(function) {
            tracing::warn!("Transformed function collides with an extracted one. Ignoring duplicate entry");
            self.stats.duplicates += 1;
            return Ok(false);
        }
        self.stats.inserted += 1;

        if self.checkpoint_interval > 0 && self.results.len() % self.checkpoint_interval == 0 {
            self.save_checkpoint()?;
        }
        Ok(true)
    }

    /// Add every unit produced by one work item.
    pub fn ingest(&mut self, batch: Vec<SourceFunction>) -> Result<usize, CheckpointError> {
        let mut kept = 0;
        for function in batch {
            if self.ingest_one(function)? {
                kept += 1;
            }
        }
        Ok(kept)
    }

    pub fn results(&self) -> &FunctionCollection {
        &self.results
    }

    pub fn stats(&self) -> AggregateStats {
        self.stats
    }

    /// Final results in first-insertion order.
    pub fn finish(self) -> FunctionCollection {
        self.results
    }
}
