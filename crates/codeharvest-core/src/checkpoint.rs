//! Durable checkpoint snapshots of partial extraction results

use crate::collection::FunctionCollection;
use crate::error::CheckpointError;
use crate::model::SourceFunction;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Working directory kept under the processed root: .codeharvest/
pub const CACHE_DIR: &str = ".codeharvest";

/// Checkpoint subdirectory of the cache directory
pub const CHECKPOINT_DIR: &str = "checkpoints";

/// Namespace of extraction checkpoints
pub const EXTRACTOR_CHECKPOINT_PREFIX: &str = "codeharvest_extractor";

const CHECKPOINT_EXT: &str = "json";

/// Per-process save counter; orders checkpoints written within one clock tick.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Get cache directory path
pub fn cache_dir(root: &Path) -> PathBuf {
    root.join(CACHE_DIR)
}

/// Get default checkpoint directory path
pub fn checkpoint_dir(root: &Path) -> PathBuf {
    root.join(CACHE_DIR).join(CHECKPOINT_DIR)
}

/// A checkpoint file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointFile {
    pub path: PathBuf,
    pub timestamp: i64,
    pub sequence: u64,
}

/// Checkpoint files in one directory sharing one prefix.
///
/// File names are `<prefix>_<unix-nanos>_<sequence>.json`; newer files sort
/// after older ones. Every file holds a complete snapshot.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    prefix: String,
    pattern: Regex,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: &str) -> Self {
        let pattern = Regex::new(&format!(
            r"^{}_(\d+)_(\d+)\.{}$",
            regex::escape(prefix),
            CHECKPOINT_EXT
        ))
        .unwrap_or_else(|_| unreachable!("escaped prefix always forms a valid pattern"));
        Self {
            dir: dir.into(),
            prefix: prefix.to_string(),
            pattern,
        }
    }

    /// Extraction checkpoints kept in the default location under `root`.
    pub fn for_root(root: &Path) -> Self {
        Self::new(checkpoint_dir(root), EXTRACTOR_CHECKPOINT_PREFIX)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn io_err(path: &Path, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// List checkpoint files, oldest first.
    pub fn list(&self) -> Result<Vec<CheckpointFile>, CheckpointError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.dir).map_err(|e| Self::io_err(&self.dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Self::io_err(&self.dir, e))?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let Some(caps) = self.pattern.captures(&file_name) else {
                continue;
            };
            let (Ok(timestamp), Ok(sequence)) = (caps[1].parse::<i64>(), caps[2].parse::<u64>())
            else {
                continue;
            };
            files.push(CheckpointFile {
                path: entry.path(),
                timestamp,
                sequence,
            });
        }
        files.sort_by_key(|f| (f.timestamp, f.sequence));
        Ok(files)
    }

    /// Newest checkpoint file, if any.
    pub fn latest(&self) -> Result<Option<CheckpointFile>, CheckpointError> {
        Ok(self.list()?.pop())
    }

    /// Write a full snapshot to a new checkpoint file.
    ///
    /// The snapshot is written beside its final name and renamed into place,
    /// so a listed checkpoint is never half-written.
    pub fn save(&self, functions: &[SourceFunction]) -> Result<PathBuf, CheckpointError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| Self::io_err(&self.dir, e))?;

        let timestamp = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_else(|| chrono::Utc::now().timestamp_micros() * 1000);
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let file_name = format!(
            "{}_{:020}_{:06}.{}",
            self.prefix, timestamp, sequence, CHECKPOINT_EXT
        );
        let path = self.dir.join(&file_name);
        let staging = self.dir.join(format!("{}.tmp", file_name));

        let json = serde_json::to_vec(functions).map_err(|source| CheckpointError::Corrupt {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&staging, json).map_err(|e| Self::io_err(&staging, e))?;
        std::fs::rename(&staging, &path).map_err(|e| Self::io_err(&path, e))?;

        tracing::debug!("Checkpoint saved: {} ({} functions)", path.display(), functions.len());
        Ok(path)
    }

    /// Read one checkpoint file.
    pub fn read(&self, path: &Path) -> Result<Vec<SourceFunction>, CheckpointError> {
        let bytes = std::fs::read(path).map_err(|e| Self::io_err(path, e))?;
        serde_json::from_slice(&bytes).map_err(|source| CheckpointError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the given checkpoint files, newest first, keeping the first unit
    /// seen per uid.
    pub fn load_files(&self, files: &[CheckpointFile]) -> Result<FunctionCollection, CheckpointError> {
        let mut collection = FunctionCollection::new();
        let mut newest_first: Vec<&CheckpointFile> = files.iter().collect();
        newest_first.sort_by_key(|f| std::cmp::Reverse((f.timestamp, f.sequence)));
        for file in newest_first {
            let functions = self.read(&file.path)?;
            tracing::debug!(
                "Checkpoint loaded: {} ({} functions)",
                file.path.display(),
                functions.len()
            );
            for function in functions {
                collection.insert(function);
            }
        }
        Ok(collection)
    }

    /// Load every checkpoint in the store.
    ///
    /// With `delete_on_load`, the files are removed only after all of them
    /// were read successfully.
    pub fn load(&self, delete_on_load: bool) -> Result<FunctionCollection, CheckpointError> {
        let files = self.list()?;
        let collection = self.load_files(&files)?;
        if delete_on_load {
            self.remove_files(&files)?;
        }
        Ok(collection)
    }

    pub fn remove_files(&self, files: &[CheckpointFile]) -> Result<(), CheckpointError> {
        for file in files {
            std::fs::remove_file(&file.path).map_err(|e| Self::io_err(&file.path, e))?;
        }
        Ok(())
    }

    /// Remove every checkpoint file. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, CheckpointError> {
        let files = self.list()?;
        self.remove_files(&files)?;
        Ok(files.len())
    }
}
