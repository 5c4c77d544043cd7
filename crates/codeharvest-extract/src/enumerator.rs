//! Work enumeration: fan a root path out into (extractor, file) work items.

use crate::config::{ExtractConfig, is_beneath, resolve_subpath};
use crate::extractor::{Extractor, ExtractorArgs};
use crate::registry::ExtractorRegistry;
use codeharvest_core::{ExtractError, SourceFunction};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One file to be processed by one extractor.
#[derive(Clone)]
pub struct WorkItem {
    pub extractor: Arc<dyn Extractor>,
    pub file: PathBuf,
    pub repo_root: Option<PathBuf>,
}

impl WorkItem {
    pub fn run(&self) -> Result<Vec<SourceFunction>, ExtractError> {
        tracing::debug!("Extracting {} functions from {}", self.extractor.language(), self.file.display());
        self.extractor.extract(&self.file, self.repo_root.as_deref())
    }
}

impl std::fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItem")
            .field("language", &self.extractor.language())
            .field("file", &self.file)
            .field("repo_root", &self.repo_root)
            .finish()
    }
}

/// Include/exclude filter over resolved sub-paths.
///
/// A file under an excluded sub-path is dropped unless it is also under an
/// exclusive sub-path. Files and sub-paths are compared in absolute form, so
/// a relative root matches absolute sub-paths.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    exclusive: Vec<PathBuf>,
    exclude: Vec<PathBuf>,
}

impl PathFilter {
    pub fn new(root: &Path, exclusive: &[PathBuf], exclude: &[PathBuf]) -> Self {
        Self {
            exclusive: exclusive.iter().map(|p| resolve_subpath(root, p)).collect(),
            exclude: exclude.iter().map(|p| resolve_subpath(root, p)).collect(),
        }
    }

    pub fn is_excluded(&self, file: &Path) -> bool {
        let excluded = self.exclude.iter().any(|p| is_beneath(file, p));
        excluded && !self.exclusive.iter().any(|p| is_beneath(file, p))
    }
}

/// Work items, either collected up front or produced on demand.
pub enum WorkQueue {
    Materialized(Vec<WorkItem>),
    Lazy(Box<dyn Iterator<Item = WorkItem> + Send>),
}

impl WorkQueue {
    /// Number of items when known up front.
    pub fn total(&self) -> Option<usize> {
        match self {
            WorkQueue::Materialized(items) => Some(items.len()),
            WorkQueue::Lazy(_) => None,
        }
    }
}

impl IntoIterator for WorkQueue {
    type Item = WorkItem;
    type IntoIter = Box<dyn Iterator<Item = WorkItem> + Send>;

    fn into_iter(self) -> Self::IntoIter {
        match self {
            WorkQueue::Materialized(items) => Box::new(items.into_iter()),
            WorkQueue::Lazy(iter) => iter,
        }
    }
}

/// Walks a root with every registered extractor, in registry order.
pub struct WorkEnumerator {
    root: PathBuf,
    extractors: Vec<Arc<dyn Extractor>>,
    filter: PathFilter,
    repo_root: Option<PathBuf>,
    materialize: bool,
}

impl WorkEnumerator {
    /// Validate `config` against `root` and resolve every extractor.
    pub fn new(root: &Path, config: &ExtractConfig, registry: &ExtractorRegistry) -> codeharvest_core::Result<Self> {
        config.validate_for(root, registry)?;

        let default_args = ExtractorArgs::default();
        let extractors = registry
            .languages()
            .into_iter()
            .map(|language| registry.resolve(language, config.extractor_args(language).unwrap_or(&default_args)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            root: root.to_path_buf(),
            extractors,
            filter: PathFilter::new(root, config.exclusive_subpaths(), config.exclude_subpaths()),
            repo_root: config.extract_as_repo().then(|| root.to_path_buf()),
            materialize: config.accurate_progress(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn items(self) -> impl Iterator<Item = WorkItem> + Send {
        let WorkEnumerator { root, extractors, filter, repo_root, .. } = self;
        extractors.into_iter().flat_map(move |extractor| {
            let filter = filter.clone();
            let repo_root = repo_root.clone();
            extractor
                .extractable_files(&root)
                .into_iter()
                .filter(move |file| !filter.is_excluded(file))
                .map(move |file| WorkItem {
                    extractor: extractor.clone(),
                    file,
                    repo_root: repo_root.clone(),
                })
        })
    }

    /// Produce the work items; materialized when accurate progress is wanted.
    pub fn enumerate(self) -> WorkQueue {
        if self.materialize {
            let items: Vec<WorkItem> = self.items().collect();
            tracing::info!("Located {} extractable source code files", items.len());
            WorkQueue::Materialized(items)
        } else {
            WorkQueue::Lazy(Box::new(self.items()))
        }
    }
}
