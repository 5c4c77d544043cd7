//! Extraction configuration

use crate::extractor::ExtractorArgs;
use crate::registry::ExtractorRegistry;
use codeharvest_core::{ConfigError, SourceFunction};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// User transform applied to each newly seen unit. An error discards the unit.
pub type Transform = Arc<dyn Fn(SourceFunction) -> anyhow::Result<SourceFunction> + Send + Sync>;

pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 10;

/// Number of parallel workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Workers {
    /// One per available CPU.
    #[default]
    Auto,
    Fixed(usize),
}

impl Workers {
    pub fn count(&self) -> usize {
        match self {
            Workers::Auto => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2),
            Workers::Fixed(n) => *n,
        }
    }
}

/// Immutable extraction settings. Build with [`ExtractConfig::builder`].
#[derive(Clone)]
pub struct ExtractConfig {
    workers: Workers,
    accurate_progress: bool,
    transform: Option<Transform>,
    exclusive_subpaths: Vec<PathBuf>,
    exclude_subpaths: Vec<PathBuf>,
    checkpoint_interval: usize,
    use_checkpoint: bool,
    extract_as_repo: bool,
    extractor_args: BTreeMap<String, ExtractorArgs>,
    checkpoint_dir: Option<PathBuf>,
}

impl ExtractConfig {
    pub fn builder() -> ExtractConfigBuilder {
        ExtractConfigBuilder::default()
    }

    pub fn workers(&self) -> Workers {
        self.workers
    }

    pub fn accurate_progress(&self) -> bool {
        self.accurate_progress
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    pub fn exclusive_subpaths(&self) -> &[PathBuf] {
        &self.exclusive_subpaths
    }

    pub fn exclude_subpaths(&self) -> &[PathBuf] {
        &self.exclude_subpaths
    }

    /// Units between checkpoint saves; 0 disables checkpointing.
    pub fn checkpoint_interval(&self) -> usize {
        self.checkpoint_interval
    }

    pub fn use_checkpoint(&self) -> bool {
        self.use_checkpoint
    }

    pub fn extract_as_repo(&self) -> bool {
        self.extract_as_repo
    }

    pub fn extractor_args(&self, language: &str) -> Option<&ExtractorArgs> {
        self.extractor_args.get(language)
    }

    /// Checkpoint directory for a run over `root`.
    pub fn checkpoint_dir(&self, root: &Path) -> PathBuf {
        self.checkpoint_dir
            .clone()
            .unwrap_or_else(|| codeharvest_core::checkpoint_dir(root))
    }

    /// Checks that depend on the processed root and the registry in use.
    pub fn validate_for(&self, root: &Path, registry: &ExtractorRegistry) -> Result<(), ConfigError> {
        for subpath in self.exclusive_subpaths.iter().chain(&self.exclude_subpaths) {
            if !is_beneath(&resolve_subpath(root, subpath), root) {
                return Err(ConfigError::SubpathOutsideRoot {
                    subpath: subpath.clone(),
                    root: root.to_path_buf(),
                });
            }
        }

        // A relative and an absolute spelling of one directory only meet here.
        let overlap: Vec<PathBuf> = self
            .exclude_subpaths
            .iter()
            .filter(|p| {
                let resolved = resolve_subpath(root, p);
                self.exclusive_subpaths
                    .iter()
                    .any(|q| resolve_subpath(root, q) == resolved)
            })
            .cloned()
            .collect();
        if !overlap.is_empty() {
            return Err(ConfigError::OverlappingSubpaths(overlap));
        }

        if let Some(unknown) = self.extractor_args.keys().find(|lang| !registry.contains(lang)) {
            return Err(ConfigError::UnknownExtractor(unknown.clone()));
        }
        Ok(())
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            workers: Workers::Auto,
            accurate_progress: true,
            transform: None,
            exclusive_subpaths: Vec::new(),
            exclude_subpaths: Vec::new(),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            use_checkpoint: true,
            extract_as_repo: true,
            extractor_args: BTreeMap::new(),
            checkpoint_dir: None,
        }
    }
}

impl std::fmt::Debug for ExtractConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractConfig")
            .field("workers", &self.workers)
            .field("accurate_progress", &self.accurate_progress)
            .field("transform", &self.transform.as_ref().map(|_| "<fn>"))
            .field("exclusive_subpaths", &self.exclusive_subpaths)
            .field("exclude_subpaths", &self.exclude_subpaths)
            .field("checkpoint_interval", &self.checkpoint_interval)
            .field("use_checkpoint", &self.use_checkpoint)
            .field("extract_as_repo", &self.extract_as_repo)
            .field("extractor_args", &self.extractor_args)
            .field("checkpoint_dir", &self.checkpoint_dir)
            .finish()
    }
}

/// Builder for [`ExtractConfig`]; `build` rejects invalid combinations.
#[derive(Default)]
pub struct ExtractConfigBuilder {
    workers: Option<Workers>,
    accurate_progress: Option<bool>,
    transform: Option<Transform>,
    exclusive_subpaths: Vec<PathBuf>,
    exclude_subpaths: Vec<PathBuf>,
    checkpoint_interval: Option<i64>,
    use_checkpoint: Option<bool>,
    extract_as_repo: Option<bool>,
    extractor_args: BTreeMap<String, ExtractorArgs>,
    checkpoint_dir: Option<PathBuf>,
}

impl ExtractConfigBuilder {
    pub fn workers(mut self, workers: Workers) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn accurate_progress(mut self, accurate: bool) -> Self {
        self.accurate_progress = Some(accurate);
        self
    }

    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(SourceFunction) -> anyhow::Result<SourceFunction> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn exclusive_subpath(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclusive_subpaths.push(path.into());
        self
    }

    pub fn exclusive_subpaths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.exclusive_subpaths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn exclude_subpath(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclude_subpaths.push(path.into());
        self
    }

    pub fn exclude_subpaths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.exclude_subpaths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn checkpoint_interval(mut self, interval: i64) -> Self {
        self.checkpoint_interval = Some(interval);
        self
    }

    pub fn use_checkpoint(mut self, use_checkpoint: bool) -> Self {
        self.use_checkpoint = Some(use_checkpoint);
        self
    }

    pub fn extract_as_repo(mut self, as_repo: bool) -> Self {
        self.extract_as_repo = Some(as_repo);
        self
    }

    pub fn extractor_args(mut self, language: impl Into<String>, args: ExtractorArgs) -> Self {
        self.extractor_args.insert(language.into(), args);
        self
    }

    pub fn checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> Result<ExtractConfig, ConfigError> {
        let defaults = ExtractConfig::default();

        let workers = self.workers.unwrap_or(defaults.workers);
        if let Workers::Fixed(0) = workers {
            return Err(ConfigError::InvalidWorkers(0));
        }

        let overlap: Vec<PathBuf> = self
            .exclude_subpaths
            .iter()
            .filter(|p| self.exclusive_subpaths.iter().any(|q| same_path(p, q)))
            .cloned()
            .collect();
        if !overlap.is_empty() {
            return Err(ConfigError::OverlappingSubpaths(overlap));
        }

        let checkpoint_interval = match self.checkpoint_interval {
            Some(n) if n < 0 => return Err(ConfigError::NegativeCheckpoint(n)),
            Some(n) => n as usize,
            None => defaults.checkpoint_interval,
        };

        Ok(ExtractConfig {
            workers,
            accurate_progress: self.accurate_progress.unwrap_or(defaults.accurate_progress),
            transform: self.transform,
            exclusive_subpaths: self.exclusive_subpaths,
            exclude_subpaths: self.exclude_subpaths,
            checkpoint_interval,
            use_checkpoint: self.use_checkpoint.unwrap_or(defaults.use_checkpoint),
            extract_as_repo: self.extract_as_repo.unwrap_or(defaults.extract_as_repo),
            extractor_args: self.extractor_args,
            checkpoint_dir: self.checkpoint_dir,
        })
    }
}

/// Lexically normalize a path, dropping `.` and folding `..`.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn same_path(a: &Path, b: &Path) -> bool {
    normalize(a) == normalize(b)
}

/// Normalized absolute form of `path`, relative paths taken from the
/// current directory. Symlinks are not resolved.
pub(crate) fn absolute(path: &Path) -> PathBuf {
    match std::path::absolute(path) {
        Ok(absolute) => normalize(&absolute),
        Err(_) => normalize(path),
    }
}

/// Absolute form of a configured sub-path; relative ones resolve against `root`.
pub(crate) fn resolve_subpath(root: &Path, subpath: &Path) -> PathBuf {
    if subpath.is_absolute() {
        absolute(subpath)
    } else {
        absolute(&root.join(subpath))
    }
}

/// Whether `path` is `parent` or lies beneath it, compared by component
/// after both are made absolute.
pub(crate) fn is_beneath(path: &Path, parent: &Path) -> bool {
    absolute(path).starts_with(absolute(parent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExtractConfig::builder().build().unwrap();
        assert_eq!(config.workers(), Workers::Auto);
        assert!(config.accurate_progress());
        assert_eq!(config.checkpoint_interval(), DEFAULT_CHECKPOINT_INTERVAL);
        assert!(config.use_checkpoint());
        assert!(config.extract_as_repo());
        assert!(config.transform().is_none());
        assert_eq!(
            config.checkpoint_dir(Path::new("/repo")),
            PathBuf::from("/repo/.codeharvest/checkpoints")
        );
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = ExtractConfig::builder()
            .workers(Workers::Fixed(0))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidWorkers(0));
    }

    #[test]
    fn test_overlapping_subpaths_rejected() {
        let err = ExtractConfig::builder()
            .exclusive_subpath("src/vendor")
            .exclude_subpath("src")
            .exclude_subpath("./src/vendor/")
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::OverlappingSubpaths(vec![PathBuf::from("./src/vendor/")]));
    }

    #[test]
    fn test_negative_checkpoint_rejected() {
        let err = ExtractConfig::builder()
            .checkpoint_interval(-1)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::NegativeCheckpoint(-1));

        let config = ExtractConfig::builder().checkpoint_interval(0).build().unwrap();
        assert_eq!(config.checkpoint_interval(), 0);
    }

    #[test]
    fn test_subpath_outside_root() {
        let registry = ExtractorRegistry::with_builtins();
        let config = ExtractConfig::builder()
            .exclude_subpath("/elsewhere/src")
            .build()
            .unwrap();
        assert!(matches!(
            config.validate_for(Path::new("/repo"), &registry),
            Err(ConfigError::SubpathOutsideRoot { .. })
        ));

        let escaping = ExtractConfig::builder()
            .exclusive_subpath("../sibling")
            .build()
            .unwrap();
        assert!(escaping.validate_for(Path::new("/repo"), &registry).is_err());

        let inside = ExtractConfig::builder()
            .exclude_subpath("/repo/vendor")
            .exclusive_subpath("src")
            .exclusive_subpath("/repo")
            .build()
            .unwrap();
        assert!(inside.validate_for(Path::new("/repo"), &registry).is_ok());
    }

    #[test]
    fn test_subpath_outside_relative_root() {
        let registry = ExtractorRegistry::with_builtins();
        let cwd = std::env::current_dir().unwrap();
        let outside = cwd.parent().unwrap().join("elsewhere");

        let config = ExtractConfig::builder().exclude_subpath(outside).build().unwrap();
        assert!(matches!(
            config.validate_for(Path::new("."), &registry),
            Err(ConfigError::SubpathOutsideRoot { .. })
        ));

        let inside = ExtractConfig::builder()
            .exclude_subpath(cwd.join("src"))
            .exclusive_subpath("./tests")
            .build()
            .unwrap();
        assert!(inside.validate_for(Path::new("."), &registry).is_ok());
    }

    #[test]
    fn test_overlap_between_relative_and_absolute_spelling() {
        let registry = ExtractorRegistry::with_builtins();
        let cwd = std::env::current_dir().unwrap();
        let config = ExtractConfig::builder()
            .exclude_subpath(cwd.join("src"))
            .exclusive_subpath("src")
            .build()
            .unwrap();

        assert_eq!(
            config.validate_for(Path::new("."), &registry),
            Err(ConfigError::OverlappingSubpaths(vec![cwd.join("src")]))
        );
    }

    #[test]
    fn test_unknown_extractor_args() {
        let registry = ExtractorRegistry::with_builtins();
        let config = ExtractConfig::builder()
            .extractor_args("Fortran", ExtractorArgs::default())
            .build()
            .unwrap();
        assert_eq!(
            config.validate_for(Path::new("/repo"), &registry),
            Err(ConfigError::UnknownExtractor("Fortran".to_string()))
        );
    }

    #[test]
    fn test_is_beneath_is_component_wise() {
        assert!(is_beneath(Path::new("/repo/src/a.c"), Path::new("/repo/src")));
        assert!(is_beneath(Path::new("/repo/src"), Path::new("/repo/src")));
        assert!(!is_beneath(Path::new("/repo/srcs/a.c"), Path::new("/repo/src")));

        let cwd = std::env::current_dir().unwrap();
        assert!(is_beneath(&cwd.join("src/a.c"), Path::new("./src")));
    }
}
