//! Configuration file handling for the CLI.
//!
//! An optional TOML file with an `[extract]` table; command-line flags take
//! precedence over values read from it.

use anyhow::Context;
use codeharvest_extract::{ExtractConfig, ExtractorArgs, Workers};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Extraction settings
    #[serde(default)]
    pub extract: ExtractSection,
}

/// `[extract]` table. Unset fields fall back to the library defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExtractSection {
    /// Worker threads; 0 or absent means one per CPU
    #[serde(default)]
    pub workers: Option<usize>,

    /// Walk the tree up front to report a progress total
    #[serde(default)]
    pub accurate_progress: Option<bool>,

    /// Units between checkpoint saves; 0 disables checkpointing
    #[serde(default)]
    pub checkpoint: Option<i64>,

    /// Resume from checkpoints left by an interrupted run
    #[serde(default)]
    pub use_checkpoint: Option<bool>,

    /// Key identifiers by repository-relative paths
    #[serde(default)]
    pub extract_as_repo: Option<bool>,

    /// Sub-paths that are always extracted, even when excluded
    #[serde(default)]
    pub exclusive_subpaths: Vec<PathBuf>,

    /// Sub-paths to skip
    #[serde(default)]
    pub exclude_subpaths: Vec<PathBuf>,

    #[serde(default)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Per-language extractor arguments, keyed by language name
    #[serde(default)]
    pub extractor_args: BTreeMap<String, ExtractorArgs>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Values given on the command line for `extract`.
#[derive(Debug, Clone, Default)]
pub struct ExtractOverrides {
    pub workers: Option<usize>,
    pub checkpoint: Option<i64>,
    pub no_resume: bool,
    pub no_repo: bool,
    pub lazy: bool,
    pub only: Vec<PathBuf>,
    pub exclude: Vec<PathBuf>,
}

fn workers(n: usize) -> Workers {
    if n == 0 { Workers::Auto } else { Workers::Fixed(n) }
}

impl ExtractSection {
    /// Merge command-line overrides and build a validated configuration.
    pub fn build(self, overrides: &ExtractOverrides) -> anyhow::Result<ExtractConfig> {
        let mut builder = ExtractConfig::builder()
            .exclusive_subpaths(self.exclusive_subpaths)
            .exclusive_subpaths(overrides.only.iter().cloned())
            .exclude_subpaths(self.exclude_subpaths)
            .exclude_subpaths(overrides.exclude.iter().cloned());

        if let Some(n) = overrides.workers.or(self.workers) {
            builder = builder.workers(workers(n));
        }
        if let Some(interval) = overrides.checkpoint.or(self.checkpoint) {
            builder = builder.checkpoint_interval(interval);
        }
        if let Some(accurate) = self.accurate_progress {
            builder = builder.accurate_progress(accurate);
        }
        if overrides.lazy {
            builder = builder.accurate_progress(false);
        }
        if let Some(use_checkpoint) = self.use_checkpoint {
            builder = builder.use_checkpoint(use_checkpoint);
        }
        if overrides.no_resume {
            builder = builder.use_checkpoint(false);
        }
        if let Some(as_repo) = self.extract_as_repo {
            builder = builder.extract_as_repo(as_repo);
        }
        if overrides.no_repo {
            builder = builder.extract_as_repo(false);
        }
        if let Some(dir) = self.checkpoint_dir {
            builder = builder.checkpoint_dir(dir);
        }
        for (language, args) in self.extractor_args {
            builder = builder.extractor_args(language, args);
        }

        Ok(builder.build()?)
    }
}
