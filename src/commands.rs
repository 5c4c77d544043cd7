//! CLI command implementations

use crate::config::{Config, ExtractOverrides};
use anyhow::Context;
use codeharvest_core::{CheckpointStore, DecompiledFunction, FunctionCollection};
use codeharvest_extract::{ExtractionJob, Progress, ProgressObserver, ProgressSnapshot, registry};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

/// Terminal progress display: a bar when the total is known, a spinner otherwise.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new(total: Option<usize>) -> Self {
        let bar = match total {
            Some(total) => {
                let bar = ProgressBar::new(total as u64);
                if let Ok(style) = ProgressStyle::with_template(
                    "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} files {msg}",
                ) {
                    bar.set_style(style.progress_chars("##-"));
                }
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] {spinner} {pos} files {msg}") {
                    bar.set_style(style);
                }
                bar
            }
        };
        bar.set_message("Extracting functions...");
        Self { bar }
    }
}

impl ProgressObserver for TerminalProgress {
    fn on_progress(&self, _label: &str, snapshot: &ProgressSnapshot) {
        if let Some(total) = snapshot.total {
            self.bar.set_length(total as u64);
        }
        self.bar.set_position(snapshot.processed() as u64);
        if snapshot.errors > 0 {
            self.bar.set_message(format!("({} errors)", snapshot.errors));
        }
    }
}

fn write_json<T: Serialize + ?Sized>(value: &T, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            serde_json::to_writer_pretty(&mut lock, value)?;
            writeln!(lock)?;
        }
    }
    Ok(())
}

pub async fn extract(
    root: PathBuf,
    config_path: Option<PathBuf>,
    overrides: ExtractOverrides,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    tracing::info!("Extracting functions from: {}", root.display());

    let file_config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let config = file_config.extract.build(&overrides)?;

    let functions = tokio::task::spawn_blocking(move || -> anyhow::Result<FunctionCollection> {
        let registry = registry::global()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let job = ExtractionJob::new(&root, config, &registry)?;

        let progress = Progress::new("Extracting functions", job.total());
        let display = Arc::new(TerminalProgress::new(job.total()));
        progress.subscribe(display.clone());

        let result = job.run(&progress);
        display.bar.finish_and_clear();
        Ok(result?)
    })
    .await??;

    write_json(functions.as_slice(), out.as_deref())?;
    if let Some(path) = &out {
        tracing::info!("Wrote {} functions to {}", functions.len(), path.display());
    }
    Ok(())
}

pub fn list_checkpoints(root: &Path) -> anyhow::Result<()> {
    let store = CheckpointStore::for_root(root);
    let files = store.list()?;
    if files.is_empty() {
        println!("No checkpoints in {}", store.dir().display());
        return Ok(());
    }
    for file in files {
        let count = store.read(&file.path)?.len();
        println!("{}\t{} functions", file.path.display(), count);
    }
    Ok(())
}

pub fn clear_checkpoints(root: &Path) -> anyhow::Result<()> {
    tracing::info!("Clearing checkpoints for: {}", root.display());

    let removed = CheckpointStore::for_root(root).clear()?;

    tracing::info!("Removed {} checkpoints", removed);
    Ok(())
}

pub fn strip(input: &Path, out: Option<&Path>) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let functions: Vec<DecompiledFunction> =
        serde_json::from_str(&content).with_context(|| format!("Invalid decompiled functions in {}", input.display()))?;

    let mut stripped = Vec::with_capacity(functions.len());
    for function in &functions {
        match function.to_stripped() {
            Ok(f) => stripped.push(f),
            Err(e) => tracing::warn!("Skipping {}: {}", function.uid, e),
        }
    }
    tracing::info!("Stripped {} of {} functions", stripped.len(), functions.len());

    write_json(&stripped, out)
}

pub fn languages() -> anyhow::Result<()> {
    let registry = registry::global().read().unwrap_or_else(PoisonError::into_inner);
    for language in registry.languages() {
        println!("{}", language);
    }
    Ok(())
}
