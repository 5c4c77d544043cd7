//! Integration tests for codeharvest
//!
//! These tests run the extraction pipeline end to end over on-disk
//! repositories, and drive the CLI binary.

use codeharvest_core::{CheckpointStore, DecompiledFunction, FunctionCollection, STRIPPED_PREFIX, SourceFunction};
use codeharvest_extract::{ExtractConfig, ExtractionJob, ExtractorRegistry, Progress, Workers, extract_with};
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Twelve C files with two functions each.
fn create_c_repo() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for i in 0..12 {
        write(
            temp_dir.path(),
            &format!("module{}/file{}.c", i % 3, i),
            &format!(
                "static int helper{0}(int x) {{\n    return x + {0};\n}}\n\nint entry{0}(void) {{\n    return helper{0}({0});\n}}\n",
                i
            ),
        );
    }
    temp_dir
}

fn run_blocking(root: &Path, config: ExtractConfig) -> FunctionCollection {
    let registry = ExtractorRegistry::with_builtins();
    extract_with(root, config, &registry).unwrap()
}

/// Test that every function in the tree is extracted exactly once
#[tokio::test]
async fn test_pipeline_end_to_end() {
    let repo = create_c_repo();
    let root = repo.path().to_path_buf();

    let functions = tokio::task::spawn_blocking(move || {
        let config = ExtractConfig::builder()
            .workers(Workers::Fixed(4))
            .checkpoint_interval(5)
            .build()
            .unwrap();
        run_blocking(&root, config)
    })
    .await
    .unwrap();

    assert_eq!(functions.len(), 24);
    assert!(functions.contains("module1/file4.c::entry4"));

    for function in &functions {
        let source = std::fs::read_to_string(&function.path).unwrap();
        assert_eq!(&source[function.start_byte..function.end_byte], function.definition);
    }

    let rows = functions.to_rows();
    assert_eq!(rows.len(), 24);
    assert!(rows.iter().all(|row| row.len() == codeharvest_core::BASE_COLUMNS.len()));

    // Completed runs remove their checkpoints.
    assert!(CheckpointStore::for_root(repo.path()).list().unwrap().is_empty());
}

/// Test that a run interrupted after checkpointing can be resumed
#[tokio::test]
async fn test_resume_yields_superset_of_checkpoint() {
    let repo = create_c_repo();
    let store = CheckpointStore::for_root(repo.path());

    // Simulate an interrupted run: checkpoint part of the repo by hand.
    let partial = {
        let registry = ExtractorRegistry::with_builtins();
        let config = ExtractConfig::builder()
            .workers(Workers::Fixed(2))
            .exclude_subpath("module1")
            .exclude_subpath("module2")
            .checkpoint_interval(0)
            .build()
            .unwrap();
        extract_with(repo.path(), config, &registry).unwrap()
    };
    assert_eq!(partial.len(), 8);
    store.save(partial.as_slice()).unwrap();

    let root = repo.path().to_path_buf();
    let functions = tokio::task::spawn_blocking(move || {
        run_blocking(&root, ExtractConfig::builder().workers(Workers::Fixed(3)).build().unwrap())
    })
    .await
    .unwrap();

    assert_eq!(functions.len(), 24);
    for function in partial.iter() {
        assert_eq!(functions.get(&function.uid), Some(function));
    }
    // Resumed units come first.
    assert!(functions.iter().take(8).all(|f| f.path.starts_with(repo.path().join("module0"))));
}

/// Test that checkpoints round-trip every field, metadata included
#[test]
fn test_checkpoint_round_trip() {
    let repo = create_c_repo();
    let store = CheckpointStore::for_root(repo.path());

    let config = ExtractConfig::builder()
        .workers(Workers::Fixed(2))
        .checkpoint_interval(0)
        .transform(|f: SourceFunction| {
            let length = f.definition.len();
            Ok(f.with_metadata("length", length))
        })
        .build()
        .unwrap();
    let functions = run_blocking(repo.path(), config);

    store.save(functions.as_slice()).unwrap();
    let loaded = store.load(true).unwrap();

    assert_eq!(loaded.as_slice(), functions.as_slice());
    assert!(store.list().unwrap().is_empty());
}

/// Test that progress reports every processed file
#[test]
fn test_job_progress() {
    let repo = create_c_repo();
    write(repo.path(), "broken/ok.c", "int ok(void) { return 0; }\n");
    let registry = ExtractorRegistry::with_builtins();
    let job = ExtractionJob::new(repo.path(), ExtractConfig::default(), &registry).unwrap();
    assert_eq!(job.total(), Some(13));

    let progress = Progress::new("integration", None);
    let functions = job.run(&progress).unwrap();

    assert_eq!(functions.len(), 25);
    assert_eq!(progress.snapshot().completed, 13);
    assert_eq!(progress.snapshot().errors, 0);
}

/// Test that the CLI extracts a repository to a JSON file
#[test]
fn test_cli_extract() {
    let repo = create_c_repo();
    let out = repo.path().join("functions.json");

    let output = Command::new(env!("CARGO_BIN_EXE_codeharvest"))
        .args(["extract", "--workers", "2", "--out"])
        .arg(&out)
        .arg("--root")
        .arg(repo.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let functions: Vec<SourceFunction> = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(functions.len(), 24);
}

/// Test that the repository root can be given positionally
#[test]
fn test_cli_extract_positional_root() {
    let repo = create_c_repo();
    let out = repo.path().join("functions.json");

    let output = Command::new(env!("CARGO_BIN_EXE_codeharvest"))
        .arg("extract")
        .arg(repo.path())
        .args(["--exclude", "module0", "--out"])
        .arg(&out)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let functions: Vec<SourceFunction> = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(functions.len(), 16);
}

/// Test that an absolute sub-path is honored under a relative root
#[test]
fn test_cli_absolute_exclude_with_relative_root() {
    let repo = create_c_repo();
    let root = repo.path().canonicalize().unwrap();
    let out = root.join("functions.json");

    let output = Command::new(env!("CARGO_BIN_EXE_codeharvest"))
        .current_dir(&root)
        .args(["extract", ".", "--exclude"])
        .arg(root.join("module1"))
        .arg("--out")
        .arg(&out)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let functions: Vec<SourceFunction> = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(functions.len(), 16);
    assert!(functions.iter().all(|f| !f.uid.starts_with("module1/")));
}

/// Test that the CLI rejects an invalid configuration before doing any work
#[test]
fn test_cli_rejects_negative_checkpoint() {
    let repo = create_c_repo();

    let output = Command::new(env!("CARGO_BIN_EXE_codeharvest"))
        .args(["extract", "--checkpoint", "-1", "--root"])
        .arg(repo.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("checkpoint interval must be non-negative"));
}

/// Test that the CLI strips decompiled functions
#[test]
fn test_cli_strip() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("decompiled.json");
    let function = DecompiledFunction {
        uid: "0x401000".to_string(),
        path: temp_dir.path().join("a.out"),
        definition: "int addTwoNumbers(int a, int b) {\n    printf(\"%d\", a + b);\n    return a + b;\n}".to_string(),
        name: "addTwoNumbers".to_string(),
        assembly: "addTwoNumbers:\n    call printf\n    ret".to_string(),
        architecture: "x86_64".to_string(),
        address: 0x401000,
    };
    std::fs::write(&input, serde_json::to_string(&vec![function]).unwrap()).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_codeharvest"))
        .arg("strip")
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stripped: Vec<DecompiledFunction> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stripped.len(), 1);
    assert!(stripped[0].name.starts_with(STRIPPED_PREFIX));
    assert!(!stripped[0].definition.contains("printf"));
    assert!(!stripped[0].assembly.contains("addTwoNumbers"));
}

/// Test that the CLI lists the built-in languages
#[test]
fn test_cli_languages() {
    let output = Command::new(env!("CARGO_BIN_EXE_codeharvest"))
        .arg("languages")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).lines().collect::<Vec<_>>(), vec!["C", "Rust", "JavaScript"]);
}
