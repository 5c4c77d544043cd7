//! Language extractor trait definition

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use codeharvest_core::{ExtractError, SourceFunction};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tree_sitter::{Language, Parser, Tree};

/// Pluggable per-language extraction capability.
pub trait Extractor: Send + Sync {
    /// Language tag stamped on every extracted unit.
    fn language(&self) -> &str;

    /// Extract every function defined in `file`.
    ///
    /// With a `repo_root`, identifiers are keyed by the path relative to it.
    fn extract(&self, file: &Path, repo_root: Option<&Path>) -> Result<Vec<SourceFunction>, ExtractError>;

    /// Files under `path` this extractor can process. A matching file yields
    /// itself; a directory is searched recursively.
    fn extractable_files(&self, path: &Path) -> BTreeSet<PathBuf>;
}

/// Extra constructor arguments forwarded to one language's extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractorArgs {
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(default)]
    pub kwargs: BTreeMap<String, serde_json::Value>,
}

impl ExtractorArgs {
    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }
}

fn extension_matches(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}

fn extension_globs(extensions: &[&str]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for ext in extensions {
        builder.add(
            GlobBuilder::new(&format!("*.{}", ext))
                .case_insensitive(true)
                .build()?,
        );
    }
    builder.build()
}

/// Every file under `path` whose extension is one of `extensions`, compared
/// case-insensitively. Hidden and ignored files are included, as are
/// symlinks to files.
pub fn glob_extensions(path: &Path, extensions: &[&str]) -> BTreeSet<PathBuf> {
    let mut files = BTreeSet::new();
    if path.is_file() {
        if extension_matches(path, extensions) {
            files.insert(path.to_path_buf());
        }
        return files;
    }

    let globs = match extension_globs(extensions) {
        Ok(globs) => globs,
        Err(e) => {
            tracing::warn!("Invalid extension pattern {:?}: {}", extensions, e);
            return files;
        }
    };

    let walker = ignore::WalkBuilder::new(path)
        .standard_filters(false)
        .follow_links(false)
        .build();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Cannot read entry under {}: {}", path.display(), e);
                continue;
            }
        };
        // Symlinked directories are not descended into, symlinked files are kept.
        let is_file = match entry.file_type() {
            Some(t) if t.is_symlink() => entry.path().is_file(),
            Some(t) => t.is_file(),
            None => false,
        };
        if !is_file {
            continue;
        }
        if entry.file_name().to_str().is_some_and(|name| globs.is_match(name)) {
            files.insert(entry.into_path());
        }
    }
    files
}

/// Parse `source` with a fresh parser for `language`.
pub fn parse_source(language: &Language, path: &Path, source: &[u8]) -> Result<Tree, ExtractError> {
    let mut parser = Parser::new();
    parser
        .set_language(language)
        .map_err(|e| ExtractError::Grammar(e.to_string()))?;
    parser
        .parse(source, None)
        .ok_or_else(|| ExtractError::parse(path, "parser returned no tree"))
}

/// Text of a matched node, failing when it is missing or empty.
pub fn node_text<'a>(
    node: tree_sitter::Node,
    source: &'a [u8],
    path: &Path,
    what: &str,
) -> Result<&'a str, ExtractError> {
    match node.utf8_text(source) {
        Ok(text) if !text.is_empty() => Ok(text),
        Ok(_) => Err(ExtractError::parse(
            path,
            format!("expected {} at byte {} to have text", what, node.start_byte()),
        )),
        Err(e) => Err(ExtractError::parse(
            path,
            format!("{} at byte {} is not valid UTF-8: {}", what, node.start_byte(), e),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_glob_extensions_case_insensitive() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("src/nested")).unwrap();
        std::fs::write(root.join("src/main.c"), "").unwrap();
        std::fs::write(root.join("src/nested/UTIL.H"), "").unwrap();
        std::fs::write(root.join("src/notes.txt"), "").unwrap();

        let files = glob_extensions(root, &["c", "h"]);

        assert_eq!(files.len(), 2);
        assert!(files.contains(&root.join("src/main.c")));
        assert!(files.contains(&root.join("src/nested/UTIL.H")));
    }

    #[test]
    fn test_glob_extensions_single_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("main.c");
        std::fs::write(&file, "").unwrap();
        let other = temp_dir.path().join("main.py");
        std::fs::write(&other, "").unwrap();

        assert_eq!(glob_extensions(&file, &["c"]).into_iter().collect::<Vec<_>>(), vec![file]);
        assert!(glob_extensions(&other, &["c"]).is_empty());
    }

    #[test]
    fn test_glob_extensions_includes_hidden_dirs() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join(".vendor")).unwrap();
        std::fs::write(temp_dir.path().join(".vendor/lib.c"), "").unwrap();

        assert_eq!(glob_extensions(temp_dir.path(), &["c"]).len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_glob_extensions_keeps_symlinked_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("real")).unwrap();
        std::fs::write(root.join("real/impl.c"), "").unwrap();
        std::os::unix::fs::symlink(root.join("real/impl.c"), root.join("alias.c")).unwrap();
        std::os::unix::fs::symlink(root.join("missing.c"), root.join("dangling.c")).unwrap();

        let files = glob_extensions(root, &["c"]);

        assert_eq!(files.len(), 2);
        assert!(files.contains(&root.join("alias.c")));
        assert!(!files.contains(&root.join("dangling.c")));
    }

    #[test]
    fn test_extractor_args_is_empty() {
        assert!(ExtractorArgs::default().is_empty());
        let args = ExtractorArgs {
            args: vec![serde_json::json!(1)],
            ..Default::default()
        };
        assert!(!args.is_empty());
    }
}
