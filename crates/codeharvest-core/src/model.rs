//! Core data structures for extracted functions

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

/// Common surface of every function unit, whether it came from source text
/// or from a decompiled binary.
pub trait FunctionUnit {
    /// Stable identifier; the deduplication key.
    fn uid(&self) -> &str;
    /// Source file, or binary for decompiled units.
    fn path(&self) -> &Path;
}

/// Key used as the file part of an identifier.
///
/// Relative to `repo_root` (always `/`-separated) when the file lives beneath
/// it, otherwise just the file name.
pub fn file_key(path: &Path, repo_root: Option<&Path>) -> String {
    if let Some(rel) = repo_root.and_then(|root| path.strip_prefix(root).ok()) {
        let parts: Vec<String> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if !parts.is_empty() {
            return parts.join("/");
        }
    }
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Derive the identifier of a source function.
///
/// `<file-key>::<name>` for free functions, `<file-key>::<Class>.<name>` for methods.
pub fn create_uid(path: &Path, name: &str, class_name: Option<&str>, repo_root: Option<&Path>) -> String {
    let key = file_key(path, repo_root);
    match class_name {
        Some(class) => format!("{}::{}.{}", key, class, name),
        None => format!("{}::{}", key, name),
    }
}

/// A function located in source code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceFunction {
    pub uid: String,
    pub path: PathBuf,
    pub language: String,
    pub definition: String,
    pub name: String,
    pub start_byte: usize,
    pub end_byte: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Extra fields injected by transforms.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl SourceFunction {
    /// Build a unit from an extracted definition, deriving its identifier.
    #[allow(clippy::too_many_arguments)]
    pub fn from_source(
        path: impl Into<PathBuf>,
        language: impl Into<String>,
        definition: impl Into<String>,
        name: impl Into<String>,
        start_byte: usize,
        end_byte: usize,
        class_name: Option<String>,
        repo_root: Option<&Path>,
    ) -> Result<Self, ExtractError> {
        if start_byte > end_byte {
            return Err(ExtractError::InvalidRange {
                start: start_byte,
                end: end_byte,
            });
        }
        let path = path.into();
        let name = name.into();
        let uid = create_uid(&path, &name, class_name.as_deref(), repo_root);
        Ok(SourceFunction {
            uid,
            path,
            language: language.into(),
            definition: definition.into(),
            name,
            start_byte,
            end_byte,
            class_name,
            metadata: BTreeMap::new(),
        })
    }

    pub fn is_method(&self) -> bool {
        self.class_name.is_some()
    }

    /// Replace the definition, keeping the start offset.
    ///
    /// The identifier keeps its file key and is re-derived from the new name.
    /// With `write_back`, the new text is spliced into the source file over
    /// the old byte range.
    pub fn with_definition(
        &self,
        definition: impl Into<String>,
        name: Option<&str>,
        write_back: bool,
    ) -> std::io::Result<SourceFunction> {
        let definition = definition.into();
        let name = name.unwrap_or(&self.name).to_string();
        let uid = match self.uid.rsplit_once("::") {
            Some((key, _)) => match &self.class_name {
                Some(class) => format!("{}::{}.{}", key, class, name),
                None => format!("{}::{}", key, name),
            },
            None => create_uid(&self.path, &name, self.class_name.as_deref(), None),
        };
        let updated = SourceFunction {
            uid,
            path: self.path.clone(),
            language: self.language.clone(),
            end_byte: self.start_byte + definition.len(),
            definition,
            name,
            start_byte: self.start_byte,
            class_name: self.class_name.clone(),
            metadata: self.metadata.clone(),
        };

        if write_back {
            let source = std::fs::read(&self.path)?;
            if self.end_byte > source.len() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!(
                        "{} is shorter than the recorded definition range",
                        self.path.display()
                    ),
                ));
            }
            let mut spliced = Vec::with_capacity(source.len() + updated.definition.len());
            spliced.extend_from_slice(&source[..self.start_byte]);
            spliced.extend_from_slice(updated.definition.as_bytes());
            spliced.extend_from_slice(&source[self.end_byte..]);
            std::fs::write(&self.path, spliced)?;
        }
        Ok(updated)
    }

    /// Attach a metadata field, replacing any previous value.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl FunctionUnit for SourceFunction {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// A function recovered from a compiled binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecompiledFunction {
    pub uid: String,
    /// Path to the binary.
    pub path: PathBuf,
    pub definition: String,
    pub name: String,
    pub assembly: String,
    pub architecture: String,
    #[serde(default)]
    pub address: u64,
}

impl DecompiledFunction {
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    pub fn from_json(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

impl FunctionUnit for DecompiledFunction {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
