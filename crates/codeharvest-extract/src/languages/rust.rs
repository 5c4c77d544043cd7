//! Rust language extractor
//!
//! Free `fn` items are functions. An `fn` directly inside an `impl` block is
//! a method of the implemented type.

use crate::extractor::{Extractor, glob_extensions, node_text, parse_source};
use codeharvest_core::{ExtractError, SourceFunction};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tree_sitter::Node;

pub struct RustExtractor;

impl RustExtractor {
    pub const NAME: &'static str = "Rust";
    pub const EXTENSIONS: &'static [&'static str] = &["rs"];

    pub fn new() -> Self {
        RustExtractor
    }

    /// Name of the type an `impl` block implements, without generic arguments.
    fn impl_type_name<'a>(node: Node, source: &'a [u8], path: &Path) -> Result<Option<&'a str>, ExtractError> {
        let Some(mut type_node) = node.child_by_field_name("type") else {
            return Ok(None);
        };
        if type_node.kind() == "generic_type" {
            if let Some(inner) = type_node.child_by_field_name("type") {
                type_node = inner;
            }
        }
        node_text(type_node, source, path, "impl type").map(Some)
    }

    fn function_item(
        node: Node,
        source: &[u8],
        path: &Path,
        class_name: Option<&str>,
        repo_root: Option<&Path>,
    ) -> Result<SourceFunction, ExtractError> {
        let name_node = node
            .child_by_field_name("name")
            .ok_or_else(|| ExtractError::parse(path, "function item without a name"))?;
        let name = node_text(name_node, source, path, "function name")?;
        let definition = node_text(node, source, path, "function definition")?;
        SourceFunction::from_source(
            path,
            Self::NAME,
            definition,
            name,
            node.start_byte(),
            node.end_byte(),
            class_name.map(str::to_string),
            repo_root,
        )
    }

    fn visit_node(
        node: Node,
        source: &[u8],
        path: &Path,
        repo_root: Option<&Path>,
        functions: &mut Vec<SourceFunction>,
    ) -> Result<(), ExtractError> {
        match node.kind() {
            "function_item" => {
                functions.push(Self::function_item(node, source, path, None, repo_root)?);
            }
            "impl_item" => {
                let class_name = Self::impl_type_name(node, source, path)?;
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for item in body.children(&mut cursor) {
                        if item.kind() == "function_item" {
                            functions.push(Self::function_item(item, source, path, class_name, repo_root)?);
                            // Nested items inside a method body are free functions.
                            if let Some(block) = item.child_by_field_name("body") {
                                Self::visit_node(block, source, path, repo_root, functions)?;
                            }
                        } else {
                            Self::visit_node(item, source, path, repo_root, functions)?;
                        }
                    }
                }
                return Ok(());
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            Self::visit_node(child, source, path, repo_root, functions)?;
        }
        Ok(())
    }
}

impl Default for RustExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for RustExtractor {
    fn language(&self) -> &str {
        Self::NAME
    }

    fn extract(&self, file: &Path, repo_root: Option<&Path>) -> Result<Vec<SourceFunction>, ExtractError> {
        let source = std::fs::read(file).map_err(|e| ExtractError::io(file, e))?;
        let tree = parse_source(&tree_sitter_rust::LANGUAGE.into(), file, &source)?;

        let mut functions = Vec::new();
        Self::visit_node(tree.root_node(), &source, file, repo_root, &mut functions)?;
        Ok(functions)
    }

    fn extractable_files(&self, path: &Path) -> BTreeSet<PathBuf> {
        glob_extensions(path, Self::EXTENSIONS)
    }
}
