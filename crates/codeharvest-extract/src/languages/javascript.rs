//! JavaScript language extractor using tree-sitter
//!
//! Matches function declarations, variables bound to function or arrow
//! expressions, and methods of class declarations and class expressions.

use crate::extractor::{Extractor, glob_extensions, node_text, parse_source};
use codeharvest_core::{ExtractError, SourceFunction};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tree_sitter::Node;

pub struct JavaScriptExtractor;

impl JavaScriptExtractor {
    pub const NAME: &'static str = "JavaScript";
    pub const EXTENSIONS: &'static [&'static str] = &["js", "cjs", "mjs"];

    pub fn new() -> Self {
        JavaScriptExtractor
    }

    /// The `name` child of `node` when it has the expected kind.
    fn named<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
        node.child_by_field_name("name").filter(|n| n.kind() == kind)
    }

    fn function(
        node: Node,
        name_node: Node,
        source: &[u8],
        path: &Path,
        class_name: Option<&str>,
        repo_root: Option<&Path>,
    ) -> Result<SourceFunction, ExtractError> {
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

    /// Methods declared directly in the body of a class node.
    fn class_methods(
        class: Node,
        class_name: &str,
        source: &[u8],
        path: &Path,
        repo_root: Option<&Path>,
        functions: &mut Vec<SourceFunction>,
    ) -> Result<(), ExtractError> {
        let Some(body) = class.child_by_field_name("body") else {
            return Ok(());
        };
        let mut cursor = body.walk();
        for member in body.children(&mut cursor) {
            if member.kind() != "method_definition" {
                continue;
            }
            if let Some(name_node) = Self::named(member, "property_identifier") {
                functions.push(Self::function(member, name_node, source, path, Some(class_name), repo_root)?);
            }
        }
        Ok(())
    }

    fn visit_node(
        node: Node,
        source: &[u8],
        path: &Path,
        repo_root: Option<&Path>,
        functions: &mut Vec<SourceFunction>,
    ) -> Result<(), ExtractError> {
        match node.kind() {
            "function_declaration" => {
                if let Some(name_node) = Self::named(node, "identifier") {
                    functions.push(Self::function(node, name_node, source, path, None, repo_root)?);
                }
            }
            "variable_declarator" => {
                if let (Some(name_node), Some(value)) =
                    (Self::named(node, "identifier"), node.child_by_field_name("value"))
                {
                    match value.kind() {
                        "function_expression" | "arrow_function" => {
                            functions.push(Self::function(node, name_node, source, path, None, repo_root)?);
                        }
                        "class" => {
                            let class_name = node_text(name_node, source, path, "class name")?;
                            Self::class_methods(value, class_name, source, path, repo_root, functions)?;
                        }
                        _ => {}
                    }
                }
            }
            "class_declaration" => {
                if let Some(name_node) = Self::named(node, "identifier") {
                    let class_name = node_text(name_node, source, path, "class name")?;
                    Self::class_methods(node, class_name, source, path, repo_root, functions)?;
                }
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

impl Default for JavaScriptExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for JavaScriptExtractor {
    fn language(&self) -> &str {
        Self::NAME
    }

    fn extract(&self, file: &Path, repo_root: Option<&Path>) -> Result<Vec<SourceFunction>, ExtractError> {
        let source = std::fs::read(file).map_err(|e| ExtractError::io(file, e))?;
        let tree = parse_source(&tree_sitter_javascript::LANGUAGE.into(), file, &source)?;

        let mut functions = Vec::new();
        Self::visit_node(tree.root_node(), &source, file, repo_root, &mut functions)?;
        Ok(functions)
    }

    fn extractable_files(&self, path: &Path) -> BTreeSet<PathBuf> {
        glob_extensions(path, Self::EXTENSIONS)
    }
}
