//! C language extractor using tree-sitter

use crate::extractor::{Extractor, glob_extensions, node_text, parse_source};
use codeharvest_core::{ExtractError, SourceFunction};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tree_sitter::Node;

pub struct CExtractor;

impl CExtractor {
    pub const NAME: &'static str = "C";
    pub const EXTENSIONS: &'static [&'static str] = &["c", "h"];

    pub fn new() -> Self {
        CExtractor
    }

    /// `function_definition` whose declarator is a `function_declarator`
    /// naming a plain identifier.
    fn extract_function(
        &self,
        node: Node,
        source: &[u8],
        path: &Path,
        repo_root: Option<&Path>,
    ) -> Result<Option<SourceFunction>, ExtractError> {
        if node.kind() != "function_definition" {
            return Ok(None);
        }
        let Some(name_node) = node
            .child_by_field_name("declarator")
            .filter(|d| d.kind() == "function_declarator")
            .and_then(|d| d.child_by_field_name("declarator"))
            .filter(|n| n.kind() == "identifier")
        else {
            return Ok(None);
        };

        let name = node_text(name_node, source, path, "function name")?;
        let definition = node_text(node, source, path, "function definition")?;

        SourceFunction::from_source(
            path,
            Self::NAME,
            definition,
            name,
            node.start_byte(),
            node.end_byte(),
            None,
            repo_root,
        )
        .map(Some)
    }

    fn visit_node(
        &self,
        node: Node,
        source: &[u8],
        path: &Path,
        repo_root: Option<&Path>,
        functions: &mut Vec<SourceFunction>,
    ) -> Result<(), ExtractError> {
        if let Some(function) = self.extract_function(node, source, path, repo_root)? {
            functions.push(function);
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit_node(child, source, path, repo_root, functions)?;
        }
        Ok(())
    }
}

impl Default for CExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for CExtractor {
    fn language(&self) -> &str {
        Self::NAME
    }

    fn extract(&self, file: &Path, repo_root: Option<&Path>) -> Result<Vec<SourceFunction>, ExtractError> {
        let source = std::fs::read(file).map_err(|e| ExtractError::io(file, e))?;
        let tree = parse_source(&tree_sitter_c::LANGUAGE.into(), file, &source)?;

        let mut functions = Vec::new();
        self.visit_node(tree.root_node(), &source, file, repo_root, &mut functions)?;
        Ok(functions)
    }

    fn extractable_files(&self, path: &Path) -> BTreeSet<PathBuf> {
        glob_extensions(path, Self::EXTENSIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_single_function_byte_range() {
        let temp_dir = TempDir::new().unwrap();
        let source = "int add(int a, int b) { return a + b; }";
        let file = write(&temp_dir, "add.c", source);

        let functions = CExtractor.extract(&file, None).unwrap();

        assert_eq!(functions.len(), 1);
        let add = &functions[0];
        assert_eq!(add.name, "add");
        assert_eq!(add.language, "C");
        assert!(!add.is_method());
        assert_eq!(add.start_byte, 0);
        assert_eq!(add.end_byte, source.len());
        assert_eq!(add.definition, source);
        assert_eq!(add.uid, "add.c::add");
    }

    #[test]
    fn test_offsets_index_into_file() {
        let temp_dir = TempDir::new().unwrap();
        let source = "#include <stdio.h>\n\nstatic int square(int x) {\n    return x * x;\n}\n\nint main(void) {\n    printf(\"%d\", square(3));\n    return 0;\n}\n";
        let file = write(&temp_dir, "main.c", source);

        let functions = CExtractor.extract(&file, None).unwrap();
        let names: Vec<_> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["square", "main"]);

        for function in &functions {
            assert_eq!(&source[function.start_byte..function.end_byte], function.definition);
        }
    }

    #[test]
    fn test_declarations_are_not_definitions() {
        let temp_dir = TempDir::new().unwrap();
        let file = write(&temp_dir, "api.h", "int add(int a, int b);\nstruct point { int x; };\n");

        assert!(CExtractor.extract(&file, None).unwrap().is_empty());
    }

    #[test]
    fn test_repo_relative_uid() {
        let temp_dir = TempDir::new().unwrap();
        let file = write(&temp_dir, "src/math/ops.c", "int neg(int x) { return -x; }");

        let functions = CExtractor.extract(&file, Some(temp_dir.path())).unwrap();
        assert_eq!(functions[0].uid, "src/math/ops.c::neg");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = CExtractor.extract(Path::new("/nonexistent/missing.c"), None);
        assert!(matches!(result, Err(ExtractError::Io { .. })));
    }

    #[test]
    fn test_extractable_files() {
        let temp_dir = TempDir::new().unwrap();
        write(&temp_dir, "a.c", "");
        write(&temp_dir, "include/a.H", "");
        write(&temp_dir, "b.cpp", "");

        let files = CExtractor.extractable_files(temp_dir.path());
        assert_eq!(files.len(), 2);
    }
}
