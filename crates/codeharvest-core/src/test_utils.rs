//! Test utilities for codeharvest-core

use crate::model::{DecompiledFunction, SourceFunction};
use std::fs;
use std::path::Path;

/// Insert `definition` into the source file at `start_byte` (creating the
/// file if needed) and return the matching unit.
pub fn create_function(
    source_path: &Path,
    language: &str,
    definition: &str,
    name: &str,
    start_byte: usize,
    class_name: Option<&str>,
) -> SourceFunction {
    let mut source = if source_path.exists() {
        fs::read(source_path).unwrap()
    } else {
        Vec::new()
    };
    let tail = source.split_off(start_byte.min(source.len()));
    source.extend_from_slice(definition.as_bytes());
    source.extend_from_slice(&tail);
    fs::write(source_path, source).unwrap();

    SourceFunction::from_source(
        source_path,
        language,
        definition,
        name,
        start_byte,
        start_byte + definition.len(),
        class_name.map(str::to_string),
        None,
    )
    .unwrap()
}

/// A small decompiled function referencing `test_function` and `puts`.
pub fn dummy_decompiled_function(bin_path: &Path) -> DecompiledFunction {
    DecompiledFunction {
        uid: "test".to_string(),
        path: bin_path.to_path_buf(),
        name: "test_function".to_string(),
        definition: "int test_function(void) {\n    puts(\"hi\");\n    return 0;\n}".to_string(),
        assembly: "test_function:\n    call puts\n    mov eax, 0\n    ret".to_string(),
        architecture: "x86_64".to_string(),
        address: 0x400080,
    }
}
