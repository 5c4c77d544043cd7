//! Boundary to external decompilers

use std::path::Path;

use crate::model::DecompiledFunction;

/// A decompiler backend. Decompilation itself happens outside this crate;
/// implementations only hand back recovered functions.
pub trait Decompiler: Send + Sync {
    /// Decompile a binary and return every function recovered from it.
    fn decompile(&self, binary: &Path) -> anyhow::Result<Vec<DecompiledFunction>>;

    /// Name the backend gives a stripped function at `address`.
    fn stripped_name(&self, address: u64) -> String;
}

/// Decompile a binary and strip every recovered function.
///
/// Functions that cannot be stripped are skipped with a warning.
pub fn decompile_stripped(
    decompiler: &dyn Decompiler,
    binary: &Path,
) -> anyhow::Result<Vec<DecompiledFunction>> {
    let functions = decompiler.decompile(binary)?;
    let total = functions.len();
    let stripped: Vec<_> = functions
        .into_iter()
        .filter_map(|function| match function.to_stripped() {
            Ok(stripped) => Some(stripped),
            Err(e) => {
                tracing::warn!("Cannot strip {}: {}", function.uid, e);
                None
            }
        })
        .collect();
    tracing::info!(
        "Stripped {}/{} functions from {}",
        stripped.len(),
        total,
        binary.display()
    );
    Ok(stripped)
}
