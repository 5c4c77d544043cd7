//! codeharvest core: function data model, checkpoints and symbol stripping

pub mod checkpoint;
pub mod collection;
pub mod decompiler;
pub mod error;
pub mod model;
pub mod strip;


#[cfg(test)]
pub mod test_utils;

pub use checkpoint::{
    CACHE_DIR, CHECKPOINT_DIR, CheckpointFile, CheckpointStore, EXTRACTOR_CHECKPOINT_PREFIX,
    cache_dir, checkpoint_dir,
};
pub use collection::{BASE_COLUMNS, FunctionCollection};
pub use decompiler::{Decompiler, decompile_stripped};
pub use error::{CheckpointError, ConfigError, Error, ExtractError, PoolError, Result, TransformError};
pub use model::{DecompiledFunction, FunctionUnit, SourceFunction, create_uid, file_key};
pub use strip::{STRIPPED_PREFIX, SymbolMap};
