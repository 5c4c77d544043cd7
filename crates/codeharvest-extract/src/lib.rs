//! Function extraction from source trees

pub mod aggregator;
pub mod config;
pub mod coordinator;
pub mod enumerator;
pub mod extractor;
pub mod languages;
pub mod pool;
pub mod progress;
pub mod registry;


#[cfg(test)]
pub mod test_utils;

pub use aggregator::{AggregateStats, ResultAggregator};
pub use config::{DEFAULT_CHECKPOINT_INTERVAL, ExtractConfig, ExtractConfigBuilder, Transform, Workers};
pub use coordinator::{ExtractionJob, extract, extract_with};
pub use enumerator::{PathFilter, WorkEnumerator, WorkItem, WorkQueue};
pub use extractor::{Extractor, ExtractorArgs, glob_extensions};
pub use languages::{CExtractor, JavaScriptExtractor, RustExtractor};
pub use pool::WorkerPool;
pub use progress::{
    Progress, ProgressGroup, ProgressObserver, ProgressSnapshot, ProgressUpdate, TracingObserver,
};
pub use registry::{ExtractorFactory, ExtractorRegistry, Position};
