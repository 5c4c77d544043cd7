//! Built-in language extractors

pub mod c;
pub mod javascript;
pub mod rust;

pub use c::CExtractor;
pub use javascript::JavaScriptExtractor;
pub use rust::RustExtractor;
