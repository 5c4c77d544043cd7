//! Extractor registry mapping language names to extractor factories.

use crate::extractor::{Extractor, ExtractorArgs};
use crate::languages::{CExtractor, JavaScriptExtractor, RustExtractor};
use codeharvest_core::ExtractError;
use std::sync::{Arc, OnceLock, RwLock};

/// Builds an extractor from the per-language arguments of a configuration.
pub type ExtractorFactory =
    Arc<dyn Fn(&ExtractorArgs) -> Result<Arc<dyn Extractor>, ExtractError> + Send + Sync>;

/// Where a registered language is placed in the ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    First,
    Last,
}

/// Ordered registry of extractor factories.
///
/// Languages are enumerated in registration order, so files of earlier
/// languages are enumerated first.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    entries: Vec<(String, ExtractorFactory)>,
}

fn no_args<E, F>(language: &'static str, make: F) -> ExtractorFactory
where
    E: Extractor + 'static,
    F: Fn() -> E + Send + Sync + 'static,
{
    Arc::new(move |args: &ExtractorArgs| {
        if !args.is_empty() {
            return Err(ExtractError::InvalidArguments {
                language: language.to_string(),
                message: "extractor takes no arguments".to_string(),
            });
        }
        Ok(Arc::new(make()) as Arc<dyn Extractor>)
    })
}

impl ExtractorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in C, Rust and JavaScript extractors, in that order.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(CExtractor::NAME, no_args(CExtractor::NAME, CExtractor::new), None);
        registry.register(RustExtractor::NAME, no_args(RustExtractor::NAME, RustExtractor::new), None);
        registry.register(
            JavaScriptExtractor::NAME,
            no_args(JavaScriptExtractor::NAME, JavaScriptExtractor::new),
            None,
        );
        registry
    }

    fn position_of(&self, language: &str) -> Option<usize> {
        self.entries.iter().position(|(name, _)| name == language)
    }

    /// Register a factory for `language`.
    ///
    /// An existing entry keeps its place unless `position` is given; a new
    /// entry is appended unless `position` is `First`.
    pub fn register(&mut self, language: &str, factory: ExtractorFactory, position: Option<Position>) {
        let index = match self.position_of(language) {
            Some(index) => {
                self.entries[index].1 = factory;
                index
            }
            None => {
                self.entries.push((language.to_string(), factory));
                self.entries.len() - 1
            }
        };

        match position {
            Some(Position::First) => {
                let entry = self.entries.remove(index);
                self.entries.insert(0, entry);
                tracing::info!("Prepended {} extractor", language);
            }
            Some(Position::Last) => {
                let entry = self.entries.remove(index);
                self.entries.push(entry);
                tracing::info!("Appended {} extractor", language);
            }
            None => tracing::info!("Added {} extractor", language),
        }
    }

    /// Register a plain constructor closure that ignores extractor arguments.
    pub fn register_fn<E, F>(&mut self, language: &str, make: F, position: Option<Position>)
    where
        E: Extractor + 'static,
        F: Fn() -> E + Send + Sync + 'static,
    {
        let factory: ExtractorFactory = Arc::new(move |_: &ExtractorArgs| Ok(Arc::new(make()) as Arc<dyn Extractor>));
        self.register(language, factory, position);
    }

    /// Clear the registry and rebuild it from `entries`, keeping their order.
    pub fn replace_all<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (S, ExtractorFactory)>,
        S: Into<String>,
    {
        self.entries.clear();
        for (language, factory) in entries {
            let language = language.into();
            self.register(&language, factory, None);
        }
    }

    /// Remove `language`. Returns whether it was registered.
    pub fn unregister(&mut self, language: &str) -> bool {
        match self.position_of(language) {
            Some(index) => {
                self.entries.remove(index);
                tracing::info!("Removed {} extractor", language);
                true
            }
            None => false,
        }
    }

    pub fn unregister_all(&mut self) {
        self.entries.clear();
    }

    /// Registered language names in order.
    pub fn languages(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn contains(&self, language: &str) -> bool {
        self.position_of(language).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Instantiate the extractor registered for `language`.
    pub fn resolve(&self, language: &str, args: &ExtractorArgs) -> Result<Arc<dyn Extractor>, ExtractError> {
        let (_, factory) = self
            .entries
            .iter()
            .find(|(name, _)| name == language)
            .ok_or_else(|| ExtractError::NotFound(language.to_string()))?;
        factory(args)
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("languages", &self.languages())
            .finish()
    }
}

/// Process-wide registry, populated with the built-in extractors on first use.
pub fn global() -> &'static RwLock<ExtractorRegistry> {
    static GLOBAL: OnceLock<RwLock<ExtractorRegistry>> = OnceLock::new();
    GLOBAL.get_or_init(|| RwLock::new(ExtractorRegistry::with_builtins()))
}
