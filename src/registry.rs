//! Engine Registry and Source Binding
//!
//! An `EngineRegistry` maps engine identifiers to factories so callers
//! configure a source by name and never depend on a concrete adapter
//! type. A `SourceContext` carries the bound source explicitly; there is
//! no process-global or thread-local default.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::error::{DataError, DataResult};
use crate::source::{DataSource, MemoryEngineFactory, SourceConfig, KEY_ENGINE};

// =============================================================================
// Factory
// =============================================================================

/// Constructor of data sources for one engine.
pub trait EngineFactory: Send + Sync {
    /// Engine identifier this factory answers to.
    fn engine(&self) -> &str;

    /// Build a source from a configuration.
    fn create(&self, config: &SourceConfig) -> DataResult<Arc<dyn DataSource>>;
}

// =============================================================================
// Registry
// =============================================================================

/// Thread-safe registry of engine factories.
pub struct EngineRegistry {
    factories: RwLock<HashMap<String, Arc<dyn EngineFactory>>>,
}

impl EngineRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry with the built-in engines registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(MemoryEngineFactory));
        registry
    }

    /// Register a factory; a later registration for the same engine
    /// identifier replaces the earlier one.
    pub fn register(&self, factory: Arc<dyn EngineFactory>) {
        let engine = factory.engine().to_ascii_lowercase();
        info!(engine = %engine, "registered engine factory");
        self.factories.write().unwrap().insert(engine, factory);
    }

    /// Build a source from a configuration, dispatching on its `engine`
    /// property.
    pub fn create(&self, config: &SourceConfig) -> DataResult<Arc<dyn DataSource>> {
        let engine = config.require(KEY_ENGINE)?.to_ascii_lowercase();
        let factory = {
            let factories = self.factories.read().unwrap();
            factories.get(&engine).cloned()
        };
        let factory = factory
            .ok_or_else(|| DataError::config(format!("no factory registered for engine {engine}")))?;
        factory.create(config)
    }

    /// Registered engine identifiers, in arbitrary order.
    #[must_use]
    pub fn engines(&self) -> Vec<String> {
        self.factories.read().unwrap().keys().cloned().collect()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// =============================================================================
// Source Context
// =============================================================================

/// Explicit carrier of the currently bound data source.
///
/// Passed to whatever needs a default source instead of consulting
/// ambient state; a context with nothing bound refuses to hand out a
/// source.
#[derive(Clone, Default)]
pub struct SourceContext {
    current: Option<Arc<dyn DataSource>>,
}

impl SourceContext {
    /// Create an unbound context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a source, replacing any previous binding.
    pub fn bind(&mut self, source: Arc<dyn DataSource>) {
        self.current = Some(source);
    }

    /// Remove the binding.
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Whether a source is bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.current.is_some()
    }

    /// The bound source, or a configuration error when none is bound.
    pub fn current(&self) -> DataResult<Arc<dyn DataSource>> {
        self.current
            .clone()
            .ok_or_else(|| DataError::config("no data source bound to this context"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MEMORY_ENGINE;

    #[test]
    fn test_create_by_engine_name() {
        let registry = EngineRegistry::with_defaults();
        let config = SourceConfig::new().with(KEY_ENGINE, MEMORY_ENGINE);
        let source = registry.create(&config).unwrap();
        assert_eq!(source.engine(), MEMORY_ENGINE);
    }

    #[test]
    fn test_engine_lookup_is_case_insensitive() {
        let registry = EngineRegistry::with_defaults();
        let config = SourceConfig::new().with(KEY_ENGINE, "Memory");
        assert!(registry.create(&config).is_ok());
    }

    #[test]
    fn test_unknown_engine_is_config_error() {
        let registry = EngineRegistry::with_defaults();
        let config = SourceConfig::new().with(KEY_ENGINE, "warp-drive");
        assert!(matches!(
            registry.create(&config),
            Err(DataError::Config { .. })
        ));
    }

    #[test]
    fn test_missing_engine_property_is_config_error() {
        let registry = EngineRegistry::with_defaults();
        assert!(matches!(
            registry.create(&SourceConfig::new()),
            Err(DataError::Config { .. })
        ));
    }

    #[test]
    fn test_context_bind_and_clear() {
        let registry = EngineRegistry::with_defaults();
        let config = SourceConfig::new().with(KEY_ENGINE, MEMORY_ENGINE);
        let source = registry.create(&config).unwrap();

        let mut context = SourceContext::new();
        assert!(!context.is_bound());
        assert!(context.current().is_err());

        context.bind(source);
        assert!(context.is_bound());
        assert_eq!(context.current().unwrap().engine(), MEMORY_ENGINE);

        context.clear();
        assert!(context.current().is_err());
    }
}
