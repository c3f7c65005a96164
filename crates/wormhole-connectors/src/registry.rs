//! Module and bridge registry with factory pattern.
//!
//! A [`Registry`] is a plain value owned by the orchestrator. Adapters are
//! registered under a name with a factory that creates fresh instances;
//! the runtime looks them up by the names given on the command line.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::adapter::{DeliveryBridge, DeliveryModule, IngestBridge, IngestModule};
use crate::config::ConnectorInfo;
use crate::error::ConnectorError;

/// Factory function type creating one adapter instance.
pub type Factory<T> = Arc<dyn Fn() -> Box<T> + Send + Sync>;

type Entries<T> = RwLock<HashMap<String, (ConnectorInfo, Factory<T>)>>;

/// Registry of the modules and bridges available to one role.
///
/// # Example
///
/// ```rust,ignore
/// let registry = StargateRegistry::new();
/// registry.register_module("http", info, Arc::new(|| Box::new(HttpIngest::new()) as _));
///
/// let module = registry.create_module("http")?;
/// ```
pub struct Registry<M: ?Sized, B: ?Sized> {
    modules: Entries<M>,
    bridges: Entries<B>,
}

/// Registry of the ingest role.
pub type StargateRegistry = Registry<dyn IngestModule, dyn IngestBridge>;

/// Registry of the delivery role.
pub type DimensionRegistry = Registry<dyn DeliveryModule, dyn DeliveryBridge>;

impl<M: ?Sized, B: ?Sized> Registry<M, B> {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            modules: RwLock::new(HashMap::new()),
            bridges: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a module factory, replacing any previous one of that name.
    pub fn register_module(&self, name: impl Into<String>, info: ConnectorInfo, factory: Factory<M>) {
        self.modules.write().insert(name.into(), (info, factory));
    }

    /// Registers a bridge factory, replacing any previous one of that name.
    pub fn register_bridge(&self, name: impl Into<String>, info: ConnectorInfo, factory: Factory<B>) {
        self.bridges.write().insert(name.into(), (info, factory));
    }

    /// Creates a new module instance.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` naming the registered
    /// modules if `name` is unknown.
    pub fn create_module(&self, name: &str) -> Result<Box<M>, ConnectorError> {
        create(&self.modules, "module", name)
    }

    /// Creates a new bridge instance.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` naming the registered
    /// bridges if `name` is unknown.
    pub fn create_bridge(&self, name: &str) -> Result<Box<B>, ConnectorError> {
        create(&self.bridges, "bridge", name)
    }

    /// Returns information about a registered module.
    #[must_use]
    pub fn module_info(&self, name: &str) -> Option<ConnectorInfo> {
        self.modules.read().get(name).map(|(info, _)| info.clone())
    }

    /// Returns information about a registered bridge.
    #[must_use]
    pub fn bridge_info(&self, name: &str) -> Option<ConnectorInfo> {
        self.bridges.read().get(name).map(|(info, _)| info.clone())
    }

    /// Lists registered module names, sorted.
    #[must_use]
    pub fn list_modules(&self) -> Vec<String> {
        names(&self.modules)
    }

    /// Lists registered bridge names, sorted.
    #[must_use]
    pub fn list_bridges(&self) -> Vec<String> {
        names(&self.bridges)
    }

    /// Renders the help text of every module and bridge.
    #[must_use]
    pub fn help(&self) -> String {
        let mut out = String::from("modules:\n");
        for (info, _) in sorted(&self.modules) {
            out.push_str(&info.help());
        }
        out.push_str("bridges:\n");
        for (info, _) in sorted(&self.bridges) {
            out.push_str(&info.help());
        }
        out
    }
}

fn names<T: ?Sized>(entries: &Entries<T>) -> Vec<String> {
    let mut names: Vec<String> = entries.read().keys().cloned().collect();
    names.sort();
    names
}

fn sorted<T: ?Sized>(entries: &Entries<T>) -> Vec<(ConnectorInfo, Factory<T>)> {
    let mut all: Vec<_> = entries.read().values().cloned().collect();
    all.sort_by(|a, b| a.0.name.cmp(&b.0.name));
    all
}

fn create<T: ?Sized>(entries: &Entries<T>, kind: &str, name: &str) -> Result<Box<T>, ConnectorError> {
    let factory = entries
        .read()
        .get(name)
        .map(|(_, factory)| Arc::clone(factory));
    match factory {
        Some(factory) => Ok(factory()),
        None => Err(ConnectorError::ConfigurationError(format!(
            "unknown {kind} '{name}' (registered: {})",
            names(entries).join(", ")
        ))),
    }
}

impl<M: ?Sized, B: ?Sized> Default for Registry<M, B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ?Sized, B: ?Sized> std::fmt::Debug for Registry<M, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("modules", &self.list_modules())
            .field("bridges", &self.list_bridges())
            .finish()
    }
}

/// Builds the ingest registry with every built-in module and bridge.
#[must_use]
pub fn default_stargate_registry() -> StargateRegistry {
    let registry = StargateRegistry::new();
    crate::http::register_http_ingest(&registry);
    #[cfg(feature = "kafka")]
    crate::kafka::register_kafka_ingest(&registry);
    crate::bridge::register_ingest_bridges(&registry);
    registry
}

/// Builds the delivery registry with every built-in module and bridge.
#[must_use]
pub fn default_dimension_registry() -> DimensionRegistry {
    let registry = DimensionRegistry::new();
    crate::http::register_http_delivery(&registry);
    #[cfg(feature = "kafka")]
    crate::kafka::register_kafka_delivery(&registry);
    crate::bridge::register_delivery_bridges(&registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockIngestModule;

    fn mock_info(name: &str) -> ConnectorInfo {
        ConnectorInfo::new(name, "test module", Vec::new())
    }

    #[test]
    fn test_register_and_create() {
        let registry = StargateRegistry::new();
        registry.register_module(
            "mock",
            mock_info("mock"),
            Arc::new(|| Box::new(MockIngestModule::new(3)) as Box<dyn IngestModule>),
        );

        assert_eq!(registry.list_modules(), vec!["mock".to_string()]);
        assert!(registry.list_bridges().is_empty());
        assert_eq!(registry.module_info("mock").unwrap().name, "mock");
        assert_eq!(registry.create_module("mock").unwrap().name(), "mock");
    }

    #[test]
    fn test_unknown_name_lists_registered() {
        let registry = default_stargate_registry();
        let err = registry.create_bridge("ftp").err().unwrap();
        let msg = err.to_string();
        assert!(msg.contains("unknown bridge 'ftp'"), "{msg}");
        assert!(msg.contains("file, skip"), "{msg}");
    }

    #[test]
    fn test_default_registries() {
        let stargate = default_stargate_registry();
        assert!(stargate.list_modules().contains(&"http".to_string()));
        assert_eq!(stargate.list_bridges(), vec!["file", "skip"]);

        let dimension = default_dimension_registry();
        assert!(dimension.list_modules().contains(&"http".to_string()));
        assert_eq!(dimension.list_bridges(), vec!["file", "skip"]);
        #[cfg(feature = "kafka")]
        assert!(dimension.list_modules().contains(&"kafka".to_string()));
    }

    #[test]
    fn test_help_lists_everything() {
        let help = default_dimension_registry().help();
        assert!(help.contains("http.bind"));
        assert!(help.contains("spool.handling.path"));
    }

    #[test]
    fn test_debug() {
        let registry = DimensionRegistry::new();
        assert_eq!(
            format!("{registry:?}"),
            "Registry { modules: [], bridges: [] }"
        );
    }
}
