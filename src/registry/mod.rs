pub mod capability;
pub mod module;
pub mod path;

pub use capability::Capability;
pub use module::{
    ActionModule, ConditionModule, EventModule, ModuleDefinition, ModuleExports, ModuleFactory,
    ModuleKind,
};
pub use path::resolve_relative_path;

use ahash::AHashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::domain::ExtensionConfig;
use crate::error::{catch_module_panic, ModuleResolutionError};
use crate::observability::Logger;
use crate::tokens::{TokenReplacer, Verbatim};

/// Page-level values every capability exposes.
#[derive(Clone)]
pub struct RegistryEnvironment {
    pub tokens: Arc<dyn TokenReplacer>,
    pub build_info: Value,
    pub property_settings: Value,
}

impl Default for RegistryEnvironment {
    fn default() -> Self {
        RegistryEnvironment {
            tokens: Arc::new(Verbatim),
            build_info: Value::Null,
            property_settings: Value::Null,
        }
    }
}

/// Configuration of one extension as seen by its modules.
#[derive(Debug, Clone)]
pub struct ExtensionScope {
    pub name: String,
    pub display_name: String,
    pub settings: Value,
    pub hosted_lib_files_base_url: Option<String>,
}

impl ExtensionScope {
    fn unconfigured(name: &str) -> Self {
        ExtensionScope {
            name: name.to_string(),
            display_name: name.to_string(),
            settings: Value::Null,
            hosted_lib_files_base_url: None,
        }
    }
}

enum EntryState {
    Unresolved,
    Resolving,
    Resolved(ModuleExports),
    Failed(ModuleResolutionError),
}

struct Entry {
    definition: ModuleDefinition,
    factory: ModuleFactory,
    state: EntryState,
}

#[derive(Default)]
struct Table {
    entries: AHashMap<String, Entry>,
    /// Registration order, used by `hydrate`
    order: Vec<String>,
    /// (extension, name) of shared modules to their path
    shared: AHashMap<(String, String), String>,
    extensions: AHashMap<String, Arc<ExtensionScope>>,
}

pub(crate) struct RegistryInner {
    table: Mutex<Table>,
    logger: Logger,
    pub(crate) environment: RegistryEnvironment,
}

impl RegistryInner {
    /// Resolve a path to its exports, running the factory on first use.
    ///
    /// The table lock is released while the factory runs so it can resolve
    /// other paths. Resolving a path that is already resolving fails with
    /// `Circular` without touching the pending entry.
    pub(crate) fn resolve(
        self: &Arc<Self>,
        path: &str,
    ) -> Result<ModuleExports, ModuleResolutionError> {
        let (factory, capability) = {
            let mut table = self.table.lock();
            let Table {
                entries,
                extensions,
                ..
            } = &mut *table;

            let entry = entries
                .get_mut(path)
                .ok_or_else(|| ModuleResolutionError::NotFound {
                    path: path.to_string(),
                })?;

            match &entry.state {
                EntryState::Resolved(exports) => return Ok(exports.clone()),
                EntryState::Failed(e) => return Err(e.clone()),
                EntryState::Resolving => {
                    return Err(ModuleResolutionError::Circular {
                        path: path.to_string(),
                    })
                }
                EntryState::Unresolved => {}
            }

            entry.state = EntryState::Resolving;

            let extension = extensions
                .get(&entry.definition.extension)
                .cloned()
                .unwrap_or_else(|| {
                    Arc::new(ExtensionScope::unconfigured(&entry.definition.extension))
                });
            let logger = self.logger.prefixed(&extension.display_name);
            let capability = Capability::new(path, extension, logger, Arc::downgrade(self));

            (entry.factory.clone(), capability)
        };

        debug!(path, "Resolving module");

        let result = catch_module_panic(|| factory(&capability)).map_err(|cause| {
            ModuleResolutionError::Factory {
                path: path.to_string(),
                cause: Arc::new(cause),
            }
        });

        let mut table = self.table.lock();
        if let Some(entry) = table.entries.get_mut(path) {
            entry.state = match &result {
                Ok(exports) => EntryState::Resolved(exports.clone()),
                Err(e) => EntryState::Failed(e.clone()),
            };
        }

        result
    }

    pub(crate) fn resolve_shared(
        self: &Arc<Self>,
        extension: &str,
        name: &str,
    ) -> Result<Option<ModuleExports>, ModuleResolutionError> {
        let path = self
            .table
            .lock()
            .shared
            .get(&(extension.to_string(), name.to_string()))
            .cloned();

        match path {
            Some(path) => self.resolve(&path).map(Some),
            None => Ok(None),
        }
    }
}

/// Registry of module factories keyed by path.
///
/// Cloning is cheap; clones share the same table.
#[derive(Clone)]
pub struct ModuleRegistry {
    inner: Arc<RegistryInner>,
}

impl ModuleRegistry {
    pub fn new(logger: Logger) -> Self {
        ModuleRegistry::with_environment(logger, RegistryEnvironment::default())
    }

    pub fn with_environment(logger: Logger, environment: RegistryEnvironment) -> Self {
        ModuleRegistry {
            inner: Arc::new(RegistryInner {
                table: Mutex::new(Table::default()),
                logger,
                environment,
            }),
        }
    }

    /// Record an extension's configuration. Modules of extensions never
    /// registered here get empty settings and their name as display name.
    pub fn register_extension(&self, name: &str, config: Option<&ExtensionConfig>) {
        let scope = match config {
            Some(config) => ExtensionScope {
                name: name.to_string(),
                display_name: config
                    .display_name
                    .clone()
                    .unwrap_or_else(|| name.to_string()),
                settings: config.settings.clone(),
                hosted_lib_files_base_url: config.hosted_lib_files_base_url.clone(),
            },
            None => ExtensionScope::unconfigured(name),
        };

        self.inner
            .table
            .lock()
            .extensions
            .insert(name.to_string(), Arc::new(scope));
    }

    /// Register a module factory.
    ///
    /// Returns false, leaving the first registration in place, when the path
    /// is already taken.
    pub fn register<F>(&self, definition: ModuleDefinition, factory: F) -> bool
    where
        F: Fn(&Capability) -> anyhow::Result<ModuleExports> + Send + Sync + 'static,
    {
        self.register_factory(definition, Arc::new(factory))
    }

    /// Register an already boxed factory.
    pub fn register_factory(&self, definition: ModuleDefinition, factory: ModuleFactory) -> bool {
        let mut table = self.inner.table.lock();

        if table.entries.contains_key(&definition.path) {
            drop(table);
            self.inner.logger.warn(format!(
                "Module {} is already registered. Ignoring the new registration.",
                definition.path
            ));
            return false;
        }

        let path = definition.path.clone();
        if definition.shared {
            table.shared.insert(
                (definition.extension.clone(), definition.name.clone()),
                path.clone(),
            );
        }

        table.entries.insert(
            path.clone(),
            Entry {
                definition,
                factory,
                state: EntryState::Unresolved,
            },
        );
        table.order.push(path);
        true
    }

    /// Memoized exports of the module at `path`.
    pub fn resolve(&self, path: &str) -> Result<ModuleExports, ModuleResolutionError> {
        self.inner.resolve(path)
    }

    /// Exports of a shared module, or `None` if no such module is shared.
    pub fn shared_exports(
        &self,
        extension: &str,
        name: &str,
    ) -> Result<Option<ModuleExports>, ModuleResolutionError> {
        self.inner.resolve_shared(extension, name)
    }

    /// Resolve every registered module in registration order.
    ///
    /// Failures are logged and cached, never propagated. Returns the number
    /// of modules that failed.
    pub fn hydrate(&self) -> usize {
        let paths = self.inner.table.lock().order.clone();
        let mut failures = 0;

        for path in paths {
            if let Err(e) = self.resolve(&path) {
                failures += 1;
                self.inner
                    .logger
                    .error(format!("Error initializing module {}. {}", path, e));
            }
        }

        failures
    }

    pub fn definition(&self, path: &str) -> Option<ModuleDefinition> {
        self.inner
            .table
            .lock()
            .entries
            .get(path)
            .map(|entry| entry.definition.clone())
    }

    /// Display name of the module at `path`, falling back to the path.
    pub fn display_name(&self, path: &str) -> String {
        self.definition(path)
            .map(|definition| definition.display_name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| path.to_string())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.inner.table.lock().entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.inner.table.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn logger(&self) -> &Logger {
        &self.inner.logger
    }

    pub fn environment(&self) -> &RegistryEnvironment {
        &self.inner.environment
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::{LogLevel, MemorySink};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> (ModuleRegistry, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (ModuleRegistry::new(Logger::new(sink.clone())), sink)
    }

    fn def(path: &str) -> ModuleDefinition {
        let name = path.rsplit('/').next().unwrap_or(path);
        ModuleDefinition::new(path, "ext", name)
    }

    #[test]
    fn test_resolve_is_memoized() {
        let (registry, _) = registry();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        registry.register(def("ext/conditions/always"), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ModuleExports::condition(|_, _, _| Ok(true)))
        });

        let first = registry.resolve("ext/conditions/always").unwrap();
        let second = registry.resolve("ext/conditions/always").unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_path_not_found() {
        let (registry, _) = registry();

        for _ in 0..2 {
            let err = registry.resolve("ext/missing").unwrap_err();
            assert!(matches!(err, ModuleResolutionError::NotFound { .. }));
        }
    }

    #[test]
    fn test_first_registration_wins() {
        let (registry, sink) = registry();

        assert!(registry.register(def("ext/a"), |_| Ok(ModuleExports::value(json!(1)))));
        assert!(!registry.register(def("ext/a"), |_| Ok(ModuleExports::value(json!(2)))));

        let exports = registry.resolve("ext/a").unwrap();
        assert_eq!(exports.as_value(), Some(&json!(1)));
        assert_eq!(sink.at(LogLevel::Warn).len(), 1);
    }

    #[test]
    fn test_failure_is_cached() {
        let (registry, _) = registry();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        registry.register(def("ext/broken"), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("no network")
        });

        let first = registry.resolve("ext/broken").unwrap_err();
        let second = registry.resolve("ext/broken").unwrap_err();

        assert!(first.to_string().contains("no network"));
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_factory_panic_is_caught() {
        let (registry, _) = registry();
        registry.register(def("ext/panics"), |_| panic!("factory exploded"));

        let err = registry.resolve("ext/panics").unwrap_err();
        assert!(matches!(err, ModuleResolutionError::Factory { .. }));
        assert!(err.to_string().contains("factory exploded"));
    }

    #[test]
    fn test_eager_circular_reference_fails() {
        let (registry, _) = registry();

        registry.register(def("ext/a"), |cap| {
            cap.get_module_exports_by_relative_path("./b")?;
            Ok(ModuleExports::value(json!("a")))
        });
        registry.register(def("ext/b"), |cap| {
            cap.get_module_exports_by_relative_path("./a")?;
            Ok(ModuleExports::value(json!("b")))
        });

        let err = registry.resolve("ext/a").unwrap_err();
        assert!(err.to_string().contains("Circular"));
        // b saw the cycle and failed; a failed because b did.
        assert!(registry.resolve("ext/b").is_err());
    }

    #[test]
    fn test_lazy_circular_reference_resolves() {
        let (registry, _) = registry();

        registry.register(def("ext/a"), |cap| {
            let cap = cap.clone();
            Ok(ModuleExports::condition(move |_, _, _| {
                let b = cap.get_module_exports_by_relative_path("./b")?;
                Ok(b.as_value() == Some(&json!("b")))
            }))
        });
        registry.register(def("ext/b"), |cap| {
            // a is registered regardless of order and resolves fine here
            cap.get_module_exports_by_relative_path("./a")?;
            Ok(ModuleExports::value(json!("b")))
        });

        let a = registry.resolve("ext/a").unwrap().as_condition().unwrap();
        let event = crate::domain::SyntheticEvent::plain().into_shared();
        assert!(a.check(&json!({}), None, &event).unwrap());
    }

    #[test]
    fn test_hydrate_logs_failures() {
        let (registry, sink) = registry();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        registry.register(def("ext/ok"), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ModuleExports::value(json!(true)))
        });
        registry.register(def("ext/bad"), |_| anyhow::bail!("bad init"));

        assert_eq!(registry.hydrate(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let errors = sink.at(LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Error initializing module ext/bad."));

        registry.resolve("ext/ok").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shared_module_lookup() {
        let (registry, _) = registry();

        registry.register(
            ModuleDefinition::new("visitor/shared/id-service", "visitor", "id-service").shared(),
            |_| Ok(ModuleExports::value(json!({"mid": "123"}))),
        );
        registry.register(def("ext/actions/send"), |cap| {
            let service = cap
                .get_shared_module_exports("visitor", "id-service")?
                .ok_or_else(|| anyhow::anyhow!("id service missing"))?;
            Ok(ModuleExports::Value(Arc::new(
                service.as_value().cloned().unwrap_or_default(),
            )))
        });

        let exports = registry.resolve("ext/actions/send").unwrap();
        assert_eq!(exports.as_value(), Some(&json!({"mid": "123"})));
        assert!(registry.shared_exports("visitor", "other").unwrap().is_none());
    }

    #[test]
    fn test_capability_extension_scope() {
        let sink = Arc::new(MemorySink::new());
        let mut data = std::collections::HashMap::new();
        data.insert("account".to_string(), json!("acme-prod"));
        let environment = RegistryEnvironment {
            tokens: Arc::new(crate::tokens::DataElementTokens::new(data)),
            build_info: json!({"environment": "staging"}),
            property_settings: json!({"domains": ["example.com"]}),
        };
        let registry = ModuleRegistry::with_environment(Logger::new(sink.clone()), environment);

        registry.register_extension(
            "ext",
            Some(&ExtensionConfig {
                display_name: Some("Example Extension".to_string()),
                settings: json!({"account": "%account%"}),
                hosted_lib_files_base_url: Some("https://assets.example.com/ext/".to_string()),
            }),
        );
        registry.register(def("ext/shared/info"), |cap| {
            cap.logger().info("initialized");
            Ok(ModuleExports::value(json!({
                "settings": cap.extension_settings(),
                "url": cap.get_hosted_lib_file_url("lib.js"),
                "build": cap.build_info(),
                "property": cap.property_settings(),
            })))
        });

        let exports = registry.resolve("ext/shared/info").unwrap();
        assert_eq!(
            exports.as_value(),
            Some(&json!({
                "settings": {"account": "acme-prod"},
                "url": "https://assets.example.com/ext/lib.js",
                "build": {"environment": "staging"},
                "property": {"domains": ["example.com"]},
            }))
        );
        assert_eq!(
            sink.at(LogLevel::Info),
            vec!["[Example Extension] initialized".to_string()]
        );
    }

    #[test]
    fn test_display_name_falls_back_to_path() {
        let (registry, _) = registry();
        registry.register(
            def("ext/actions/send").with_display_name("Send Beacon"),
            |_| Ok(ModuleExports::action(|_, _, _| Ok(()))),
        );

        assert_eq!(registry.display_name("ext/actions/send"), "Send Beacon");
        assert_eq!(registry.display_name("ext/unknown"), "ext/unknown");
    }
}
