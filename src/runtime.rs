use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::builtins::{self, DirectCallDispatcher, CORE_EXTENSION, DIRECT_CALL_DISPATCHER};
use crate::domain::{Container, Rule};
use crate::engine::{BindReport, ExecutionContext, FiringReport, RuleEngine};
use crate::error::ModuleResolutionError;
use crate::flags::{FlagStore, FlagStoreError};
use crate::observability::{LogLevel, Logger, MetricsRegistry};
use crate::registry::{
    Capability, ModuleDefinition, ModuleExports, ModuleFactory, ModuleRegistry,
    RegistryEnvironment,
};
use crate::tokens::{DataElementTokens, TokenReplacer};

/// Builder for [`Runtime`].
pub struct RuntimeBuilder {
    container: Container,
    flags: Option<FlagStore>,
    logger: Option<Logger>,
    tokens: Option<Arc<dyn TokenReplacer>>,
    modules: Vec<(ModuleDefinition, ModuleFactory)>,
    with_core: bool,
}

impl RuntimeBuilder {
    pub fn new(container: Container) -> Self {
        RuntimeBuilder {
            container,
            flags: None,
            logger: None,
            tokens: None,
            modules: Vec::new(),
            with_core: true,
        }
    }

    /// Flag store to read the kill switch and debug flag from. Defaults to
    /// an in-memory store.
    pub fn flags(mut self, flags: FlagStore) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Token replacer for settings. Defaults to the container's data
    /// elements.
    pub fn tokens(mut self, tokens: Arc<dyn TokenReplacer>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Leave out the built-in `core` extension.
    pub fn without_core(mut self) -> Self {
        self.with_core = false;
        self
    }

    /// Add an extension module.
    pub fn module<F>(mut self, definition: ModuleDefinition, factory: F) -> Self
    where
        F: Fn(&Capability) -> anyhow::Result<ModuleExports> + Send + Sync + 'static,
    {
        self.modules.push((definition, Arc::new(factory)));
        self
    }

    /// Register every module, then resolve them all.
    pub fn build(self) -> Runtime {
        let RuntimeBuilder {
            container,
            flags,
            logger,
            tokens,
            modules,
            with_core,
        } = self;

        let logger = logger.unwrap_or_default();
        let tokens = tokens.unwrap_or_else(|| {
            Arc::new(DataElementTokens::new(container.data_elements.clone()))
        });
        let environment = RegistryEnvironment {
            tokens,
            build_info: container.build_info.clone(),
            property_settings: container.property_settings.clone(),
        };

        let registry = ModuleRegistry::with_environment(logger.clone(), environment);
        for (name, config) in &container.extensions {
            registry.register_extension(name, Some(config));
        }

        if with_core {
            if !container.extensions.contains_key(CORE_EXTENSION) {
                registry.register_extension(CORE_EXTENSION, None);
            }
            builtins::register_core(&registry);
        }

        for (definition, factory) in modules {
            registry.register_factory(definition, factory);
        }

        let failures = registry.hydrate();
        info!(
            modules = registry.len(),
            failures,
            rules = container.rules.len(),
            "Module registry hydrated"
        );

        let context = ExecutionContext::new(
            flags.unwrap_or_else(FlagStore::in_memory),
            Arc::new(MetricsRegistry::new()),
        );
        let engine = RuleEngine::new(registry.clone(), context, logger.clone());

        Runtime {
            rules: container.rules.into_iter().map(Arc::new).collect(),
            registry,
            engine,
            logger,
            rules_bound: AtomicBool::new(false),
        }
    }
}

/// A loaded container with its modules registered and resolved.
pub struct Runtime {
    registry: ModuleRegistry,
    engine: RuleEngine,
    logger: Logger,
    rules: Vec<Arc<Rule>>,
    rules_bound: AtomicBool,
}

impl Runtime {
    pub fn builder(container: Container) -> RuntimeBuilder {
        RuntimeBuilder::new(container)
    }

    /// Bind every rule's events. Only the first call binds anything.
    pub fn init_rules(&self) -> BindReport {
        if self.rules_bound.swap(true, Ordering::SeqCst) {
            self.logger.warn("Rules have already been initialized.");
            return BindReport::default();
        }

        let report = self.engine.bind_rules(&self.rules);
        info!(
            bound = report.bound,
            failed = report.failed.len(),
            "Rules initialized"
        );
        report
    }

    /// Fire every direct-call event registered for `identifier`.
    pub fn track(&self, identifier: &str, detail: Option<&Value>) -> Vec<FiringReport> {
        match self.dispatcher() {
            Some(dispatcher) => dispatcher.dispatch(identifier, detail),
            None => {
                self.logger.warn(format!(
                    "Direct call \"{}\" ignored, no dispatcher is available.",
                    identifier
                ));
                Vec::new()
            }
        }
    }

    /// Write a message at a numeric level: 3 info, 4 warn, 5 error, anything
    /// else a plain log line.
    pub fn notify(&self, message: &str, level: u8) {
        self.logger
            .write(LogLevel::from_notify_level(level), message);
    }

    pub fn set_debug(&self, enabled: bool) -> Result<(), FlagStoreError> {
        self.flags().set_debug_enabled(enabled)
    }

    pub fn debug_enabled(&self) -> bool {
        self.flags().debug_enabled()
    }

    pub fn set_hide_activity(&self, hide: bool) -> Result<(), FlagStoreError> {
        self.flags().set_hide_activity(hide)
    }

    pub fn should_execute_actions(&self) -> bool {
        self.flags().should_execute_actions()
    }

    /// Memoized exports of a registered module.
    pub fn module_exports(&self, path: &str) -> Result<ModuleExports, ModuleResolutionError> {
        self.registry.resolve(path)
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.engine.context().metrics
    }

    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    fn flags(&self) -> &FlagStore {
        &self.engine.context().flags
    }

    fn dispatcher(&self) -> Option<Arc<DirectCallDispatcher>> {
        self.registry
            .shared_exports(CORE_EXTENSION, DIRECT_CALL_DISPATCHER)
            .ok()
            .flatten()
            .and_then(|exports| exports.downcast_shared::<DirectCallDispatcher>())
    }
}
