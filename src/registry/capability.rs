use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::ModuleResolutionError;
use crate::observability::Logger;

use super::module::ModuleExports;
use super::path::resolve_relative_path;
use super::{ExtensionScope, RegistryInner};

/// Handle injected into a module factory, scoped to the owning extension.
///
/// Holds only a weak reference back to the registry. Lookups made after the
/// registry is gone fail with `NotFound`.
#[derive(Clone)]
pub struct Capability {
    reference_path: String,
    extension: Arc<ExtensionScope>,
    logger: Logger,
    registry: Weak<RegistryInner>,
}

impl Capability {
    pub(crate) fn new(
        reference_path: &str,
        extension: Arc<ExtensionScope>,
        logger: Logger,
        registry: Weak<RegistryInner>,
    ) -> Self {
        Capability {
            reference_path: reference_path.to_string(),
            extension,
            logger,
            registry,
        }
    }

    /// Logger whose lines carry the extension's display name.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Path of the module this capability was created for.
    pub fn reference_path(&self) -> &str {
        &self.reference_path
    }

    pub fn extension_name(&self) -> &str {
        &self.extension.name
    }

    /// Extension settings with data element tokens replaced.
    ///
    /// Tokens are replaced on every call so the result reflects current
    /// data element values.
    pub fn extension_settings(&self) -> Value {
        match self.registry.upgrade() {
            Some(registry) => registry
                .environment
                .tokens
                .replace(&self.extension.settings, None, None),
            None => self.extension.settings.clone(),
        }
    }

    /// Resolve a module of the same extension by a path relative to this one.
    pub fn get_module_exports_by_relative_path(
        &self,
        relative_path: &str,
    ) -> Result<ModuleExports, ModuleResolutionError> {
        let path = resolve_relative_path(&self.reference_path, relative_path);
        match self.registry.upgrade() {
            Some(registry) => registry.resolve(&path),
            None => Err(ModuleResolutionError::NotFound { path }),
        }
    }

    /// Resolve a module another extension marked as shared.
    ///
    /// Returns `Ok(None)` when no such shared module is registered.
    pub fn get_shared_module_exports(
        &self,
        extension: &str,
        name: &str,
    ) -> Result<Option<ModuleExports>, ModuleResolutionError> {
        match self.registry.upgrade() {
            Some(registry) => registry.resolve_shared(extension, name),
            None => Ok(None),
        }
    }

    /// URL of a file hosted alongside the extension's library.
    pub fn get_hosted_lib_file_url(&self, file: &str) -> Option<String> {
        self.extension
            .hosted_lib_files_base_url
            .as_ref()
            .map(|base| format!("{}{}", base, file))
    }

    pub fn build_info(&self) -> Value {
        self.registry
            .upgrade()
            .map(|registry| registry.environment.build_info.clone())
            .unwrap_or(Value::Null)
    }

    /// Property settings, returned without token replacement.
    pub fn property_settings(&self) -> Value {
        self.registry
            .upgrade()
            .map(|registry| registry.environment.property_settings.clone())
            .unwrap_or(Value::Null)
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("reference_path", &self.reference_path)
            .field("extension", &self.extension.name)
            .finish()
    }
}
