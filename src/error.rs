use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

use crate::registry::ModuleKind;

/// Errors that can occur while resolving a module path to its exports.
///
/// Failures are cached by the registry, so the type is cheap to clone and
/// carries the original cause behind an `Arc`.
#[derive(Error, Debug, Clone)]
pub enum ModuleResolutionError {
    #[error("Module {path} not found.")]
    NotFound { path: String },

    #[error("Module {path} is already being resolved. Circular references must be resolved lazily.")]
    Circular { path: String },

    #[error("Module {path} failed to initialize. {cause:#}")]
    Factory {
        path: String,
        cause: Arc<anyhow::Error>,
    },
}

impl ModuleResolutionError {
    /// The module path that failed to resolve.
    pub fn path(&self) -> &str {
        match self {
            ModuleResolutionError::NotFound { path }
            | ModuleResolutionError::Circular { path }
            | ModuleResolutionError::Factory { path, .. } => path,
        }
    }
}

/// Failure of a single rule component (event, condition or action).
///
/// Every variant is caught by the engine and turned into one log line; none
/// of them escape a firing.
#[derive(Error, Debug, Clone)]
pub enum ComponentError {
    #[error(transparent)]
    Resolution(#[from] ModuleResolutionError),

    #[error("Module did not export {expected} module.")]
    NotInvocable { path: String, expected: ModuleKind },

    #[error("{cause:#}")]
    Execution {
        path: String,
        cause: Arc<anyhow::Error>,
    },
}

impl ComponentError {
    pub(crate) fn execution(path: &str, cause: anyhow::Error) -> Self {
        ComponentError::Execution {
            path: path.to_string(),
            cause: Arc::new(cause),
        }
    }

    /// The module path of the failing component.
    pub fn path(&self) -> &str {
        match self {
            ComponentError::Resolution(e) => e.path(),
            ComponentError::NotInvocable { path, .. } | ComponentError::Execution { path, .. } => {
                path
            }
        }
    }
}

/// Run extension code, turning a panic into an ordinary error.
pub(crate) fn catch_module_panic<T>(f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!(
            "Module panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}
