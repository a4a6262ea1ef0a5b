pub mod builtins;
pub mod config;
pub mod container;
pub mod domain;
pub mod engine;
pub mod error;
pub mod flags;
pub mod observability;
pub mod registry;
pub mod runtime;
pub mod tokens;

pub use config::Config;
pub use domain::{Container, Element, Rule, RuleComponent, SharedEvent, SyntheticEvent};
pub use engine::{FiringReport, RuleEngine, Trigger};
pub use error::{ComponentError, ModuleResolutionError};
pub use registry::{Capability, ModuleDefinition, ModuleExports, ModuleRegistry};
pub use runtime::{Runtime, RuntimeBuilder};
