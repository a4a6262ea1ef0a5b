use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::domain::{Element, SharedEvent};
use crate::engine::Trigger;

use super::capability::Capability;

/// Factory producing a module's exports, invoked at most once per path.
pub type ModuleFactory =
    Arc<dyn Fn(&Capability) -> anyhow::Result<ModuleExports> + Send + Sync>;

/// Trait for event modules.
///
/// Called once at bind time. The module keeps the trigger and calls it
/// whenever its occurrence happens, any number of times.
pub trait EventModule: Send + Sync {
    fn bind(&self, settings: &Value, trigger: Trigger) -> anyhow::Result<()>;
}

/// Trait for condition modules.
///
/// Returns whether the checked situation holds. The engine inverts the
/// result for exception conditions.
pub trait ConditionModule: Send + Sync {
    fn check(
        &self,
        settings: &Value,
        element: Option<&Element>,
        event: &SharedEvent,
    ) -> anyhow::Result<bool>;
}

/// Trait for action modules.
pub trait ActionModule: Send + Sync {
    fn run(
        &self,
        settings: &Value,
        element: Option<&Element>,
        event: &SharedEvent,
    ) -> anyhow::Result<()>;
}

impl<F> EventModule for F
where
    F: Fn(&Value, Trigger) -> anyhow::Result<()> + Send + Sync,
{
    fn bind(&self, settings: &Value, trigger: Trigger) -> anyhow::Result<()> {
        self(settings, trigger)
    }
}

impl<F> ConditionModule for F
where
    F: Fn(&Value, Option<&Element>, &SharedEvent) -> anyhow::Result<bool> + Send + Sync,
{
    fn check(
        &self,
        settings: &Value,
        element: Option<&Element>,
        event: &SharedEvent,
    ) -> anyhow::Result<bool> {
        self(settings, element, event)
    }
}

impl<F> ActionModule for F
where
    F: Fn(&Value, Option<&Element>, &SharedEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn run(
        &self,
        settings: &Value,
        element: Option<&Element>,
        event: &SharedEvent,
    ) -> anyhow::Result<()> {
        self(settings, element, event)
    }
}

/// Kind of export a module produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    Event,
    Condition,
    Action,
    Value,
    Shared,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleKind::Event => write!(f, "an event"),
            ModuleKind::Condition => write!(f, "a condition"),
            ModuleKind::Action => write!(f, "an action"),
            ModuleKind::Value => write!(f, "a value"),
            ModuleKind::Shared => write!(f, "a shared"),
        }
    }
}

/// Memoized result of running a module factory.
///
/// Cloning is cheap and preserves identity: every clone points at the same
/// underlying module.
#[derive(Clone)]
pub enum ModuleExports {
    Event(Arc<dyn EventModule>),
    Condition(Arc<dyn ConditionModule>),
    Action(Arc<dyn ActionModule>),
    /// Plain data export
    Value(Arc<Value>),
    /// Arbitrary object shared with other modules
    Shared(Arc<dyn Any + Send + Sync>),
}

impl ModuleExports {
    pub fn event<F>(f: F) -> Self
    where
        F: Fn(&Value, Trigger) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        ModuleExports::Event(Arc::new(f))
    }

    pub fn condition<F>(f: F) -> Self
    where
        F: Fn(&Value, Option<&Element>, &SharedEvent) -> anyhow::Result<bool>
            + Send
            + Sync
            + 'static,
    {
        ModuleExports::Condition(Arc::new(f))
    }

    pub fn action<F>(f: F) -> Self
    where
        F: Fn(&Value, Option<&Element>, &SharedEvent) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        ModuleExports::Action(Arc::new(f))
    }

    pub fn value(value: Value) -> Self {
        ModuleExports::Value(Arc::new(value))
    }

    pub fn shared<T: Any + Send + Sync>(object: T) -> Self {
        ModuleExports::Shared(Arc::new(object))
    }

    pub fn kind(&self) -> ModuleKind {
        match self {
            ModuleExports::Event(_) => ModuleKind::Event,
            ModuleExports::Condition(_) => ModuleKind::Condition,
            ModuleExports::Action(_) => ModuleKind::Action,
            ModuleExports::Value(_) => ModuleKind::Value,
            ModuleExports::Shared(_) => ModuleKind::Shared,
        }
    }

    pub fn as_event(&self) -> Option<Arc<dyn EventModule>> {
        match self {
            ModuleExports::Event(module) => Some(module.clone()),
            _ => None,
        }
    }

    pub fn as_condition(&self) -> Option<Arc<dyn ConditionModule>> {
        match self {
            ModuleExports::Condition(module) => Some(module.clone()),
            _ => None,
        }
    }

    pub fn as_action(&self) -> Option<Arc<dyn ActionModule>> {
        match self {
            ModuleExports::Action(module) => Some(module.clone()),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ModuleExports::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Downcast a shared export to its concrete type.
    pub fn downcast_shared<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            ModuleExports::Shared(object) => object.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Whether both exports are the same underlying module.
    pub fn ptr_eq(&self, other: &ModuleExports) -> bool {
        match (self, other) {
            (ModuleExports::Event(a), ModuleExports::Event(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (ModuleExports::Condition(a), ModuleExports::Condition(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (ModuleExports::Action(a), ModuleExports::Action(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (ModuleExports::Value(a), ModuleExports::Value(b)) => Arc::ptr_eq(a, b),
            (ModuleExports::Shared(a), ModuleExports::Shared(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for ModuleExports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleExports::Value(value) => f.debug_tuple("Value").field(value).finish(),
            other => write!(f, "{:?}", other.kind()),
        }
    }
}

/// Static description of a registered module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    /// Unique registry key
    pub path: String,

    /// Owning extension
    pub extension: String,

    /// Short name, unique within the extension
    pub name: String,

    /// Human-readable name used in log lines
    pub display_name: String,

    /// Whether other extensions may look this module up by name
    #[serde(default)]
    pub shared: bool,
}

impl ModuleDefinition {
    pub fn new(
        path: impl Into<String>,
        extension: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        ModuleDefinition {
            path: path.into(),
            extension: extension.into(),
            display_name: name.clone(),
            name,
            shared: false,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn shared(mut self) -> Self {
        self.shared = true;
        self
    }

    /// Type tag stamped on events this module emits (`extension.name`).
    pub fn event_type(&self) -> String {
        format!("{}.{}", self.extension, self.name)
    }
}
