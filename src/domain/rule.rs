use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smallvec::SmallVec;

use super::event::RuleRef;

/// How a condition's result gates the firing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicType {
    /// Passes when the condition returns false
    Exception,
    /// Passes when the condition returns true. Unknown values fall back here.
    #[default]
    #[serde(other)]
    Normal,
}

/// One event, condition or action entry of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleComponent {
    /// Registry path of the module implementing this component
    #[serde(alias = "modulePath")]
    pub module_path: String,

    /// Settings handed to the module after token substitution
    #[serde(default)]
    pub settings: Value,

    #[serde(default, alias = "logicType")]
    pub logic_type: LogicType,
}

impl RuleComponent {
    pub fn new(module_path: impl Into<String>) -> Self {
        RuleComponent {
            module_path: module_path.into(),
            settings: Value::Object(Map::new()),
            logic_type: LogicType::Normal,
        }
    }

    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = settings;
        self
    }

    /// Mark this component as an exception condition.
    pub fn exception(mut self) -> Self {
        self.logic_type = LogicType::Exception;
        self
    }

    pub fn is_exception(&self) -> bool {
        self.logic_type == LogicType::Exception
    }

    /// Settings, with a missing or null value read as an empty object.
    pub fn settings(&self) -> Value {
        match &self.settings {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        }
    }
}

/// A named binding of events to conditions and actions.
///
/// Rules are immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub events: SmallVec<[RuleComponent; 2]>,

    #[serde(default)]
    pub conditions: SmallVec<[RuleComponent; 4]>,

    #[serde(default)]
    pub actions: SmallVec<[RuleComponent; 4]>,
}

impl Rule {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Rule {
            id: id.into(),
            name: name.into(),
            events: SmallVec::new(),
            conditions: SmallVec::new(),
            actions: SmallVec::new(),
        }
    }

    pub fn with_event(mut self, event: RuleComponent) -> Self {
        self.events.push(event);
        self
    }

    pub fn with_condition(mut self, condition: RuleComponent) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: RuleComponent) -> Self {
        self.actions.push(action);
        self
    }

    /// Iterate every component regardless of its role.
    pub fn components(&self) -> impl Iterator<Item = &RuleComponent> {
        self.events
            .iter()
            .chain(self.conditions.iter())
            .chain(self.actions.iter())
    }

    pub fn reference(&self) -> RuleRef {
        RuleRef::new(&self.id, &self.name)
    }
}
