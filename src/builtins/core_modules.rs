use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::domain::{SharedEvent, SyntheticEvent};
use crate::engine::{FiringReport, Trigger};
use crate::observability::LogLevel;
use crate::registry::{Capability, ModuleDefinition, ModuleExports, ModuleRegistry};

pub const CORE_EXTENSION: &str = "core";
pub const DIRECT_CALL_DISPATCHER: &str = "direct-call-dispatcher";

pub const LIBRARY_LOADED_PATH: &str = "core/events/library-loaded";
pub const DIRECT_CALL_PATH: &str = "core/events/direct-call";
pub const DISPATCHER_PATH: &str = "core/shared/direct-call-dispatcher";
pub const VALUE_COMPARISON_PATH: &str = "core/conditions/value-comparison";
pub const LOG_MESSAGE_PATH: &str = "core/actions/log-message";

/// Routes `track` calls to the triggers of direct-call events.
#[derive(Debug, Default)]
pub struct DirectCallDispatcher {
    triggers: Mutex<Vec<(String, Trigger)>>,
}

impl DirectCallDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, identifier: impl Into<String>, trigger: Trigger) {
        self.triggers.lock().push((identifier.into(), trigger));
    }

    /// Fire every trigger subscribed to `identifier`, in subscription order.
    ///
    /// Each trigger gets its own event carrying the identifier and detail.
    pub fn dispatch(&self, identifier: &str, detail: Option<&Value>) -> Vec<FiringReport> {
        let matching: Vec<Trigger> = self
            .triggers
            .lock()
            .iter()
            .filter(|(id, _)| id == identifier)
            .map(|(_, trigger)| trigger.clone())
            .collect();

        matching
            .iter()
            .filter_map(|trigger| trigger.fire(None, Some(direct_call_event(identifier, detail))))
            .collect()
    }

    pub fn subscriptions(&self) -> usize {
        self.triggers.lock().len()
    }
}

fn direct_call_event(identifier: &str, detail: Option<&Value>) -> SharedEvent {
    let mut fields = Map::new();
    fields.insert("identifier".to_string(), Value::String(identifier.to_string()));
    if let Some(detail) = detail {
        fields.insert("detail".to_string(), detail.clone());
    }
    SyntheticEvent::from_fields(fields).into_shared()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectCallSettings {
    identifier: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ComparisonOperator {
    Equals,
    #[serde(alias = "doesNotEqual")]
    DoesNotEqual,
    Contains,
    #[serde(alias = "startsWith")]
    StartsWith,
    #[serde(alias = "endsWith")]
    EndsWith,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueComparisonSettings {
    #[serde(default)]
    left_operand: Value,
    operator: ComparisonOperator,
    #[serde(default)]
    right_operand: Value,
    #[serde(default)]
    case_insensitive: bool,
}

impl ValueComparisonSettings {
    fn matches(&self) -> bool {
        let mut left = operand_text(&self.left_operand);
        let mut right = operand_text(&self.right_operand);
        if self.case_insensitive {
            left = left.to_lowercase();
            right = right.to_lowercase();
        }

        match self.operator {
            ComparisonOperator::Equals => left == right,
            ComparisonOperator::DoesNotEqual => left != right,
            ComparisonOperator::Contains => left.contains(&right),
            ComparisonOperator::StartsWith => left.starts_with(&right),
            ComparisonOperator::EndsWith => left.ends_with(&right),
        }
    }
}

fn operand_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct LogMessageSettings {
    message: String,
    #[serde(default)]
    level: Option<String>,
}

fn parse_level(level: Option<&str>) -> LogLevel {
    match level {
        Some("info") => LogLevel::Info,
        Some("warn") => LogLevel::Warn,
        Some("error") => LogLevel::Error,
        _ => LogLevel::Log,
    }
}

fn dispatcher(cap: &Capability) -> anyhow::Result<Arc<DirectCallDispatcher>> {
    cap.get_shared_module_exports(CORE_EXTENSION, DIRECT_CALL_DISPATCHER)?
        .and_then(|exports| exports.downcast_shared::<DirectCallDispatcher>())
        .ok_or_else(|| anyhow::anyhow!("Direct call dispatcher is not available."))
}

/// Register the modules of the built-in `core` extension.
pub fn register_core(registry: &ModuleRegistry) {
    registry.register(
        ModuleDefinition::new(DISPATCHER_PATH, CORE_EXTENSION, DIRECT_CALL_DISPATCHER)
            .with_display_name("Direct Call Dispatcher")
            .shared(),
        |_| Ok(ModuleExports::shared(DirectCallDispatcher::new())),
    );

    registry.register(
        ModuleDefinition::new(LIBRARY_LOADED_PATH, CORE_EXTENSION, "library-loaded")
            .with_display_name("Library Loaded"),
        |_| {
            Ok(ModuleExports::event(|_, trigger| {
                trigger.fire(None, None);
                Ok(())
            }))
        },
    );

    registry.register(
        ModuleDefinition::new(DIRECT_CALL_PATH, CORE_EXTENSION, "direct-call")
            .with_display_name("Direct Call"),
        |cap| {
            // Looked up lazily so registration order does not matter.
            let cap = cap.clone();
            Ok(ModuleExports::event(move |settings, trigger| {
                let settings: DirectCallSettings = serde_json::from_value(settings.clone())?;
                dispatcher(&cap)?.subscribe(settings.identifier, trigger);
                Ok(())
            }))
        },
    );

    registry.register(
        ModuleDefinition::new(VALUE_COMPARISON_PATH, CORE_EXTENSION, "value-comparison")
            .with_display_name("Value Comparison"),
        |_| {
            Ok(ModuleExports::condition(|settings, _, _| {
                let settings: ValueComparisonSettings = serde_json::from_value(settings.clone())?;
                Ok(settings.matches())
            }))
        },
    );

    registry.register(
        ModuleDefinition::new(LOG_MESSAGE_PATH, CORE_EXTENSION, "log-message")
            .with_display_name("Log Message"),
        |cap| {
            let logger = cap.logger().clone();
            Ok(ModuleExports::action(move |settings, _, _| {
                let settings: LogMessageSettings = serde_json::from_value(settings.clone())?;
                logger.write(parse_level(settings.level.as_deref()), settings.message);
                Ok(())
            }))
        },
    );
}
