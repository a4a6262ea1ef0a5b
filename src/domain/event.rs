use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

/// Field holding the canonical event type tag.
pub const TYPE_FIELD: &str = "$type";

/// Field holding the reference to the rule being fired.
pub const RULE_FIELD: &str = "$rule";

/// Deprecated alias of [`TYPE_FIELD`], kept for older extension code.
pub const LEGACY_TYPE_FIELD: &str = "type";

/// Event handle shared by every consumer of one firing.
///
/// Identity matters: normalizing the same handle twice yields the same
/// handle, so holders of an earlier clone observe later metadata.
pub type SharedEvent = Arc<Mutex<SyntheticEvent>>;

/// Reference to the rule that produced a firing, stamped as `$rule`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl RuleRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        RuleRef {
            id: id.into(),
            name: name.into(),
        }
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        if !self.id.is_empty() {
            map.insert("id".to_string(), Value::String(self.id.clone()));
        }
        if !self.name.is_empty() {
            map.insert("name".to_string(), Value::String(self.name.clone()));
        }
        Value::Object(map)
    }
}

/// Metadata the engine stamps onto an event before conditions run.
///
/// Only the fields that are present are written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventMeta {
    pub event_type: Option<String>,
    pub rule: Option<RuleRef>,
}

impl EventMeta {
    pub fn new(event_type: impl Into<String>, rule: RuleRef) -> Self {
        EventMeta {
            event_type: Some(event_type.into()),
            rule: Some(rule),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Origin {
    /// Plain data supplied by an extension or created by the engine.
    Plain,
    /// Platform event. Its type and properties belong to the platform and
    /// are never enumerated or rewritten.
    Native {
        event_type: String,
        properties: Map<String, Value>,
    },
}

/// Event object passed through conditions and actions.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticEvent {
    origin: Origin,
    /// Enumerable own fields
    fields: Map<String, Value>,
    /// Non-enumerable `type` alias reading `$type`
    legacy_type_alias: bool,
}

impl SyntheticEvent {
    /// Create an empty plain event.
    pub fn plain() -> Self {
        SyntheticEvent::from_fields(Map::new())
    }

    /// Create a plain event from extension-defined fields.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        SyntheticEvent {
            origin: Origin::Plain,
            fields,
            legacy_type_alias: false,
        }
    }

    /// Wrap a platform event with its native type and properties.
    pub fn native(event_type: impl Into<String>, properties: Map<String, Value>) -> Self {
        SyntheticEvent {
            origin: Origin::Native {
                event_type: event_type.into(),
                properties,
            },
            fields: Map::new(),
            legacy_type_alias: false,
        }
    }

    pub fn into_shared(self) -> SharedEvent {
        Arc::new(Mutex::new(self))
    }

    pub fn is_plain(&self) -> bool {
        matches!(self.origin, Origin::Plain)
    }

    /// Read a field, falling back to native properties and the legacy alias.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.fields.get(key) {
            return Some(value.clone());
        }

        if let Origin::Native {
            event_type,
            properties,
        } = &self.origin
        {
            if key == LEGACY_TYPE_FIELD {
                return Some(Value::String(event_type.clone()));
            }
            if let Some(value) = properties.get(key) {
                return Some(value.clone());
            }
        }

        if key == LEGACY_TYPE_FIELD && self.legacy_type_alias {
            warn!(
                "Accessing event.type has been deprecated and will be removed soon. \
                 Please use event.$type instead."
            );
            return self.fields.get(TYPE_FIELD).cloned();
        }

        None
    }

    /// Set an enumerable field.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if key == LEGACY_TYPE_FIELD {
            self.legacy_type_alias = false;
        }
        self.fields.insert(key, value);
    }

    /// Enumerable own field names (the legacy alias and native properties
    /// are not listed).
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn event_type(&self) -> Option<&str> {
        self.fields.get(TYPE_FIELD).and_then(Value::as_str)
    }

    pub fn rule(&self) -> Option<RuleRef> {
        self.fields
            .get(RULE_FIELD)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Whether the event defines its own `type`, which the legacy alias
    /// must never shadow.
    pub fn has_own_type(&self) -> bool {
        matches!(self.origin, Origin::Native { .. }) || self.fields.contains_key(LEGACY_TYPE_FIELD)
    }

    pub fn has_legacy_type_alias(&self) -> bool {
        self.legacy_type_alias
    }

    /// Enumerable fields as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Stamp metadata in place. Last writer wins; unrelated fields stay.
    pub(crate) fn apply_meta(&mut self, meta: &EventMeta) {
        if let Some(event_type) = &meta.event_type {
            self.fields
                .insert(TYPE_FIELD.to_string(), Value::String(event_type.clone()));
        }
        if let Some(rule) = &meta.rule {
            self.fields.insert(RULE_FIELD.to_string(), rule.to_value());
        }
        if !self.has_own_type() {
            self.legacy_type_alias = true;
        }
    }
}

impl Default for SyntheticEvent {
    fn default() -> Self {
        SyntheticEvent::plain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_native_event_exposes_platform_type() {
        let mut properties = Map::new();
        properties.insert("detail".to_string(), json!({"foo": "bar"}));
        let event = SyntheticEvent::native("click", properties);

        assert!(!event.is_plain());
        assert!(event.has_own_type());
        assert_eq!(event.get("type"), Some(json!("click")));
        assert_eq!(event.get("detail"), Some(json!({"foo": "bar"})));
        assert_eq!(event.keys().count(), 0);
    }

    #[test]
    fn test_insert_type_disables_alias() {
        let mut event = SyntheticEvent::plain();
        event.apply_meta(&EventMeta::new("ext.evt", RuleRef::new("r1", "rule")));
        assert!(event.has_legacy_type_alias());

        event.insert("type", json!("custom"));
        assert!(!event.has_legacy_type_alias());
        assert_eq!(event.get("type"), Some(json!("custom")));
    }

    #[test]
    fn test_rule_reference_round_trips() {
        let mut event = SyntheticEvent::plain();
        event.apply_meta(&EventMeta::new("ext.evt", RuleRef::new("r1", "Rule One")));

        assert_eq!(event.event_type(), Some("ext.evt"));
        assert_eq!(event.rule(), Some(RuleRef::new("r1", "Rule One")));
        assert_eq!(
            event.to_json(),
            json!({"$type": "ext.evt", "$rule": {"id": "r1", "name": "Rule One"}})
        );
    }
}
