use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::domain::{Element, SharedEvent};

/// Resolves deferred tokens in settings just before a module runs.
pub trait TokenReplacer: Send + Sync {
    fn replace(
        &self,
        settings: &Value,
        element: Option<&Element>,
        event: Option<&SharedEvent>,
    ) -> Value;
}

/// Leaves settings untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct Verbatim;

impl TokenReplacer for Verbatim {
    fn replace(&self, settings: &Value, _: Option<&Element>, _: Option<&SharedEvent>) -> Value {
        settings.clone()
    }
}

/// Replaces `%event.<field>%`, `%this.<property>%` and `%<data element>%`.
///
/// A string consisting of a single token keeps the resolved value's JSON
/// type; embedded tokens are rendered as text. Unknown tokens resolve to an
/// empty string. Names containing whitespace are not tokens.
#[derive(Debug, Default, Clone)]
pub struct DataElementTokens {
    data_elements: HashMap<String, Value>,
}

impl DataElementTokens {
    pub fn new(data_elements: HashMap<String, Value>) -> Self {
        DataElementTokens { data_elements }
    }

    fn lookup(
        &self,
        name: &str,
        element: Option<&Element>,
        event: Option<&SharedEvent>,
    ) -> Option<Value> {
        if let Some(path) = name.strip_prefix("event.") {
            let event = event?.lock();
            let mut segments = path.split('.');
            let mut value = event.get(segments.next()?)?;
            for segment in segments {
                value = value.get(segment)?.clone();
            }
            return Some(value);
        }

        if let Some(property) = name.strip_prefix("this.") {
            return element?
                .property(property)
                .map(|value| Value::String(value.to_string()));
        }

        self.data_elements.get(name).cloned()
    }

    fn replace_string(
        &self,
        text: &str,
        element: Option<&Element>,
        event: Option<&SharedEvent>,
    ) -> Value {
        if let Some(name) = whole_token(text) {
            return self
                .lookup(name, element, event)
                .unwrap_or_else(|| Value::String(String::new()));
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find('%') {
            let after = &rest[start + 1..];
            match after.find('%') {
                Some(end) if is_token_name(&after[..end]) => {
                    out.push_str(&rest[..start]);
                    out.push_str(&render(self.lookup(&after[..end], element, event)));
                    rest = &after[end + 1..];
                }
                _ => {
                    out.push_str(&rest[..=start]);
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        Value::String(out)
    }
}

impl TokenReplacer for DataElementTokens {
    fn replace(
        &self,
        settings: &Value,
        element: Option<&Element>,
        event: Option<&SharedEvent>,
    ) -> Value {
        match settings {
            Value::String(text) => self.replace_string(text, element, event),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.replace(item, element, event))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), self.replace(value, element, event)))
                    .collect::<Map<String, Value>>(),
            ),
            other => other.clone(),
        }
    }
}

fn is_token_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(char::is_whitespace)
}

fn whole_token(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('%')?.strip_suffix('%')?;
    if is_token_name(inner) && !inner.contains('%') {
        Some(inner)
    } else {
        None
    }
}

fn render(value: Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SyntheticEvent;
    use serde_json::json;

    fn tokens() -> DataElementTokens {
        let mut data = HashMap::new();
        data.insert("env".to_string(), json!("production"));
        data.insert("cart_total".to_string(), json!(42.5));
        DataElementTokens::new(data)
    }

    #[test]
    fn test_whole_token_keeps_type() {
        let replaced = tokens().replace(&json!({"total": "%cart_total%"}), None, None);
        assert_eq!(replaced, json!({"total": 42.5}));
    }

    #[test]
    fn test_embedded_tokens_render_as_text() {
        let replaced = tokens().replace(
            &json!(["env=%env%, total=%cart_total%", "%missing%!"]),
            None,
            None,
        );
        assert_eq!(replaced, json!(["env=production, total=42.5", "!"]));
    }

    #[test]
    fn test_percent_signs_that_are_not_tokens() {
        let replaced = tokens().replace(&json!("50% off and 20% more"), None, None);
        assert_eq!(replaced, json!("50% off and 20% more"));
    }

    #[test]
    fn test_event_and_element_tokens() {
        let mut fields = Map::new();
        fields.insert("detail".to_string(), json!({"sku": "A-1"}));
        let event = SyntheticEvent::from_fields(fields).into_shared();
        let element = Element::new("button").with_id("buy");

        let replaced = tokens().replace(
            &json!({"sku": "%event.detail.sku%", "label": "clicked %this.id%"}),
            Some(&element),
            Some(&event),
        );
        assert_eq!(replaced, json!({"sku": "A-1", "label": "clicked buy"}));
    }

    #[test]
    fn test_verbatim() {
        let settings = json!({"a": "%env%"});
        assert_eq!(Verbatim.replace(&settings, None, None), settings);
    }
}
