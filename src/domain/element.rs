use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Page element related to an occurrence (the element a rule targeted).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Lowercase tag name, e.g. "a" or "button"
    pub tag_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// Text content, if the caller captured it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Element {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Element {
            tag_name: tag_name.into().to_lowercase(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Look up a property the way `%this.<name>%` tokens do.
    pub fn property(&self, name: &str) -> Option<&str> {
        match name {
            "id" => self.id.as_deref(),
            "tagName" | "tag_name" => Some(self.tag_name.as_str()),
            "text" | "innerText" | "textContent" => self.text.as_deref(),
            _ => self.attributes.get(name).map(String::as_str),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "<{}#{}>", self.tag_name, id),
            None => write!(f, "<{}>", self.tag_name),
        }
    }
}
