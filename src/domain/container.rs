use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::rule::Rule;

/// Rule configuration document supplied once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub rules: Vec<Rule>,

    /// Per-extension configuration keyed by extension name
    #[serde(default)]
    pub extensions: HashMap<String, ExtensionConfig>,

    /// Values substituted for `%name%` tokens in settings
    #[serde(default, alias = "dataElements")]
    pub data_elements: HashMap<String, Value>,

    #[serde(default, alias = "buildInfo")]
    pub build_info: Value,

    #[serde(default, alias = "propertySettings")]
    pub property_settings: Value,
}

/// Configuration the document carries for one extension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtensionConfig {
    #[serde(default, alias = "displayName")]
    pub display_name: Option<String>,

    #[serde(default)]
    pub settings: Value,

    #[serde(default, alias = "hostedLibFilesBaseUrl")]
    pub hosted_lib_files_base_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_container_deserialization() {
        let yaml = r#"
rules:
  - id: RL1
    name: Page view
    events:
      - module_path: core/events/library-loaded
extensions:
  analytics:
    displayName: Analytics
    settings:
      account: acme-prod
    hosted_lib_files_base_url: https://assets.example.com/analytics/
data_elements:
  env: production
build_info:
  environment: production
"#;

        let container: Container = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(container.rules.len(), 1);

        let analytics = &container.extensions["analytics"];
        assert_eq!(analytics.display_name.as_deref(), Some("Analytics"));
        assert_eq!(analytics.settings, json!({"account": "acme-prod"}));
        assert_eq!(container.data_elements["env"], json!("production"));
        assert_eq!(container.property_settings, Value::Null);
    }
}
