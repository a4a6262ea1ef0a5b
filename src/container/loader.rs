use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::Container;

/// Errors that can occur during container loading.
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a container from a YAML or JSON file, chosen by extension.
///
/// Files ending in `.json` are parsed as JSON; anything else as YAML.
pub fn load_container(path: impl AsRef<Path>) -> Result<Container, ContainerError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let container: Container = if is_json {
        serde_json::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };

    validate_container(&container)?;

    Ok(container)
}

/// Validate container configuration.
pub fn validate_container(container: &Container) -> Result<(), ContainerError> {
    let mut seen_ids = HashSet::new();

    for rule in &container.rules {
        if rule.id.is_empty() {
            return Err(ContainerError::Validation(format!(
                "Rule \"{}\" has an empty id",
                rule.name
            )));
        }

        if !seen_ids.insert(&rule.id) {
            return Err(ContainerError::Validation(format!(
                "Duplicate rule ID: {}",
                rule.id
            )));
        }

        if rule.components().any(|c| c.module_path.is_empty()) {
            return Err(ContainerError::Validation(format!(
                "Rule {} has a component without a module path",
                rule.id
            )));
        }
    }

    Ok(())
}

/// Loads the container document from a fixed path.
pub struct ContainerLoader {
    path: PathBuf,
}

impl ContainerLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ContainerLoader { path: path.into() }
    }

    pub fn load(&self) -> Result<Container, ContainerError> {
        load_container(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn write_temp(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_yaml_container() {
        let file = write_temp(
            ".yaml",
            r#"
rules:
  - id: RL1
    name: Page load
    events:
      - modulePath: core/events/library-loaded
    actions:
      - modulePath: core/actions/log-message
        settings:
          message: hello
dataElements:
  env: production
"#,
        );

        let container = load_container(file.path()).unwrap();
        assert_eq!(container.rules.len(), 1);
        assert_eq!(container.rules[0].actions.len(), 1);
        assert_eq!(container.data_elements["env"], "production");
    }

    #[test]
    fn test_load_json_container() {
        let file = write_temp(
            ".json",
            r#"{"rules": [{"id": "RL1", "name": "Json rule", "conditions": [
                {"modulePath": "core/conditions/value-comparison", "logicType": "exception"}
            ]}]}"#,
        );

        let container = load_container(file.path()).unwrap();
        assert!(container.rules[0].conditions[0].is_exception());
    }

    #[test]
    fn test_duplicate_rule_ids_rejected() {
        let file = write_temp(
            ".yaml",
            r#"
rules:
  - id: RL1
    name: First
  - id: RL1
    name: Second
"#,
        );

        let result = load_container(file.path());
        assert!(matches!(result, Err(ContainerError::Validation(_))));
    }

    #[test]
    fn test_empty_module_path_rejected() {
        let file = write_temp(
            ".yaml",
            r#"
rules:
  - id: RL1
    name: Broken
    actions:
      - modulePath: ""
"#,
        );

        let result = ContainerLoader::new(file.path()).load();
        assert!(matches!(result, Err(ContainerError::Validation(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = load_container("/nonexistent/container.yaml");
        assert!(matches!(result, Err(ContainerError::Io(_))));
    }
}
