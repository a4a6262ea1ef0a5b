use std::path::PathBuf;

use clap::Parser;

/// Rule runtime configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "pagerule")]
#[command(about = "Tag-management rule runtime")]
pub struct Config {
    /// Path to the container document (YAML, or JSON with a .json extension)
    #[arg(long, default_value = "container.yaml", env = "PAGERULE_CONTAINER_PATH")]
    pub container_path: PathBuf,

    /// Path to the persisted flag file (optional, flags are kept in memory if not set)
    #[arg(long, env = "PAGERULE_FLAGS_PATH")]
    pub flags_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Persist the debug output flag before starting
    #[arg(long, env = "PAGERULE_DEBUG")]
    pub debug: Option<bool>,

    /// Persist the hide activity flag before starting
    #[arg(long, env = "PAGERULE_HIDE_ACTIVITY")]
    pub hide_activity: Option<bool>,

    /// Direct call identifiers to dispatch after rules are initialized
    #[arg(long = "track", value_name = "IDENTIFIER")]
    pub track: Vec<String>,

    /// Print metrics in Prometheus format before exiting
    #[arg(long, default_value = "false", env = "PAGERULE_PRINT_METRICS")]
    pub print_metrics: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            container_path: PathBuf::from("container.yaml"),
            flags_path: None,
            log_level: "info".to_string(),
            debug: None,
            hide_activity: None,
            track: Vec::new(),
            print_metrics: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.container_path, PathBuf::from("container.yaml"));
        assert_eq!(config.log_level, "info");
        assert!(config.flags_path.is_none());
        assert!(config.track.is_empty());
    }

    #[test]
    fn test_parse_args() {
        let config = Config::try_parse_from([
            "pagerule",
            "--container-path",
            "site.json",
            "--hide-activity",
            "true",
            "--track",
            "add-to-cart",
            "--track",
            "checkout",
        ])
        .unwrap();

        assert_eq!(config.container_path, PathBuf::from("site.json"));
        assert_eq!(config.hide_activity, Some(true));
        assert_eq!(config.debug, None);
        assert_eq!(config.track, vec!["add-to-cart", "checkout"]);
    }
}
