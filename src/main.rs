use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use pagerule::config::Config;
use pagerule::container::ContainerLoader;
use pagerule::flags::{FileStore, FlagStore};
use pagerule::observability::{effective_level, init_tracing};
use pagerule::runtime::Runtime;

fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Open the flag store first, the debug flag decides the log level
    let flags = match &config.flags_path {
        Some(path) => FlagStore::new(Arc::new(FileStore::open(path)?)),
        None => FlagStore::in_memory(),
    };
    if let Some(debug) = config.debug {
        flags.set_debug_enabled(debug)?;
    }
    if let Some(hide) = config.hide_activity {
        flags.set_hide_activity(hide)?;
    }

    // Initialize tracing
    init_tracing(effective_level(&config.log_level, flags.debug_enabled()));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting pagerule runtime"
    );

    // Load container
    let loader = ContainerLoader::new(&config.container_path);
    let container = match loader.load() {
        Ok(container) => container,
        Err(e) => {
            error!(path = %loader.path().display(), error = %e, "Failed to load container");
            return Err(e.into());
        }
    };

    info!(
        path = %loader.path().display(),
        rules = container.rules.len(),
        extensions = container.extensions.len(),
        "Container loaded"
    );

    let runtime = Runtime::builder(container).flags(flags).build();

    let report = runtime.init_rules();
    info!(bound = report.bound, failed = report.failed.len(), "Rules bound");

    for identifier in &config.track {
        let reports = runtime.track(identifier, None);
        info!(identifier = %identifier, firings = reports.len(), "Direct call dispatched");
    }

    if config.print_metrics {
        println!("{}", runtime.metrics().to_prometheus());
    }

    info!("Shutdown complete");
    Ok(())
}
