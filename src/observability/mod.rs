pub mod logger;
pub mod metrics;
pub mod tracing;

pub use logger::{LogLevel, LogSink, Logger, MemorySink, TracingSink};
pub use metrics::{MetricsRegistry, TimingGuard};
pub use tracing::{effective_level, init_tracing};
