use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Severity of an engine log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Log,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Map a numeric notify level (1-5) to a severity.
    ///
    /// 3 is info, 4 is warn, 5 is error; anything else is a plain log.
    pub fn from_notify_level(level: u8) -> Self {
        match level {
            3 => LogLevel::Info,
            4 => LogLevel::Warn,
            5 => LogLevel::Error,
            _ => LogLevel::Log,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Log => write!(f, "log"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Destination for engine log lines.
pub trait LogSink: Send + Sync {
    fn write(&self, level: LogLevel, message: &str);
}

/// Sink forwarding to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Log => debug!(target: "pagerule", "{}", message),
            LogLevel::Info => info!(target: "pagerule", "{}", message),
            LogLevel::Warn => warn!(target: "pagerule", "{}", message),
            LogLevel::Error => error!(target: "pagerule", "{}", message),
        }
    }
}

/// Sink that keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded lines (for assertions).
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().clone()
    }

    /// Lines recorded at the given level.
    pub fn at(&self, level: LogLevel) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn write(&self, level: LogLevel, message: &str) {
        self.lines.lock().push((level, message.to_string()));
    }
}

/// Cloneable logger handle, optionally prefixed with an extension name.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
    prefix: Option<String>,
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Logger { sink, prefix: None }
    }

    /// Logger writing through `tracing`.
    pub fn tracing() -> Self {
        Logger::new(Arc::new(TracingSink))
    }

    /// Logger sharing this sink whose lines start with `[name]`.
    pub fn prefixed(&self, name: &str) -> Logger {
        Logger {
            sink: self.sink.clone(),
            prefix: Some(format!("[{}]", name)),
        }
    }

    pub fn write(&self, level: LogLevel, message: impl AsRef<str>) {
        match &self.prefix {
            Some(prefix) => self
                .sink
                .write(level, &format!("{} {}", prefix, message.as_ref())),
            None => self.sink.write(level, message.as_ref()),
        }
    }

    pub fn log(&self, message: impl AsRef<str>) {
        self.write(LogLevel::Log, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.write(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.write(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.write(LogLevel::Error, message);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Logger::tracing()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("prefix", &self.prefix).finish()
    }
}
