use std::sync::Arc;

use crate::flags::FlagStore;
use crate::observability::MetricsRegistry;

/// Process-wide state threaded through every firing.
///
/// Built once at startup. The flag store is read again on each firing so
/// toggling a flag takes effect without rebinding rules.
#[derive(Clone)]
pub struct ExecutionContext {
    pub flags: FlagStore,
    pub metrics: Arc<MetricsRegistry>,
}

impl ExecutionContext {
    pub fn new(flags: FlagStore, metrics: Arc<MetricsRegistry>) -> Self {
        ExecutionContext { flags, metrics }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        ExecutionContext::new(FlagStore::in_memory(), Arc::new(MetricsRegistry::new()))
    }
}
