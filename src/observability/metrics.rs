use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Metrics registry for the runtime.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Event bindings attempted at startup
    pub bindings_total: AtomicU64,
    pub binding_failures: AtomicU64,

    /// Firings started by a trigger
    pub firings_total: AtomicU64,

    /// Firings by outcome
    pub firings_completed: AtomicU64,
    pub firings_suppressed: AtomicU64,
    pub conditions_not_met: AtomicU64,
    pub condition_errors: AtomicU64,

    /// Action executions
    pub actions_executed: AtomicU64,
    pub action_failures: AtomicU64,

    /// Firing latency buckets (microseconds)
    pub latency_under_100us: AtomicU64,
    pub latency_100us_1ms: AtomicU64,
    pub latency_1_10ms: AtomicU64,
    pub latency_over_10ms: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    /// Record one event binding attempt.
    pub fn record_binding(&self, success: bool) {
        self.bindings_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.binding_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record that a trigger started a firing.
    pub fn record_firing(&self) {
        self.firings_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a firing whose conditions all passed.
    pub fn record_completed(&self, suppressed: bool) {
        self.firings_completed.fetch_add(1, Ordering::Relaxed);
        if suppressed {
            self.firings_suppressed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a firing stopped by its conditions.
    pub fn record_aborted(&self, errored: bool) {
        if errored {
            self.condition_errors.fetch_add(1, Ordering::Relaxed);
        } else {
            self.conditions_not_met.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record one action execution.
    pub fn record_action(&self, success: bool) {
        self.actions_executed.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.action_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record firing latency.
    pub fn record_latency(&self, start: Instant) {
        let micros = start.elapsed().as_micros() as u64;

        if micros < 100 {
            self.latency_under_100us.fetch_add(1, Ordering::Relaxed);
        } else if micros < 1000 {
            self.latency_100us_1ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 10000 {
            self.latency_1_10ms.fetch_add(1, Ordering::Relaxed);
        } else {
            self.latency_over_10ms.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        // Histogram buckets are cumulative: each `le` includes every faster one.
        let le_100us = self.latency_under_100us.load(Ordering::Relaxed);
        let le_1ms = le_100us + self.latency_100us_1ms.load(Ordering::Relaxed);
        let le_10ms = le_1ms + self.latency_1_10ms.load(Ordering::Relaxed);
        let le_inf = le_10ms + self.latency_over_10ms.load(Ordering::Relaxed);

        format!(
            r#"# HELP pagerule_bindings_total Event bindings attempted
# TYPE pagerule_bindings_total counter
pagerule_bindings_total {}

# HELP pagerule_binding_failures_total Event bindings that failed
# TYPE pagerule_binding_failures_total counter
pagerule_binding_failures_total {}

# HELP pagerule_firings_total Rule firings started by a trigger
# TYPE pagerule_firings_total counter
pagerule_firings_total {}

# HELP pagerule_firings Rule firings by outcome
# TYPE pagerule_firings counter
pagerule_firings{{outcome="completed"}} {}
pagerule_firings{{outcome="suppressed"}} {}
pagerule_firings{{outcome="not_met"}} {}
pagerule_firings{{outcome="condition_error"}} {}

# HELP pagerule_actions_executed_total Actions attempted
# TYPE pagerule_actions_executed_total counter
pagerule_actions_executed_total {}

# HELP pagerule_action_failures_total Actions that failed
# TYPE pagerule_action_failures_total counter
pagerule_action_failures_total {}

# HELP pagerule_firing_latency_bucket Firing latency histogram
# TYPE pagerule_firing_latency_bucket counter
pagerule_firing_latency_bucket{{le="0.0001"}} {}
pagerule_firing_latency_bucket{{le="0.001"}} {}
pagerule_firing_latency_bucket{{le="0.01"}} {}
pagerule_firing_latency_bucket{{le="+Inf"}} {}
"#,
            self.bindings_total.load(Ordering::Relaxed),
            self.binding_failures.load(Ordering::Relaxed),
            self.firings_total.load(Ordering::Relaxed),
            self.firings_completed.load(Ordering::Relaxed),
            self.firings_suppressed.load(Ordering::Relaxed),
            self.conditions_not_met.load(Ordering::Relaxed),
            self.condition_errors.load(Ordering::Relaxed),
            self.actions_executed.load(Ordering::Relaxed),
            self.action_failures.load(Ordering::Relaxed),
            le_100us,
            le_1ms,
            le_10ms,
            le_inf,
        )
    }
}

/// Guard for timing operations.
pub struct TimingGuard<'a> {
    registry: &'a MetricsRegistry,
    start: Instant,
}

impl<'a> TimingGuard<'a> {
    pub fn new(registry: &'a MetricsRegistry) -> Self {
        TimingGuard {
            registry,
            start: Instant::now(),
        }
    }
}

impl<'a> Drop for TimingGuard<'a> {
    fn drop(&mut self) {
        self.registry.record_latency(self.start);
    }
}
