pub mod actions;
pub mod conditions;
pub mod context;
pub mod normalize;
pub mod outcome;
pub mod trigger;

pub use actions::ActionExecutor;
pub use conditions::ConditionEvaluator;
pub use context::ExecutionContext;
pub use normalize::normalize_synthetic_event;
pub use outcome::{ActionSummary, BindReport, ConditionOutcome, FiringReport};
pub use trigger::Trigger;

use std::sync::Arc;
use tracing::info_span;
use uuid::Uuid;

use crate::domain::{Element, Rule, RuleComponent, SharedEvent};
use crate::error::ComponentError;
use crate::observability::{Logger, TimingGuard};
use crate::registry::ModuleRegistry;

pub(crate) struct EngineShared {
    registry: ModuleRegistry,
    context: ExecutionContext,
    logger: Logger,
}

impl EngineShared {
    fn execute_rule(
        &self,
        rule: &Rule,
        element: Option<&Element>,
        event: &SharedEvent,
    ) -> FiringReport {
        let firing_id = Uuid::new_v4();
        let span = info_span!("firing", rule_id = %rule.id, firing_id = %firing_id);
        let _entered = span.enter();

        let metrics = &self.context.metrics;
        let _timer = TimingGuard::new(metrics);
        metrics.record_firing();

        let conditions =
            ConditionEvaluator::new(&self.registry, &self.logger).evaluate(rule, element, event);

        if !conditions.passed() {
            metrics.record_aborted(matches!(conditions, ConditionOutcome::Errored { .. }));
            return FiringReport {
                firing_id,
                rule_id: rule.id.clone(),
                conditions,
                actions: None,
                suppressed: false,
            };
        }

        // Read on every firing so the flag can be toggled at runtime.
        let suppressed = !self.context.flags.should_execute_actions();
        let actions = if suppressed {
            None
        } else {
            Some(ActionExecutor::new(&self.registry, &self.logger, metrics).run(rule, element, event))
        };

        self.logger.log(format!("Rule \"{}\" fired.", rule.name));
        metrics.record_completed(suppressed);

        FiringReport {
            firing_id,
            rule_id: rule.id.clone(),
            conditions,
            actions,
            suppressed,
        }
    }
}

/// Binds rules to their event modules and runs firings.
///
/// Cloning is cheap; triggers hold only a weak handle to the engine.
#[derive(Clone)]
pub struct RuleEngine {
    shared: Arc<EngineShared>,
}

impl RuleEngine {
    pub fn new(registry: ModuleRegistry, context: ExecutionContext, logger: Logger) -> Self {
        RuleEngine {
            shared: Arc::new(EngineShared {
                registry,
                context,
                logger,
            }),
        }
    }

    /// Bind every event of every rule. Binding is one-shot; failures are
    /// logged and skip only the affected event.
    pub fn bind_rules(&self, rules: &[Arc<Rule>]) -> BindReport {
        let mut report = BindReport::default();
        for rule in rules {
            trigger::bind_rule(&self.shared, rule, &mut report);
        }
        report
    }

    /// Run conditions and actions of `rule` against an already normalized
    /// event.
    pub fn execute(
        &self,
        rule: &Rule,
        element: Option<&Element>,
        event: &SharedEvent,
    ) -> FiringReport {
        self.shared.execute_rule(rule, element, event)
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.shared.registry
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.shared.context
    }
}

/// Log line for a component that could not be resolved or run.
pub(crate) fn failure_message(
    registry: &ModuleRegistry,
    component: &RuleComponent,
    rule: &Rule,
    error: &ComponentError,
) -> String {
    format!(
        "Failed to execute {} for {} rule. {}",
        registry.display_name(&component.module_path),
        rule.name,
        error
    )
}
