use crate::domain::{Element, Rule, RuleComponent, SharedEvent};
use crate::error::{catch_module_panic, ComponentError};
use crate::observability::{Logger, MetricsRegistry};
use crate::registry::{ModuleKind, ModuleRegistry};

use super::failure_message;
use super::outcome::ActionSummary;

/// Runs every action of a rule in order. A failing action is logged and
/// the next one still runs.
pub struct ActionExecutor<'a> {
    registry: &'a ModuleRegistry,
    logger: &'a Logger,
    metrics: &'a MetricsRegistry,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(
        registry: &'a ModuleRegistry,
        logger: &'a Logger,
        metrics: &'a MetricsRegistry,
    ) -> Self {
        ActionExecutor {
            registry,
            logger,
            metrics,
        }
    }

    pub fn run(&self, rule: &Rule, element: Option<&Element>, event: &SharedEvent) -> ActionSummary {
        let mut summary = ActionSummary::default();

        for action in &rule.actions {
            match self.run_one(action, element, event) {
                Ok(()) => {
                    summary.succeeded += 1;
                    self.metrics.record_action(true);
                }
                Err(e) => {
                    self.logger
                        .error(failure_message(self.registry, action, rule, &e));
                    summary.failed.push(action.module_path.clone());
                    self.metrics.record_action(false);
                }
            }
        }

        summary
    }

    fn run_one(
        &self,
        action: &RuleComponent,
        element: Option<&Element>,
        event: &SharedEvent,
    ) -> Result<(), ComponentError> {
        let path = &action.module_path;
        let module = self
            .registry
            .resolve(path)?
            .as_action()
            .ok_or_else(|| ComponentError::NotInvocable {
                path: path.clone(),
                expected: ModuleKind::Action,
            })?;

        let settings =
            self.registry
                .environment()
                .tokens
                .replace(&action.settings(), element, Some(event));

        catch_module_panic(|| module.run(&settings, element, event))
            .map_err(|e| ComponentError::execution(path, e))
    }
}
