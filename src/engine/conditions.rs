use crate::domain::{Element, Rule, RuleComponent, SharedEvent};
use crate::error::{catch_module_panic, ComponentError};
use crate::observability::Logger;
use crate::registry::{ModuleKind, ModuleRegistry};

use super::failure_message;
use super::outcome::ConditionOutcome;

/// Runs a rule's conditions in order, stopping at the first that does not
/// pass.
pub struct ConditionEvaluator<'a> {
    registry: &'a ModuleRegistry,
    logger: &'a Logger,
}

impl<'a> ConditionEvaluator<'a> {
    pub fn new(registry: &'a ModuleRegistry, logger: &'a Logger) -> Self {
        ConditionEvaluator { registry, logger }
    }

    pub fn evaluate(
        &self,
        rule: &Rule,
        element: Option<&Element>,
        event: &SharedEvent,
    ) -> ConditionOutcome {
        for condition in &rule.conditions {
            match self.check(condition, element, event) {
                Ok(true) => {}
                Ok(false) => {
                    self.logger.log(format!(
                        "Condition {} for rule {} not met.",
                        self.registry.display_name(&condition.module_path),
                        rule.name
                    ));
                    return ConditionOutcome::NotMet {
                        module_path: condition.module_path.clone(),
                    };
                }
                Err(e) => {
                    // Treated as a failed condition for gating.
                    self.logger
                        .error(failure_message(self.registry, condition, rule, &e));
                    return ConditionOutcome::Errored {
                        module_path: condition.module_path.clone(),
                    };
                }
            }
        }

        ConditionOutcome::AllPassed
    }

    /// Whether one condition passes, with exception conditions inverted.
    fn check(
        &self,
        condition: &RuleComponent,
        element: Option<&Element>,
        event: &SharedEvent,
    ) -> Result<bool, ComponentError> {
        let path = &condition.module_path;
        let module = self
            .registry
            .resolve(path)?
            .as_condition()
            .ok_or_else(|| ComponentError::NotInvocable {
                path: path.clone(),
                expected: ModuleKind::Condition,
            })?;

        let settings = self.registry.environment().tokens.replace(
            &condition.settings(),
            element,
            Some(event),
        );

        let result = catch_module_panic(|| module.check(&settings, element, event))
            .map_err(|e| ComponentError::execution(path, e))?;

        Ok(result != condition.is_exception())
    }
}
