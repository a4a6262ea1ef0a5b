use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::domain::{Element, EventMeta, Rule, RuleComponent, SharedEvent};
use crate::error::{catch_module_panic, ComponentError};
use crate::registry::ModuleKind;

use super::normalize::normalize_synthetic_event;
use super::outcome::{BindReport, FiringReport};
use super::{failure_message, EngineShared};

/// Callback handed to an event module, bound to one rule and event.
///
/// Event modules keep it and call [`Trigger::fire`] each time their
/// occurrence happens. Once the engine is dropped, firing is a no-op.
#[derive(Clone)]
pub struct Trigger {
    engine: Weak<EngineShared>,
    rule: Arc<Rule>,
    meta: EventMeta,
}

impl Trigger {
    pub(crate) fn new(engine: Weak<EngineShared>, rule: Arc<Rule>, meta: EventMeta) -> Self {
        Trigger { engine, rule, meta }
    }

    /// Run the rule's conditions and actions for one occurrence.
    ///
    /// The event, if given, is normalized in place and the same handle is
    /// passed to every condition and action.
    pub fn fire(&self, element: Option<&Element>, event: Option<SharedEvent>) -> Option<FiringReport> {
        let engine = self.engine.upgrade()?;
        let event = normalize_synthetic_event(&self.meta, event);
        Some(engine.execute_rule(&self.rule, element, &event))
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// Metadata stamped on every event this trigger fires with.
    pub fn meta(&self) -> &EventMeta {
        &self.meta
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("rule", &self.rule.id)
            .field("meta", &self.meta)
            .finish()
    }
}

/// Bind every event of `rule`, recording results into `report`.
pub(crate) fn bind_rule(engine: &Arc<EngineShared>, rule: &Arc<Rule>, report: &mut BindReport) {
    for component in &rule.events {
        let result = bind_event(engine, rule, component);
        engine.context.metrics.record_binding(result.is_ok());

        match result {
            Ok(()) => {
                debug!(rule_id = %rule.id, path = %component.module_path, "Bound event");
                report.bound += 1;
            }
            Err(e) => {
                engine
                    .logger
                    .error(failure_message(&engine.registry, component, rule, &e));
                report
                    .failed
                    .push((rule.id.clone(), component.module_path.clone()));
            }
        }
    }
}

fn bind_event(
    engine: &Arc<EngineShared>,
    rule: &Arc<Rule>,
    component: &RuleComponent,
) -> Result<(), ComponentError> {
    let path = &component.module_path;
    let module = engine
        .registry
        .resolve(path)?
        .as_event()
        .ok_or_else(|| ComponentError::NotInvocable {
            path: path.clone(),
            expected: ModuleKind::Event,
        })?;

    let event_type = engine
        .registry
        .definition(path)
        .map(|definition| definition.event_type())
        .unwrap_or_else(|| path.clone());
    let meta = EventMeta::new(event_type, rule.reference());
    let trigger = Trigger::new(Arc::downgrade(engine), rule.clone(), meta);

    let settings = engine
        .registry
        .environment()
        .tokens
        .replace(&component.settings(), None, None);

    catch_module_panic(|| module.bind(&settings, trigger))
        .map_err(|e| ComponentError::execution(path, e))
}
