use serde::Serialize;
use uuid::Uuid;

/// Result of running a rule's condition list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConditionOutcome {
    AllPassed,
    /// A condition evaluated cleanly but did not pass
    NotMet { module_path: String },
    /// A condition could not be resolved or failed while running
    Errored { module_path: String },
}

impl ConditionOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, ConditionOutcome::AllPassed)
    }
}

/// Counts of what happened during action execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionSummary {
    pub succeeded: usize,
    /// Paths of actions that failed, in order
    pub failed: Vec<String>,
}

/// Record of one firing, returned to the trigger caller.
#[derive(Debug, Clone, Serialize)]
pub struct FiringReport {
    pub firing_id: Uuid,
    pub rule_id: String,
    pub conditions: ConditionOutcome,
    /// `None` when conditions did not pass or actions were suppressed
    pub actions: Option<ActionSummary>,
    pub suppressed: bool,
}

impl FiringReport {
    /// Whether the rule fired, i.e. all conditions passed.
    pub fn fired(&self) -> bool {
        self.conditions.passed()
    }
}

/// Result of binding every event component of the loaded rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BindReport {
    pub bound: usize,
    /// (rule id, module path) of bindings that failed
    pub failed: Vec<(String, String)>,
}
