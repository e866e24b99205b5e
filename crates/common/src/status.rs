//! Per-step status of a workflow.

use serde::{Deserialize, Serialize};

/// The status of one step of a workflow.
///
/// State transitions:
/// ```text
/// Registered ──┬──► Successful
///              └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StepStatus {
    /// The step has been accepted but not yet executed.
    #[default]
    Registered,

    /// The step was applied by its supplier (terminal state).
    Successful,

    /// The step could not be applied (terminal state).
    Failed,
}

impl StepStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Successful | StepStatus::Failed)
    }

    /// Returns true if a step in this state may move to `next`.
    pub fn can_transition_to(&self, next: StepStatus) -> bool {
        matches!(self, StepStatus::Registered) && next.is_terminal()
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Registered => "Registered",
            StepStatus::Successful => "Successful",
            StepStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
