//! Workflow steps and their outcomes

use serde::{Deserialize, Serialize};
use std::fmt;

/// One stage of the merge workflow, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Preflight,
    Gather,
    Debrief,
    Merge,
    Closeout,
}

impl Step {
    /// Every step in the fixed execution order
    pub const ALL: [Step; 5] = [
        Step::Preflight,
        Step::Gather,
        Step::Debrief,
        Step::Merge,
        Step::Closeout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Preflight => "preflight",
            Step::Gather => "gather",
            Step::Debrief => "debrief",
            Step::Merge => "merge",
            Step::Closeout => "closeout",
        }
    }

    /// Whether this is the last step of the workflow
    pub fn is_last(&self) -> bool {
        *self == Step::Closeout
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened when a step was attempted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step did its work
    Executed,
    /// The step had nothing to do; it still counts as completed
    Skipped { reason: String },
    /// The step failed and the workflow stopped
    Failed { error: String },
}

impl StepOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        StepOutcome::Skipped {
            reason: reason.into(),
        }
    }

    /// Executed and skipped steps both count as completed
    pub fn is_completed(&self) -> bool {
        !matches!(self, StepOutcome::Failed { .. })
    }
}

/// Outcome of one step attempt within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: Step,
    pub outcome: StepOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_total_and_fixed() {
        let mut sorted = Step::ALL;
        sorted.sort();
        assert_eq!(sorted, Step::ALL);
        assert!(Step::Preflight < Step::Closeout);
        assert!(Step::Closeout.is_last());
        assert!(!Step::Merge.is_last());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Step::Debrief).unwrap(), "\"debrief\"");
        let step: Step = serde_json::from_str("\"closeout\"").unwrap();
        assert_eq!(step, Step::Closeout);
        assert_eq!(Step::Gather.to_string(), "gather");
    }

    #[test]
    fn test_outcome_completion() {
        assert!(StepOutcome::Executed.is_completed());
        assert!(StepOutcome::skipped("AI disabled").is_completed());
        assert!(!StepOutcome::Failed {
            error: "boom".to_string()
        }
        .is_completed());
    }
}
