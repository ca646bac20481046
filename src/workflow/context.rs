//! Run state accumulated across steps

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::api::{CommitInfo, ExternalIssue, PullRequest, TimelineEntry};
use crate::workflow::phase::{map_status_to_phase, WorkflowPhase};
use crate::workflow::step::{Step, StepOutcome, StepRecord};

/// Ticket as seen by the tracker during Gather
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketSnapshot {
    pub key: String,
    pub summary: String,
    pub status: String,
    pub phase: WorkflowPhase,
    #[serde(default)]
    pub url: String,
}

impl From<ExternalIssue> for TicketSnapshot {
    fn from(issue: ExternalIssue) -> Self {
        Self {
            phase: map_status_to_phase(&issue.status),
            key: issue.key,
            summary: issue.summary,
            status: issue.status,
            url: issue.url,
        }
    }
}

/// Facts gathered for the merge. Filled by Gather and Debrief, read by Merge
/// and Closeout. Every field defaults so older checkpoints still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowContext {
    #[serde(default)]
    pub pr: Option<PullRequest>,
    #[serde(default)]
    pub ticket: Option<TicketSnapshot>,
    #[serde(default)]
    pub commits: Vec<CommitInfo>,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
    #[serde(default)]
    pub source_branch: String,
    #[serde(default)]
    pub target_branch: String,
    #[serde(default)]
    pub notes: Vec<String>,
    /// SHA of the merge commit once Merge has run
    #[serde(default)]
    pub merge_sha: Option<String>,
}

impl WorkflowContext {
    pub fn add_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

/// One merge run, either fresh or rehydrated from a checkpoint
#[derive(Debug, Clone)]
pub struct MergeWorkflow {
    pub pr_number: u64,
    pub ticket_id: Option<String>,
    /// Known once Gather resolves it; keys the checkpoint file
    pub worktree_path: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub completed_steps: Vec<Step>,
    pub current_step: Option<Step>,
    pub context: WorkflowContext,
    /// Step attempts during this process's run; not persisted
    pub history: Vec<StepRecord>,
    /// Creation time of this run's checkpoint, once one has been written
    pub checkpoint_created_at: Option<DateTime<Utc>>,
}

impl MergeWorkflow {
    pub fn new(pr_number: u64) -> Self {
        Self {
            pr_number,
            ticket_id: None,
            worktree_path: None,
            started_at: Utc::now(),
            completed_steps: Vec::new(),
            current_step: None,
            context: WorkflowContext::default(),
            history: Vec::new(),
            checkpoint_created_at: None,
        }
    }

    pub fn is_completed(&self, step: Step) -> bool {
        self.completed_steps.contains(&step)
    }

    /// Record a step attempt. Completed outcomes are appended to
    /// `completed_steps` once.
    pub fn record(&mut self, step: Step, outcome: StepOutcome) {
        if outcome.is_completed() && !self.is_completed(step) {
            self.completed_steps.push(step);
        }
        self.history.push(StepRecord { step, outcome });
    }

    /// Outcome of the latest attempt of `step` in this run
    pub fn outcome(&self, step: Step) -> Option<&StepOutcome> {
        self.history
            .iter()
            .rev()
            .find(|r| r.step == step)
            .map(|r| &r.outcome)
    }

    /// Steps not yet completed, in execution order
    pub fn remaining_steps(&self) -> Vec<Step> {
        Step::ALL
            .into_iter()
            .filter(|s| !self.is_completed(*s))
            .collect()
    }

    pub fn is_finished(&self) -> bool {
        self.remaining_steps().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tracks_completion_once() {
        let mut wf = MergeWorkflow::new(12);
        wf.record(Step::Preflight, StepOutcome::Executed);
        wf.record(Step::Preflight, StepOutcome::Executed);
        wf.record(Step::Gather, StepOutcome::skipped("nothing"));
        wf.record(
            Step::Debrief,
            StepOutcome::Failed {
                error: "timeout".to_string(),
            },
        );

        assert_eq!(wf.completed_steps, vec![Step::Preflight, Step::Gather]);
        assert_eq!(wf.history.len(), 4);
        assert!(matches!(
            wf.outcome(Step::Debrief),
            Some(StepOutcome::Failed { .. })
        ));
        assert_eq!(
            wf.remaining_steps(),
            vec![Step::Debrief, Step::Merge, Step::Closeout]
        );
        assert!(!wf.is_finished());
    }

    #[test]
    fn test_ticket_snapshot_maps_phase() {
        let snapshot = TicketSnapshot::from(ExternalIssue {
            key: "PROJ-1".to_string(),
            summary: "Add login".to_string(),
            status: "Code Review".to_string(),
            issue_type: None,
            assignee: None,
            url: String::new(),
        });
        assert_eq!(snapshot.phase, WorkflowPhase::InReview);
        assert_eq!(snapshot.status, "Code Review");
    }

    #[test]
    fn test_context_loads_from_empty_object() {
        let ctx: WorkflowContext = serde_json::from_str("{}").unwrap();
        assert_eq!(ctx, WorkflowContext::default());
    }
}
