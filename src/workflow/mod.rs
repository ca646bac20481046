//! Resumable, checkpointed merge workflow
//!
//! A run walks `Preflight -> Gather -> Debrief -> Merge -> Closeout` for one
//! pull request. Progress is checkpointed into the PR's worktree so an
//! interrupted run can be resumed from the first step it did not complete.

pub mod branch;
pub mod checkpoint;
pub mod context;
pub mod debrief;
pub mod engine;
pub mod options;
pub mod phase;
pub mod preflight;
pub mod step;
mod steps;

pub use branch::{extract_ticket_from_branch, looks_like_ticket};
pub use checkpoint::{Checkpoint, CheckpointError, CheckpointStore};
pub use context::{MergeWorkflow, TicketSnapshot, WorkflowContext};
pub use debrief::DebriefPrompt;
pub use engine::{WorkflowEngine, WorkflowError};
pub use options::{MergeMethod, MergeOptions};
pub use phase::{map_status_to_phase, target_status, WorkflowPhase};
pub use preflight::{PreflightEvaluator, PreflightResult};
pub use step::{Step, StepOutcome, StepRecord};
