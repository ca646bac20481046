//! Sequences the merge steps and keeps the checkpoint in step with progress.
//!
//! Steps run strictly in `Step::ALL` order. After each attempt the engine
//! refreshes the worktree checkpoint (once a worktree is known); the first
//! failing step stops the run and is reported wrapped with its name. A run
//! that finishes clears the checkpoint.
//!
//! There is no retry loop here. Retries belong to the API clients.

use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::api::{AiProvider, KanbanProvider, RepoProvider, TicketRouter};
use crate::git::WorktreeOps;
use crate::workflow::checkpoint::{Checkpoint, CheckpointError, CheckpointStore};
use crate::workflow::context::MergeWorkflow;
use crate::workflow::options::MergeOptions;
use crate::workflow::preflight::{PreflightEvaluator, PreflightResult};
use crate::workflow::step::{Step, StepOutcome};

/// Errors surfaced by `WorkflowEngine`
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{step} step failed: {source:#}")]
    StepFailed {
        step: Step,
        #[source]
        source: anyhow::Error,
    },

    #[error("no checkpoint found in {}", worktree.display())]
    NoCheckpoint { worktree: PathBuf },

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

impl WorkflowError {
    /// Step that failed, if this is a step failure
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::StepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Runs and resumes merge workflows against injected collaborators
pub struct WorkflowEngine {
    pub(super) repo: Arc<dyn RepoProvider>,
    pub(super) tracker: Option<Arc<dyn KanbanProvider>>,
    pub(super) router: Arc<dyn TicketRouter>,
    pub(super) assistant: Option<Arc<dyn AiProvider>>,
    pub(super) worktrees: Arc<dyn WorktreeOps>,
    pub(super) store: CheckpointStore,
    resume_options: MergeOptions,
    span: Span,
}

impl WorkflowEngine {
    pub fn new(
        repo: Arc<dyn RepoProvider>,
        router: Arc<dyn TicketRouter>,
        worktrees: Arc<dyn WorktreeOps>,
    ) -> Self {
        Self {
            repo,
            tracker: None,
            router,
            assistant: None,
            worktrees,
            store: CheckpointStore::default(),
            resume_options: MergeOptions::default(),
            span: info_span!("merge_workflow"),
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn KanbanProvider>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_assistant(mut self, assistant: Arc<dyn AiProvider>) -> Self {
        self.assistant = Some(assistant);
        self
    }

    pub fn with_store(mut self, store: CheckpointStore) -> Self {
        self.store = store;
        self
    }

    /// Options used by `resume`, since checkpoints do not carry them
    pub fn with_resume_options(mut self, options: MergeOptions) -> Self {
        self.resume_options = options;
        self
    }

    /// Span every run, resume, and preflight is recorded under
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Run every step for a pull request from the start
    pub async fn run(
        &self,
        pr_number: u64,
        options: &MergeOptions,
    ) -> Result<MergeWorkflow, WorkflowError> {
        let workflow = MergeWorkflow::new(pr_number);
        self.drive(workflow, options)
            .instrument(self.span.clone())
            .await
    }

    /// Continue a checkpointed run, skipping steps it already completed
    pub async fn resume(&self, checkpoint: &Checkpoint) -> Result<MergeWorkflow, WorkflowError> {
        let workflow = checkpoint.to_workflow();
        info!(
            pr = workflow.pr_number,
            completed = ?workflow.completed_steps,
            "Resuming merge workflow"
        );
        self.drive(workflow, &self.resume_options)
            .instrument(self.span.clone())
            .await
    }

    /// Load the checkpoint in `worktree` and resume it
    pub async fn resume_from_worktree(
        &self,
        worktree: &Path,
    ) -> Result<MergeWorkflow, WorkflowError> {
        let checkpoint = self
            .store
            .load(worktree)?
            .ok_or_else(|| WorkflowError::NoCheckpoint {
                worktree: worktree.to_path_buf(),
            })?;
        self.resume(&checkpoint).await
    }

    /// Evaluate readiness without running any step
    pub async fn preflight(
        &self,
        pr_number: u64,
        options: &MergeOptions,
    ) -> anyhow::Result<PreflightResult> {
        PreflightEvaluator::new(
            self.repo.as_ref(),
            self.tracker.as_deref(),
            self.router.as_ref(),
        )
        .evaluate(pr_number, options)
        .instrument(self.span.clone())
        .await
    }

    async fn drive(
        &self,
        mut workflow: MergeWorkflow,
        options: &MergeOptions,
    ) -> Result<MergeWorkflow, WorkflowError> {
        let completed: HashSet<Step> = workflow.completed_steps.iter().copied().collect();

        for step in Step::ALL {
            if completed.contains(&step) {
                debug!(%step, "Already completed, skipping");
                continue;
            }

            workflow.current_step = Some(step);
            info!(pr = workflow.pr_number, %step, "Running step");

            match self.execute(step, &mut workflow, options).await {
                Ok(outcome) => {
                    if let StepOutcome::Skipped { reason } = &outcome {
                        info!(%step, %reason, "Step skipped");
                    }
                    workflow.record(step, outcome);
                    if !step.is_last() {
                        self.checkpoint(&mut workflow);
                    }
                }
                Err(source) => {
                    warn!(%step, error = %source, "Step failed");
                    workflow.record(
                        step,
                        StepOutcome::Failed {
                            error: format!("{:#}", source),
                        },
                    );
                    self.checkpoint(&mut workflow);
                    return Err(WorkflowError::StepFailed { step, source });
                }
            }
        }

        workflow.current_step = None;
        if let Some(worktree) = &workflow.worktree_path {
            if let Err(e) = self.store.clear(worktree) {
                warn!(error = %e, "Failed to clear checkpoint after successful run");
            }
        }

        info!(pr = workflow.pr_number, "Merge workflow finished");
        Ok(workflow)
    }

    /// Best-effort checkpoint refresh. No-op until a worktree is known.
    fn checkpoint(&self, workflow: &mut MergeWorkflow) {
        let now = Utc::now();
        let Some(checkpoint) = Checkpoint::from_workflow(workflow, now) else {
            return;
        };

        match self.store.save(&checkpoint) {
            Ok(_) => {
                workflow.checkpoint_created_at.get_or_insert(checkpoint.created_at);
            }
            Err(e) => warn!(error = %e, "Failed to save checkpoint"),
        }
    }
}
