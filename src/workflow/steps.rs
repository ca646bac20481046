//! Bodies of the five merge steps.
//!
//! Each step returns `Executed` or `Skipped`; both count as completed and
//! are never run again on resume. Steps must be safe to re-enter after a
//! crash, so Merge checks whether the PR is already merged before merging.

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::api::{KanbanProvider, TicketBackend};
use crate::workflow::branch::extract_ticket_from_branch;
use crate::workflow::context::{MergeWorkflow, TicketSnapshot};
use crate::workflow::debrief::DebriefPrompt;
use crate::workflow::engine::WorkflowEngine;
use crate::workflow::options::MergeOptions;
use crate::workflow::phase::{target_status, WorkflowPhase};
use crate::workflow::step::{Step, StepOutcome};

impl WorkflowEngine {
    pub(super) async fn execute(
        &self,
        step: Step,
        workflow: &mut MergeWorkflow,
        options: &MergeOptions,
    ) -> Result<StepOutcome> {
        match step {
            Step::Preflight => self.run_preflight(workflow, options).await,
            Step::Gather => self.run_gather(workflow, options).await,
            Step::Debrief => self.run_debrief(workflow, options).await,
            Step::Merge => self.run_merge(workflow, options).await,
            Step::Closeout => self.run_closeout(workflow, options).await,
        }
    }

    /// Tracker responsible for `ticket`, when the gate applies to it
    fn tracker_for(&self, ticket: &str, options: &MergeOptions) -> Option<&dyn KanbanProvider> {
        if options.skip_tracker {
            return None;
        }
        let tracker = self.tracker.as_deref().filter(|t| t.is_available())?;
        (self.router.route(ticket) == TicketBackend::Tracker).then_some(tracker)
    }

    async fn run_preflight(
        &self,
        workflow: &mut MergeWorkflow,
        options: &MergeOptions,
    ) -> Result<StepOutcome> {
        let result = self.preflight(workflow.pr_number, options).await?;

        for warning in &result.warnings {
            warn!(pr = workflow.pr_number, "{}", warning);
        }

        if !result.is_ready() {
            let reason = result
                .failure_reason
                .clone()
                .unwrap_or_else(|| format!("PR #{} is not ready to merge", workflow.pr_number));
            bail!(reason);
        }

        if result.ticket_id.is_some() {
            workflow.ticket_id = result.ticket_id;
        }
        Ok(StepOutcome::Executed)
    }

    async fn run_gather(
        &self,
        workflow: &mut MergeWorkflow,
        options: &MergeOptions,
    ) -> Result<StepOutcome> {
        let number = workflow.pr_number;
        let pr = self
            .repo
            .get_pr(number)
            .await
            .with_context(|| format!("Failed to fetch PR #{}", number))?;
        let commits = self
            .repo
            .list_commits(number)
            .await
            .with_context(|| format!("Failed to list commits for PR #{}", number))?;
        let timeline = self
            .repo
            .list_timeline(number)
            .await
            .with_context(|| format!("Failed to fetch timeline for PR #{}", number))?;

        let ctx = &mut workflow.context;
        ctx.source_branch = pr.source_branch.clone();
        ctx.target_branch = pr.target_branch.clone();
        ctx.commits = commits;
        ctx.timeline = timeline;
        ctx.pr = Some(pr);
        debug!(
            commits = ctx.commits.len(),
            timeline = ctx.timeline.len(),
            "Gathered PR context"
        );

        if workflow.ticket_id.is_none() {
            workflow.ticket_id = extract_ticket_from_branch(&workflow.context.source_branch);
        }

        if let Some(ticket) = workflow.ticket_id.clone() {
            if let Some(tracker) = self.tracker_for(&ticket, options) {
                match tracker.fetch_issue(&ticket).await {
                    Ok(issue) => workflow.context.ticket = Some(TicketSnapshot::from(issue)),
                    Err(e) => {
                        warn!(%ticket, error = %e, "Failed to fetch ticket details");
                        workflow
                            .context
                            .add_note(format!("ticket {} unavailable: {}", ticket, e));
                    }
                }
            }
        }

        if let Some(path) = &options.worktree_path {
            workflow.worktree_path = Some(path.clone());
        } else if workflow.worktree_path.is_none() {
            let branch = workflow.context.source_branch.clone();
            match self.worktrees.find_for_branch(&branch).await {
                Ok(Some(path)) => workflow.worktree_path = Some(path),
                Ok(None) => warn!(
                    %branch,
                    "No worktree checked out on source branch; progress will not be checkpointed"
                ),
                Err(e) => warn!(%branch, error = %e, "Worktree lookup failed"),
            }
        }

        Ok(StepOutcome::Executed)
    }

    async fn run_debrief(
        &self,
        workflow: &mut MergeWorkflow,
        options: &MergeOptions,
    ) -> Result<StepOutcome> {
        if options.no_ai {
            return Ok(StepOutcome::skipped("AI disabled"));
        }
        let Some(assistant) = self.assistant.as_deref().filter(|a| a.is_configured()) else {
            return Ok(StepOutcome::skipped("no AI assistant configured"));
        };

        let prompt = DebriefPrompt::new().render(workflow)?;
        let summary = assistant
            .complete(&prompt)
            .await
            .with_context(|| format!("{} debrief request failed", assistant.name()))?;

        workflow
            .context
            .add_note(format!("debrief: {}", summary.trim()));
        Ok(StepOutcome::Executed)
    }

    async fn run_merge(
        &self,
        workflow: &mut MergeWorkflow,
        options: &MergeOptions,
    ) -> Result<StepOutcome> {
        let number = workflow.pr_number;
        let pr = self
            .repo
            .get_pr(number)
            .await
            .with_context(|| format!("Failed to fetch PR #{}", number))?;

        if pr.merged || pr.state.eq_ignore_ascii_case("merged") {
            workflow.context.pr = Some(pr);
            return Ok(StepOutcome::skipped("already merged"));
        }

        let result = self
            .repo
            .merge_pr(number, options.merge_method)
            .await
            .with_context(|| format!("Failed to merge PR #{}", number))?;
        if !result.merged {
            bail!("PR #{} was not merged: {}", number, result.message);
        }

        info!(pr = number, sha = %result.sha, method = %options.merge_method, "Merged PR");
        workflow.context.merge_sha = Some(result.sha);
        Ok(StepOutcome::Executed)
    }

    async fn run_closeout(
        &self,
        workflow: &mut MergeWorkflow,
        options: &MergeOptions,
    ) -> Result<StepOutcome> {
        let mut actions = 0;

        if let Some(ticket) = workflow.ticket_id.clone() {
            if let Some(tracker) = self.tracker_for(&ticket, options) {
                let already_done = workflow
                    .context
                    .ticket
                    .as_ref()
                    .is_some_and(|t| t.key == ticket && t.phase == WorkflowPhase::Done);
                if !already_done {
                    let status = target_status(WorkflowPhase::Done);
                    tracker
                        .update_issue_status(&ticket, status)
                        .await
                        .with_context(|| format!("Failed to move {} to {}", ticket, status))?;
                    info!(%ticket, %status, "Transitioned ticket");
                    // Recorded so a resumed Closeout does not transition twice
                    let snapshot = workflow.context.ticket.get_or_insert_with(|| TicketSnapshot {
                        key: ticket.clone(),
                        summary: String::new(),
                        status: String::new(),
                        phase: WorkflowPhase::Done,
                        url: String::new(),
                    });
                    snapshot.key.clone_from(&ticket);
                    snapshot.status = status.to_string();
                    snapshot.phase = WorkflowPhase::Done;
                    actions += 1;
                }
            }
        }

        if options.cleanup_worktree {
            if let Some(path) = workflow.worktree_path.as_deref().filter(|p| p.exists()) {
                self.worktrees.remove(path).await?;
                actions += 1;
            }
        }

        if options.delete_branch && !workflow.context.source_branch.is_empty() {
            self.worktrees
                .delete_branch(&workflow.context.source_branch)
                .await?;
            actions += 1;
        }

        if actions == 0 {
            return Ok(StepOutcome::skipped("nothing to clean up"));
        }
        Ok(StepOutcome::Executed)
    }
}
