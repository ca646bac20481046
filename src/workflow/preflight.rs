//! Readiness evaluation before any side-effecting step.
//!
//! Business-rule failures (closed, unapproved, red checks, ticket not in
//! review) are data on the result, never errors. Only one failure reason is
//! reported, picked by fixed priority.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::api::{KanbanProvider, RepoProvider, TicketBackend, TicketRouter};
use crate::workflow::branch::extract_ticket_from_branch;
use crate::workflow::options::MergeOptions;
use crate::workflow::phase::{map_status_to_phase, WorkflowPhase};

/// Literal open states accepted from hosts. Deliberately not a
/// case-insensitive comparison.
const OPEN_STATES: [&str; 2] = ["open", "OPEN"];

/// Readiness verdict for one pull request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreflightResult {
    pub pr_number: u64,
    pub pr_exists: bool,
    pub pr_open: bool,
    pub pr_approved: bool,
    pub approval_skipped: bool,
    pub checks_passing: bool,
    /// Ticket id recovered from the source branch
    pub ticket_id: Option<String>,
    pub ticket_status: Option<String>,
    pub ticket_phase: Option<WorkflowPhase>,
    pub ticket_in_review: bool,
    /// The tracker review gate does not apply to this run
    pub tracker_skipped: bool,
    /// First failing condition, if any
    pub failure_reason: Option<String>,
    pub warnings: Vec<String>,
}

impl PreflightResult {
    fn new(pr_number: u64) -> Self {
        Self {
            pr_number,
            ..Self::default()
        }
    }

    /// Set the failure reason unless an earlier check already did
    fn fail(&mut self, reason: String) {
        if self.failure_reason.is_none() {
            self.failure_reason = Some(reason);
        }
    }

    /// Ready when every check passes in priority order, plus the tracker gate
    pub fn is_ready(&self) -> bool {
        self.pr_exists
            && self.pr_open
            && (self.pr_approved || self.approval_skipped)
            && self.checks_passing
            && (self.tracker_skipped || self.ticket_in_review)
    }
}

/// Computes a `PreflightResult` from the repo host and issue tracker
pub struct PreflightEvaluator<'a> {
    repo: &'a dyn RepoProvider,
    tracker: Option<&'a dyn KanbanProvider>,
    router: &'a dyn TicketRouter,
}

impl<'a> PreflightEvaluator<'a> {
    pub fn new(
        repo: &'a dyn RepoProvider,
        tracker: Option<&'a dyn KanbanProvider>,
        router: &'a dyn TicketRouter,
    ) -> Self {
        Self {
            repo,
            tracker,
            router,
        }
    }

    /// Evaluate readiness. A failed PR fetch is reported in the result.
    #[instrument(skip(self, options))]
    pub async fn evaluate(&self, pr_number: u64, options: &MergeOptions) -> Result<PreflightResult> {
        let mut result = PreflightResult::new(pr_number);

        let pr = match self.repo.get_pr(pr_number).await {
            Ok(pr) => pr,
            Err(e) => {
                result.fail(format!("failed to fetch PR #{}: {}", pr_number, e));
                return Ok(result);
            }
        };

        result.pr_exists = true;
        result.pr_open = OPEN_STATES.contains(&pr.state.as_str());
        result.pr_approved = pr.approved;
        result.approval_skipped = options.skip_approval;
        result.checks_passing = pr.checks_passing;

        if !result.pr_open {
            result.fail(format!("PR #{} is not open (state: {})", pr_number, pr.state));
        } else if !result.pr_approved && !result.approval_skipped {
            result.fail(format!("PR #{} is not approved", pr_number));
        } else if !result.checks_passing {
            result.fail(format!("PR #{} has failing checks", pr_number));
        }

        let tracker = match self.tracker {
            Some(tracker) if !options.skip_tracker && tracker.is_available() => tracker,
            _ => {
                result.tracker_skipped = true;
                return Ok(result);
            }
        };

        let Some(ticket_id) = extract_ticket_from_branch(&pr.source_branch) else {
            result.tracker_skipped = true;
            result.warnings.push(format!(
                "no ticket id found in branch '{}'; skipping ticket review check",
                pr.source_branch
            ));
            return Ok(result);
        };
        result.ticket_id = Some(ticket_id.clone());

        match self.router.route(&ticket_id) {
            TicketBackend::Tracker => {}
            TicketBackend::Alternate => {
                debug!(%ticket_id, "Ticket belongs to alternate backend; review gate not applied");
                result.tracker_skipped = true;
                return Ok(result);
            }
            TicketBackend::Unknown => {
                result.tracker_skipped = true;
                result.warnings.push(format!(
                    "no tracker claims ticket {}; skipping ticket review check",
                    ticket_id
                ));
                return Ok(result);
            }
        }

        match tracker.fetch_issue(&ticket_id).await {
            Ok(issue) => {
                let phase = map_status_to_phase(&issue.status);
                result.ticket_in_review = phase == WorkflowPhase::InReview;
                result.ticket_phase = Some(phase);
                if !result.ticket_in_review {
                    result.fail(format!(
                        "ticket {} is not in review (status: {})",
                        ticket_id, issue.status
                    ));
                }
                result.ticket_status = Some(issue.status);
            }
            Err(e) => {
                warn!(%ticket_id, error = %e, "Failed to fetch ticket status");
                result.fail(format!("failed to fetch ticket {}: {}", ticket_id, e));
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> PreflightResult {
        PreflightResult {
            pr_number: 1,
            pr_exists: true,
            pr_open: true,
            pr_approved: true,
            checks_passing: true,
            tracker_skipped: true,
            ..PreflightResult::default()
        }
    }

    #[test]
    fn test_is_ready_all_green() {
        assert!(ready().is_ready());
    }

    #[test]
    fn test_approval_skip_substitutes_for_approval() {
        let mut result = ready();
        result.pr_approved = false;
        assert!(!result.is_ready());
        result.approval_skipped = true;
        assert!(result.is_ready());
    }

    #[test]
    fn test_tracker_gate() {
        let mut result = ready();
        result.tracker_skipped = false;
        assert!(!result.is_ready());
        result.ticket_in_review = true;
        assert!(result.is_ready());
    }

    #[test]
    fn test_first_reason_wins() {
        let mut result = PreflightResult::new(3);
        result.fail("not approved".to_string());
        result.fail("checks failing".to_string());
        assert_eq!(result.failure_reason.as_deref(), Some("not approved"));
    }

    #[test]
    fn test_missing_pr_is_not_ready() {
        let mut result = ready();
        result.pr_exists = false;
        assert!(!result.is_ready());
    }
}
