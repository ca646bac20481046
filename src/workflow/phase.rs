//! Normalizes tracker status names into four workflow phases.
//!
//! Trackers name their columns differently ("Code Review", "In QA",
//! "Resolved"...). The merge gate only cares which bucket a ticket is in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical bucket for a ticket status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    #[default]
    NotStarted,
    InProgress,
    InReview,
    Done,
}

impl WorkflowPhase {
    pub const ALL: [WorkflowPhase; 4] = [
        WorkflowPhase::NotStarted,
        WorkflowPhase::InProgress,
        WorkflowPhase::InReview,
        WorkflowPhase::Done,
    ];
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(target_status(*self))
    }
}

/// Known status names (lowercase) drawn from Jira, Linear, and similar boards
const STATUS_TABLE: &[(&str, WorkflowPhase)] = &[
    ("backlog", WorkflowPhase::NotStarted),
    ("to do", WorkflowPhase::NotStarted),
    ("todo", WorkflowPhase::NotStarted),
    ("open", WorkflowPhase::NotStarted),
    ("new", WorkflowPhase::NotStarted),
    ("triage", WorkflowPhase::NotStarted),
    ("unstarted", WorkflowPhase::NotStarted),
    ("ready", WorkflowPhase::NotStarted),
    ("selected for development", WorkflowPhase::NotStarted),
    ("in progress", WorkflowPhase::InProgress),
    ("in development", WorkflowPhase::InProgress),
    ("doing", WorkflowPhase::InProgress),
    ("started", WorkflowPhase::InProgress),
    ("active", WorkflowPhase::InProgress),
    ("implementing", WorkflowPhase::InProgress),
    ("in review", WorkflowPhase::InReview),
    ("code review", WorkflowPhase::InReview),
    ("review", WorkflowPhase::InReview),
    ("peer review", WorkflowPhase::InReview),
    ("ready for review", WorkflowPhase::InReview),
    ("in qa", WorkflowPhase::InReview),
    ("qa", WorkflowPhase::InReview),
    ("testing", WorkflowPhase::InReview),
    ("verification", WorkflowPhase::InReview),
    ("done", WorkflowPhase::Done),
    ("closed", WorkflowPhase::Done),
    ("resolved", WorkflowPhase::Done),
    ("complete", WorkflowPhase::Done),
    ("completed", WorkflowPhase::Done),
    ("merged", WorkflowPhase::Done),
    ("released", WorkflowPhase::Done),
    ("shipped", WorkflowPhase::Done),
];

/// Map a tracker status name to its phase.
///
/// Exact table match first, then keyword fallback. Anything unrecognized,
/// including an empty string, is `NotStarted` so the review gate stays closed.
pub fn map_status_to_phase(status: &str) -> WorkflowPhase {
    let normalized = status.trim().to_lowercase();

    if let Some((_, phase)) = STATUS_TABLE.iter().find(|(name, _)| *name == normalized) {
        return *phase;
    }

    let contains_any = |needles: &[&str]| needles.iter().any(|n| normalized.contains(n));

    if contains_any(&["progress", "dev"]) {
        WorkflowPhase::InProgress
    } else if contains_any(&["review", "qa", "test"]) {
        WorkflowPhase::InReview
    } else if contains_any(&["done", "close", "resolv"]) {
        WorkflowPhase::Done
    } else {
        WorkflowPhase::NotStarted
    }
}

/// Canonical status name to transition a ticket into for `phase`
pub fn target_status(phase: WorkflowPhase) -> &'static str {
    match phase {
        WorkflowPhase::NotStarted => "To Do",
        WorkflowPhase::InProgress => "In Progress",
        WorkflowPhase::InReview => "In Review",
        WorkflowPhase::Done => "Done",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_statuses() {
        assert_eq!(map_status_to_phase("In Progress"), WorkflowPhase::InProgress);
        assert_eq!(map_status_to_phase("Code Review"), WorkflowPhase::InReview);
        assert_eq!(map_status_to_phase("Done"), WorkflowPhase::Done);
        assert_eq!(map_status_to_phase("Backlog"), WorkflowPhase::NotStarted);
        assert_eq!(map_status_to_phase("  RESOLVED "), WorkflowPhase::Done);
    }

    #[test]
    fn test_exact_match_beats_keywords() {
        // Contains "dev" but the table says it has not started
        assert_eq!(
            map_status_to_phase("Selected for Development"),
            WorkflowPhase::NotStarted
        );
    }

    #[test]
    fn test_keyword_fallback() {
        assert_eq!(
            map_status_to_phase("Architecture Review"),
            WorkflowPhase::InReview
        );
        assert_eq!(map_status_to_phase("Dev Complete"), WorkflowPhase::InProgress);
        assert_eq!(map_status_to_phase("Awaiting QA"), WorkflowPhase::InReview);
        assert_eq!(map_status_to_phase("Closed - Won't Fix"), WorkflowPhase::Done);
    }

    #[test]
    fn test_unknown_defaults_to_not_started() {
        assert_eq!(map_status_to_phase("Frobnicating"), WorkflowPhase::NotStarted);
        assert_eq!(map_status_to_phase(""), WorkflowPhase::NotStarted);
    }

    #[test]
    fn test_target_status_is_always_canonical() {
        let canonical: Vec<&str> = WorkflowPhase::ALL.iter().map(|p| target_status(*p)).collect();
        for status in ["In Progress", "Frobnicating", "Architecture Review", "", "closed"] {
            let target = target_status(map_status_to_phase(status));
            assert!(canonical.contains(&target), "{target} not canonical");
        }
        assert_eq!(target_status(WorkflowPhase::InProgress), "In Progress");
        assert_eq!(target_status(WorkflowPhase::NotStarted), "To Do");
    }

    #[test]
    fn test_table_round_trips_through_target_status() {
        for phase in WorkflowPhase::ALL {
            assert_eq!(map_status_to_phase(target_status(phase)), phase);
        }
    }
}
