//! Handlebars prompt for the AI debrief

use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde_json::{json, Value};

use crate::workflow::context::MergeWorkflow;

/// Most recent timeline entries included in the prompt
const MAX_TIMELINE_ENTRIES: usize = 20;

const DEBRIEF_TEMPLATE: &str = r"You are reviewing a pull request that is about to be merged.

PR #{{pr.number}}: {{pr.title}}
Branch: {{source_branch}} -> {{target_branch}}
{{#if pr.author}}Author: {{pr.author}}
{{/if}}{{#if ticket}}Ticket: {{ticket.key}} ({{ticket.status}}) {{ticket.summary}}
{{/if}}
Commits:
{{#each commits}}- {{short_sha}} {{subject}}
{{/each}}
{{#if timeline}}Discussion:
{{#each timeline}}- [{{kind}}] {{#if author}}{{author}}: {{/if}}{{body}}
{{/each}}{{/if}}
Write a short debrief for the merge record: what the change does, notable
review feedback, and anything to follow up on after merging. Plain text, at
most ten lines.
";

/// Renders the debrief prompt from the gathered context
pub struct DebriefPrompt {
    handlebars: Handlebars<'static>,
}

impl Default for DebriefPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl DebriefPrompt {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        // Prompts are plain text
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(false);
        Self { handlebars }
    }

    /// Template data for a workflow
    pub fn build_context(&self, workflow: &MergeWorkflow) -> Value {
        let ctx = &workflow.context;

        let commits: Vec<Value> = ctx
            .commits
            .iter()
            .map(|c| {
                json!({
                    "short_sha": c.sha.chars().take(7).collect::<String>(),
                    "subject": c.message.lines().next().unwrap_or_default(),
                })
            })
            .collect();

        let skip = ctx.timeline.len().saturating_sub(MAX_TIMELINE_ENTRIES);
        let timeline: Vec<Value> = ctx
            .timeline
            .iter()
            .skip(skip)
            .map(|e| {
                json!({
                    "kind": e.kind,
                    "author": e.author,
                    "body": e.body.trim(),
                })
            })
            .collect();

        json!({
            "pr": ctx.pr.as_ref().map_or_else(
                || json!({ "number": workflow.pr_number }),
                |pr| json!({ "number": pr.number, "title": pr.title, "author": pr.author }),
            ),
            "ticket": ctx.ticket,
            "source_branch": ctx.source_branch,
            "target_branch": ctx.target_branch,
            "commits": commits,
            "timeline": timeline,
        })
    }

    pub fn render(&self, workflow: &MergeWorkflow) -> Result<String> {
        self.handlebars
            .render_template(DEBRIEF_TEMPLATE, &self.build_context(workflow))
            .context("Failed to render debrief prompt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CommitInfo, PullRequest, TimelineEntry};
    use chrono::Utc;

    fn workflow() -> MergeWorkflow {
        let mut wf = MergeWorkflow::new(5);
        wf.context.source_branch = "feature/PROJ-5".to_string();
        wf.context.target_branch = "main".to_string();
        wf.context.pr = Some(PullRequest {
            number: 5,
            title: "Add <widgets> & things".to_string(),
            state: "open".to_string(),
            source_branch: "feature/PROJ-5".to_string(),
            target_branch: "main".to_string(),
            approved: true,
            checks_passing: true,
            merged: false,
            url: String::new(),
            author: Some("ann".to_string()),
            head_sha: String::new(),
        });
        wf.context.commits = vec![CommitInfo {
            sha: "0123456789abcdef".to_string(),
            message: "Add widgets\n\nLonger body".to_string(),
            author: None,
        }];
        wf.context.timeline = vec![TimelineEntry {
            kind: "comment".to_string(),
            author: Some("bob".to_string()),
            body: "Looks good\n".to_string(),
            created_at: Utc::now(),
        }];
        wf
    }

    #[test]
    fn test_render_includes_gathered_facts() {
        let prompt = DebriefPrompt::new().render(&workflow()).unwrap();
        assert!(prompt.contains("PR #5: Add <widgets> & things"));
        assert!(prompt.contains("feature/PROJ-5 -> main"));
        assert!(prompt.contains("Author: ann"));
        assert!(prompt.contains("- 0123456 Add widgets"));
        assert!(!prompt.contains("Longer body"));
        assert!(prompt.contains("[comment] bob: Looks good"));
    }

    #[test]
    fn test_render_without_pr_snapshot() {
        let prompt = DebriefPrompt::new().render(&MergeWorkflow::new(9)).unwrap();
        assert!(prompt.contains("PR #9"));
        assert!(!prompt.contains("Discussion:"));
    }

    #[test]
    fn test_timeline_truncated_to_latest_entries() {
        let mut wf = workflow();
        wf.context.timeline = (0..30)
            .map(|i| TimelineEntry {
                kind: "comment".to_string(),
                author: None,
                body: format!("note-{i:02}"),
                created_at: Utc::now(),
            })
            .collect();

        let data = DebriefPrompt::new().build_context(&wf);
        let timeline = data["timeline"].as_array().unwrap();
        assert_eq!(timeline.len(), MAX_TIMELINE_ENTRIES);
        assert_eq!(timeline[0]["body"], "note-10");
    }
}
