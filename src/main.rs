use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info_span, warn};

use mergeflow::api::providers::repo::repo_from_remote_url;
use mergeflow::api::{AnthropicProvider, GitHubProvider, JiraProvider, PrefixRouter};
use mergeflow::config::Config;
use mergeflow::git::{GitCli, GitWorktrees};
use mergeflow::logging;
use mergeflow::workflow::{
    CheckpointStore, MergeMethod, MergeOptions, MergeWorkflow, PreflightResult, StepOutcome,
    WorkflowEngine, WorkflowError,
};

#[derive(Parser)]
#[command(name = "mergeflow")]
#[command(about = "Resumable, checkpointed pull request merges")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate, gather, debrief, merge, and close out a pull request
    Merge {
        /// Pull request number
        pr: u64,

        #[command(flatten)]
        gates: GateArgs,

        /// Skip the AI debrief
        #[arg(long)]
        no_ai: bool,

        /// Merge method (merge, squash, rebase)
        #[arg(long)]
        method: Option<MergeMethod>,

        /// Keep the local source branch
        #[arg(long)]
        keep_branch: bool,

        /// Keep the worktree
        #[arg(long)]
        keep_worktree: bool,

        /// Worktree to checkpoint into instead of the one on the source branch
        #[arg(long)]
        worktree: Option<PathBuf>,
    },

    /// Resume an interrupted merge from its checkpoint
    Resume {
        /// Worktree holding the checkpoint (default: current worktree)
        #[arg(long)]
        worktree: Option<PathBuf>,
    },

    /// Check whether a pull request is ready to merge
    Preflight {
        /// Pull request number
        pr: u64,

        #[command(flatten)]
        gates: GateArgs,
    },

    /// Show the checkpointed progress of a merge
    Status {
        /// Worktree holding the checkpoint (default: current worktree)
        #[arg(long)]
        worktree: Option<PathBuf>,
    },
}

#[derive(Args)]
struct GateArgs {
    /// Treat the pull request as approved
    #[arg(long)]
    skip_approval: bool,

    /// Ignore the issue tracker review gate
    #[arg(long)]
    skip_tracker: bool,
}

impl GateArgs {
    fn apply(&self, options: &mut MergeOptions) {
        options.skip_approval |= self.skip_approval;
        options.skip_tracker |= self.skip_tracker;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;
    let _logging_handle = logging::init_logging(&config, cli.debug)?;

    match cli.command {
        Commands::Merge {
            pr,
            gates,
            no_ai,
            method,
            keep_branch,
            keep_worktree,
            worktree,
        } => {
            let mut options = config.merge_options();
            gates.apply(&mut options);
            options.no_ai |= no_ai;
            if let Some(method) = method {
                options.merge_method = method;
            }
            options.delete_branch &= !keep_branch;
            options.cleanup_worktree &= !keep_worktree;
            options.worktree_path = worktree;
            cmd_merge(&config, pr, &options).await?;
        }
        Commands::Resume { worktree } => {
            cmd_resume(&config, worktree).await?;
        }
        Commands::Preflight { pr, gates } => {
            let mut options = config.merge_options();
            gates.apply(&mut options);
            cmd_preflight(&config, pr, &options).await?;
        }
        Commands::Status { worktree } => {
            cmd_status(worktree).await?;
        }
    }

    Ok(())
}

/// Wire the engine to GitHub, Jira, Anthropic, and the local git repository
async fn build_engine(config: &Config) -> Result<WorkflowEngine> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let retry = config.retry_policy();

    let repo_name = match &config.github.repo {
        Some(repo) => repo.clone(),
        None => detect_github_repo(&cwd).await?,
    };
    let github = GitHubProvider::from_env(&repo_name)
        .context("GitHub is not configured (set MERGEFLOW_GITHUB_TOKEN)")?
        .with_base_url(&config.github.api_url)
        .with_retry(retry.clone());

    let router = PrefixRouter::new(
        config.tracker.project_keys.clone(),
        config.tracker.alternate_prefixes.clone(),
    );
    let worktrees = GitWorktrees::discover(&cwd).await?;

    let mut engine = WorkflowEngine::new(Arc::new(github), Arc::new(router), Arc::new(worktrees))
        .with_resume_options(config.merge_options())
        .with_span(info_span!("merge_workflow", repo = %repo_name));

    if config.tracker.enabled {
        match JiraProvider::from_env() {
            Ok(jira) => engine = engine.with_tracker(Arc::new(jira.with_retry(retry.clone()))),
            Err(e) => warn!(error = %e, "Issue tracker unavailable; review gate skipped"),
        }
    }

    if config.ai.enabled {
        if let Some(anthropic) = AnthropicProvider::from_env(&config.ai.model, config.ai.max_tokens)? {
            engine = engine.with_assistant(Arc::new(anthropic.with_retry(retry)));
        }
    }

    Ok(engine)
}

async fn detect_github_repo(cwd: &Path) -> Result<String> {
    let url = GitCli::remote_url(cwd, "origin")
        .await
        .context("No github.repo configured and no origin remote found")?;
    repo_from_remote_url(&url)
        .with_context(|| format!("Origin remote {} is not a GitHub repository", url))
}

/// Worktree given on the command line, or the one containing the cwd
async fn resolve_worktree(worktree: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = worktree {
        return Ok(path);
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let root = GitCli::repo_root(&cwd).await?;
    Ok(PathBuf::from(root))
}

async fn cmd_merge(config: &Config, pr: u64, options: &MergeOptions) -> Result<()> {
    let engine = build_engine(config).await?;
    let result = engine.run(pr, options).await;
    report_run(result)
}

async fn cmd_resume(config: &Config, worktree: Option<PathBuf>) -> Result<()> {
    let worktree = resolve_worktree(worktree).await?;
    let engine = build_engine(config).await?;
    let result = engine.resume_from_worktree(&worktree).await;
    report_run(result)
}

fn report_run(result: Result<MergeWorkflow, WorkflowError>) -> Result<()> {
    match result {
        Ok(workflow) => {
            print_run_summary(&workflow);
            Ok(())
        }
        Err(e @ WorkflowError::StepFailed { .. }) => {
            eprintln!("Fix the problem and run 'mergeflow resume' to continue.");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_run_summary(workflow: &MergeWorkflow) {
    println!("PR #{} merged", workflow.pr_number);
    println!("{}", "─".repeat(60));
    for record in &workflow.history {
        match &record.outcome {
            StepOutcome::Executed => println!("  {:<10} done", record.step),
            StepOutcome::Skipped { reason } => {
                println!("  {:<10} skipped ({})", record.step, reason);
            }
            StepOutcome::Failed { error } => println!("  {:<10} failed: {}", record.step, error),
        }
    }
    if let Some(sha) = &workflow.context.merge_sha {
        println!("Merge commit: {}", sha);
    }
    for note in &workflow.context.notes {
        println!();
        println!("{}", note);
    }
}

async fn cmd_preflight(config: &Config, pr: u64, options: &MergeOptions) -> Result<()> {
    let engine = build_engine(config).await?;
    let result = engine.preflight(pr, options).await?;
    print_preflight(&result);

    if !result.is_ready() {
        bail!("PR #{} is not ready to merge", pr);
    }
    Ok(())
}

fn print_preflight(result: &PreflightResult) {
    let mark = |ok: bool| if ok { "yes" } else { "no" };

    println!("Preflight for PR #{}", result.pr_number);
    println!("{}", "─".repeat(60));
    println!("  Exists:   {}", mark(result.pr_exists));
    println!("  Open:     {}", mark(result.pr_open));
    if result.approval_skipped {
        println!("  Approved: skipped");
    } else {
        println!("  Approved: {}", mark(result.pr_approved));
    }
    println!("  Checks:   {}", mark(result.checks_passing));
    match (&result.ticket_id, result.tracker_skipped) {
        (Some(ticket), true) => println!("  Ticket:   {} (review gate skipped)", ticket),
        (Some(ticket), false) => println!(
            "  Ticket:   {} {}",
            ticket,
            result.ticket_status.as_deref().unwrap_or("(status unknown)")
        ),
        (None, _) => println!("  Ticket:   none"),
    }
    for warning in &result.warnings {
        println!("  warning: {}", warning);
    }
    println!();
    if result.is_ready() {
        println!("Ready to merge");
    } else {
        println!(
            "Not ready: {}",
            result.failure_reason.as_deref().unwrap_or("ticket is not in review")
        );
    }
}

async fn cmd_status(worktree: Option<PathBuf>) -> Result<()> {
    let worktree = resolve_worktree(worktree).await?;
    let store = CheckpointStore::new();

    let Some(checkpoint) = store.load(&worktree)? else {
        println!("No merge in progress in {}", worktree.display());
        return Ok(());
    };

    println!("PR #{} merge in progress", checkpoint.pr_number);
    println!("{}", "─".repeat(60));
    if let Some(ticket) = &checkpoint.ticket_id {
        println!("  Ticket:    {}", ticket);
    }
    println!("  Started:   {}", checkpoint.created_at);
    println!("  Updated:   {}", checkpoint.updated_at);
    let completed: Vec<_> = checkpoint
        .completed_steps
        .iter()
        .map(|s| s.as_str())
        .collect();
    println!("  Completed: {}", completed.join(", "));
    if let Some(step) = checkpoint.current_step {
        println!("  Stopped:   {}", step);
    }
    let pending: Vec<_> = checkpoint
        .pending_steps()
        .iter()
        .map(|s| s.as_str())
        .collect();
    println!("  Pending:   {}", pending.join(", "));
    Ok(())
}
