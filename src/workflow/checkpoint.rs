//! Durable per-worktree snapshot of a merge run.
//!
//! The checkpoint lives at `<worktree>/.mergeflow/checkpoint.json`. Its
//! presence means a run started and did not finish. Writes go through a temp
//! file and a rename so a crash never leaves a half-written checkpoint.
//!
//! There is no lock: one writer per worktree at a time is assumed, and
//! concurrent runs against the same worktree are last-write-wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::workflow::context::{MergeWorkflow, WorkflowContext};
use crate::workflow::step::Step;

const CHECKPOINT_DIR: &str = ".mergeflow";
const CHECKPOINT_FILE: &str = "checkpoint.json";
/// Keeps the checkpoint directory out of `git status` so a linked worktree
/// can still be removed without `--force`
const IGNORE_FILE: &str = ".gitignore";

/// Errors from reading or writing checkpoint files
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("worktree {0} does not exist")]
    WorktreeMissing(PathBuf),

    #[error("checkpoint I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed checkpoint {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Persisted progress of a merge run.
///
/// Field names are the on-disk schema; renaming one breaks resuming runs
/// started by an older build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub pr_number: u64,
    #[serde(default)]
    pub ticket_id: Option<String>,
    pub worktree_path: PathBuf,
    #[serde(default)]
    pub completed_steps: Vec<Step>,
    #[serde(default)]
    pub current_step: Option<Step>,
    #[serde(default)]
    pub context: WorkflowContext,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Project a workflow onto a checkpoint. `None` until a worktree is known.
    ///
    /// `created_at` comes from the workflow's first checkpoint when there is
    /// one, so it stays fixed across saves within a run.
    pub fn from_workflow(workflow: &MergeWorkflow, now: DateTime<Utc>) -> Option<Self> {
        let worktree_path = workflow.worktree_path.clone()?;
        Some(Self {
            pr_number: workflow.pr_number,
            ticket_id: workflow.ticket_id.clone(),
            worktree_path,
            completed_steps: workflow.completed_steps.clone(),
            current_step: workflow.current_step,
            context: workflow.context.clone(),
            created_at: workflow.checkpoint_created_at.unwrap_or(now),
            updated_at: now,
        })
    }

    /// Rehydrate the workflow this checkpoint was taken from
    pub fn to_workflow(&self) -> MergeWorkflow {
        let mut workflow = MergeWorkflow::new(self.pr_number);
        workflow.ticket_id = self.ticket_id.clone();
        workflow.worktree_path = Some(self.worktree_path.clone());
        workflow.started_at = self.created_at;
        workflow.completed_steps = self.completed_steps.clone();
        workflow.current_step = self.current_step;
        workflow.context = self.context.clone();
        workflow.checkpoint_created_at = Some(self.created_at);
        workflow
    }

    /// Steps a resume would still run, in order
    pub fn pending_steps(&self) -> Vec<Step> {
        Step::ALL
            .into_iter()
            .filter(|s| !self.completed_steps.contains(s))
            .collect()
    }
}

/// Reads and writes checkpoint files inside worktrees
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir_name: String,
    file_name: String,
}

impl Default for CheckpointStore {
    fn default() -> Self {
        Self {
            dir_name: CHECKPOINT_DIR.to_string(),
            file_name: CHECKPOINT_FILE.to_string(),
        }
    }
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Location of the checkpoint file for a worktree
    pub fn path_for(&self, worktree: &Path) -> PathBuf {
        worktree.join(&self.dir_name).join(&self.file_name)
    }

    /// Write a checkpoint atomically, owner-only.
    ///
    /// Never creates the worktree itself: saving into a removed worktree is
    /// an error.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<PathBuf, CheckpointError> {
        let worktree = &checkpoint.worktree_path;
        if !worktree.is_dir() {
            return Err(CheckpointError::WorktreeMissing(worktree.clone()));
        }

        let dir = worktree.join(&self.dir_name);
        create_private_dir(&dir)
            .and_then(|()| write_ignore_file(&dir))
            .map_err(|source| CheckpointError::Io {
                path: dir.clone(),
                source,
            })?;

        let path = dir.join(&self.file_name);
        let contents =
            serde_json::to_vec_pretty(checkpoint).map_err(|source| CheckpointError::Parse {
                path: path.clone(),
                source,
            })?;

        let tmp = dir.join(format!("{}.tmp", self.file_name));
        write_private_file(&tmp, &contents)
            .and_then(|()| fs::rename(&tmp, &path))
            .map_err(|source| CheckpointError::Io {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), "Saved checkpoint");
        Ok(path)
    }

    /// Load the checkpoint for a worktree. `Ok(None)` when there is none.
    pub fn load(&self, worktree: &Path) -> Result<Option<Checkpoint>, CheckpointError> {
        let path = self.path_for(worktree);
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CheckpointError::Io { path, source }),
        };

        serde_json::from_slice(&contents)
            .map(Some)
            .map_err(|source| CheckpointError::Parse { path, source })
    }

    /// Delete the checkpoint for a worktree. Missing files are fine.
    pub fn clear(&self, worktree: &Path) -> Result<(), CheckpointError> {
        let path = self.path_for(worktree);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(source) => return Err(CheckpointError::Io { path, source }),
        }

        remove_dir_if_unused(&worktree.join(&self.dir_name));
        debug!(path = %path.display(), "Cleared checkpoint");
        Ok(())
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    match fs::DirBuilder::new().mode(0o700).create(dir) {
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        other => other,
    }
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    match fs::create_dir(dir) {
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        other => other,
    }
}

/// Write a `*` ignore file unless one is already there
fn write_ignore_file(dir: &Path) -> io::Result<()> {
    let path = dir.join(IGNORE_FILE);
    match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(mut file) => file.write_all(b"*\n"),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// Remove the checkpoint directory when only the ignore file is left in it
fn remove_dir_if_unused(dir: &Path) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let only_ignore_file = entries
        .filter_map(Result::ok)
        .all(|entry| entry.file_name() == IGNORE_FILE);
    if only_ignore_file {
        let _ = fs::remove_file(dir.join(IGNORE_FILE));
        let _ = fs::remove_dir(dir);
    }
}

fn write_private_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PullRequest;
    use tempfile::TempDir;

    fn workflow_in(dir: &TempDir) -> MergeWorkflow {
        let mut wf = MergeWorkflow::new(42);
        wf.ticket_id = Some("PROJ-42".to_string());
        wf.worktree_path = Some(dir.path().to_path_buf());
        wf.completed_steps = vec![Step::Preflight, Step::Gather];
        wf.current_step = Some(Step::Debrief);
        wf.context.source_branch = "feature/PROJ-42".to_string();
        wf.context.target_branch = "main".to_string();
        wf.context.add_note("gathered 3 commits");
        wf.context.pr = Some(PullRequest {
            number: 42,
            title: "Add widgets".to_string(),
            state: "open".to_string(),
            source_branch: "feature/PROJ-42".to_string(),
            target_branch: "main".to_string(),
            approved: true,
            checks_passing: true,
            merged: false,
            url: String::new(),
            author: Some("ann".to_string()),
            head_sha: "abc123".to_string(),
        });
        wf
    }

    #[test]
    fn test_no_checkpoint_without_worktree() {
        let wf = MergeWorkflow::new(1);
        assert!(Checkpoint::from_workflow(&wf, Utc::now()).is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new();
        let wf = workflow_in(&dir);

        let checkpoint = Checkpoint::from_workflow(&wf, Utc::now()).unwrap();
        let path = store.save(&checkpoint).unwrap();
        assert_eq!(path, dir.path().join(".mergeflow").join("checkpoint.json"));

        let loaded = store.load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.pr_number, 42);
        assert_eq!(loaded.ticket_id.as_deref(), Some("PROJ-42"));
        assert_eq!(loaded.completed_steps, vec![Step::Preflight, Step::Gather]);
        assert_eq!(loaded.current_step, Some(Step::Debrief));
        assert_eq!(loaded.context, wf.context);
        assert_eq!(loaded, checkpoint);
    }

    #[test]
    fn test_created_at_stable_across_saves() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new();
        let mut wf = workflow_in(&dir);

        let first_time = Utc::now();
        let first = Checkpoint::from_workflow(&wf, first_time).unwrap();
        store.save(&first).unwrap();
        wf.checkpoint_created_at = Some(first.created_at);

        let later = first_time + chrono::Duration::seconds(5);
        wf.completed_steps.push(Step::Debrief);
        let second = Checkpoint::from_workflow(&wf, later).unwrap();
        store.save(&second).unwrap();

        let loaded = store.load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.created_at, first.created_at);
        assert_eq!(loaded.updated_at, later);
        assert!(loaded.updated_at > loaded.created_at);
        assert_eq!(loaded.completed_steps.len(), 3);
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(CheckpointStore::new().load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_clear_missing_is_noop() {
        let dir = TempDir::new().unwrap();
        CheckpointStore::new().clear(dir.path()).unwrap();
    }

    #[test]
    fn test_clear_removes_file_and_dir() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new();
        let checkpoint = Checkpoint::from_workflow(&workflow_in(&dir), Utc::now()).unwrap();
        store.save(&checkpoint).unwrap();

        store.clear(dir.path()).unwrap();
        assert!(store.load(dir.path()).unwrap().is_none());
        assert!(!dir.path().join(".mergeflow").exists());
    }

    #[test]
    fn test_save_ignores_checkpoint_dir() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new();
        let checkpoint = Checkpoint::from_workflow(&workflow_in(&dir), Utc::now()).unwrap();
        store.save(&checkpoint).unwrap();
        store.save(&checkpoint).unwrap();

        let ignore = fs::read_to_string(dir.path().join(".mergeflow").join(".gitignore")).unwrap();
        assert_eq!(ignore, "*\n");
    }

    #[test]
    fn test_clear_keeps_dir_with_other_files() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new();
        let checkpoint = Checkpoint::from_workflow(&workflow_in(&dir), Utc::now()).unwrap();
        store.save(&checkpoint).unwrap();
        let config = dir.path().join(".mergeflow").join("config.toml");
        fs::write(&config, "[merge]\n").unwrap();

        store.clear(dir.path()).unwrap();
        assert!(store.load(dir.path()).unwrap().is_none());
        assert!(config.exists());
        assert!(dir.path().join(".mergeflow").join(".gitignore").exists());
    }

    #[test]
    fn test_malformed_checkpoint_is_error() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new();
        fs::create_dir(dir.path().join(".mergeflow")).unwrap();
        fs::write(store.path_for(dir.path()), "{ not json").unwrap();

        let err = store.load(dir.path()).unwrap_err();
        assert!(matches!(err, CheckpointError::Parse { .. }));
    }

    #[test]
    fn test_save_into_missing_worktree_fails() {
        let dir = TempDir::new().unwrap();
        let mut wf = workflow_in(&dir);
        let gone = dir.path().join("removed");
        wf.worktree_path = Some(gone.clone());

        let checkpoint = Checkpoint::from_workflow(&wf, Utc::now()).unwrap();
        let err = CheckpointStore::new().save(&checkpoint).unwrap_err();
        assert!(matches!(err, CheckpointError::WorktreeMissing(p) if p == gone));
        assert!(!gone.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new();
        let checkpoint = Checkpoint::from_workflow(&workflow_in(&dir), Utc::now()).unwrap();
        let path = store.save(&checkpoint).unwrap();

        let file_mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        let dir_mode = fs::metadata(path.parent().unwrap())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(file_mode, 0o600);
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn test_rehydrate_and_pending_steps() {
        let dir = TempDir::new().unwrap();
        let checkpoint = Checkpoint::from_workflow(&workflow_in(&dir), Utc::now()).unwrap();

        assert_eq!(
            checkpoint.pending_steps(),
            vec![Step::Debrief, Step::Merge, Step::Closeout]
        );

        let wf = checkpoint.to_workflow();
        assert_eq!(wf.pr_number, 42);
        assert_eq!(wf.worktree_path.as_deref(), Some(dir.path()));
        assert_eq!(wf.checkpoint_created_at, Some(checkpoint.created_at));
        assert!(wf.history.is_empty());
    }

    #[test]
    fn test_on_disk_field_names() {
        let dir = TempDir::new().unwrap();
        let checkpoint = Checkpoint::from_workflow(&workflow_in(&dir), Utc::now()).unwrap();
        let value = serde_json::to_value(&checkpoint).unwrap();
        for field in [
            "pr_number",
            "ticket_id",
            "worktree_path",
            "completed_steps",
            "current_step",
            "context",
            "created_at",
            "updated_at",
        ] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert_eq!(value["completed_steps"][0], "preflight");
    }
}
