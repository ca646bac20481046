//! Mergeflow - resumable, checkpointed pull request merges
//!
//! Validates that a pull request is ready, gathers its context, optionally
//! asks an AI assistant for a debrief, merges it, and closes out the ticket,
//! branch, and worktree. Progress is checkpointed per worktree so an
//! interrupted merge can be resumed.

pub mod api;
pub mod config;
pub mod git;
pub mod logging;
pub mod workflow;
