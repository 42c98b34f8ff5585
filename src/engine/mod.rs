// src/engine/mod.rs

//! Orchestration engine for treeload.
//!
//! This module ties together:
//! - the reload coordinator, the control loop that sequences
//!   kill -> resolve -> re-watch -> spawn for every accepted change;
//! - the pending-reload queue (what happens when writes arrive mid-cycle);
//! - the `should_reload` policies;
//! - the error sink every actor reports through.

use std::path::{Path, PathBuf};

use tokio::sync::oneshot;

use crate::errors::Result;

/// Emitted once per completed reload cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadNotification {
    /// File whose write triggered the cycle; empty for the startup cycle.
    pub triggering_path: PathBuf,
}

impl ReloadNotification {
    pub fn is_startup(&self) -> bool {
        self.triggering_path.as_os_str().is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.triggering_path
    }
}

/// Messages from the [`crate::loader::Treeloader`] handle to the coordinator.
#[derive(Debug)]
pub enum Control {
    /// Kill the process, release the watches, reply with the outcome.
    Close(oneshot::Sender<Result<()>>),
}

pub mod coordinator;
pub mod policy;
pub mod queue;
pub mod sink;

pub use coordinator::ReloadCoordinator;
pub use policy::{AcceptAll, ContentHash, Debounce, ReloadPolicy, policy_for};
pub use queue::PendingReload;
pub use sink::{ErrorReporter, ErrorSink, error_sink};
