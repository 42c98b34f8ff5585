// src/watch/mutator.rs

//! Serialized watch-set mutation.
//!
//! [`WatchSetManager`] lives inside the coordinator and turns "the watch set
//! is now X" into a stream of [`WatchChangeRequest`]s. A single
//! [`WatchMutator`] task owns the [`Notifier`] and applies them one by one,
//! so the notifier never sees concurrent add/remove calls.

use std::path::PathBuf;

use anyhow::anyhow;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::ErrorReporter;
use crate::errors::{Result, TreeloadError};
use crate::verbose_info;

use super::WatchSet;
use super::notifier::Notifier;

/// Capacity of the coordinator -> mutator channel.
pub const WATCH_COMMAND_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchIntent {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchChangeRequest {
    pub dir: PathBuf,
    pub intent: WatchIntent,
}

impl WatchChangeRequest {
    pub fn add(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            intent: WatchIntent::Add,
        }
    }

    pub fn remove(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            intent: WatchIntent::Remove,
        }
    }
}

#[derive(Debug)]
pub enum WatchCommand {
    Change(WatchChangeRequest),
    /// Release every watch and the notifier itself, then stop.
    Close(oneshot::Sender<Result<()>>),
}

/// Requests that move the notifier from `old` to `new`.
///
/// Removals (`old - new`) come first, then an add for every directory in
/// `new`. Adds for directories that are already registered are dropped by
/// the mutator, so this stays cheap while also retrying adds that failed in
/// an earlier cycle.
pub fn plan_changes(old: &WatchSet, new: &WatchSet) -> Vec<WatchChangeRequest> {
    old.difference(new)
        .map(WatchChangeRequest::remove)
        .chain(new.iter().map(WatchChangeRequest::add))
        .collect()
}

/// Coordinator-side handle to the watch mutator.
#[derive(Debug)]
pub struct WatchSetManager {
    current: Option<WatchSet>,
    tx: mpsc::Sender<WatchCommand>,
}

impl WatchSetManager {
    pub fn new(tx: mpsc::Sender<WatchCommand>) -> Self {
        Self { current: None, tx }
    }

    /// The watch set of the running program, `None` before the first
    /// successful [`WatchSetManager::apply`].
    pub fn current(&self) -> Option<&WatchSet> {
        self.current.as_ref()
    }

    pub fn is_established(&self) -> bool {
        self.current.is_some()
    }

    /// Replace the watch set wholesale.
    pub async fn apply(&mut self, new: WatchSet) -> Result<()> {
        let empty = WatchSet::new();
        let old = self.current.as_ref().unwrap_or(&empty);
        let changes = plan_changes(old, &new);
        debug!(requests = changes.len(), dirs = new.len(), "applying watch set");

        for change in changes {
            self.tx
                .send(WatchCommand::Change(change))
                .await
                .map_err(|_| TreeloadError::Other(anyhow!("watch mutator has stopped")))?;
        }
        self.current = Some(new);
        Ok(())
    }

    /// Ask the mutator to release everything and wait for it to finish.
    ///
    /// A mutator that is already gone counts as closed.
    pub async fn close(&mut self) -> Result<()> {
        self.current = None;
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(WatchCommand::Close(reply_tx)).await.is_err() {
            return Ok(());
        }
        reply_rx.await.unwrap_or(Ok(()))
    }
}

/// Sole owner of the [`Notifier`].
pub struct WatchMutator {
    notifier: Box<dyn Notifier>,
    registered: WatchSet,
    errors: ErrorReporter,
    verbose: bool,
}

impl WatchMutator {
    pub fn new(notifier: Box<dyn Notifier>, errors: ErrorReporter, verbose: bool) -> Self {
        Self {
            notifier,
            registered: WatchSet::new(),
            errors,
            verbose,
        }
    }

    /// Start the mutator task and return the channel feeding it.
    pub fn spawn(self) -> (mpsc::Sender<WatchCommand>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(WATCH_COMMAND_CAPACITY);
        let handle = tokio::spawn(self.run(rx));
        (tx, handle)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<WatchCommand>) {
        debug!("watch mutator started");
        while let Some(cmd) = rx.recv().await {
            match cmd {
                WatchCommand::Change(change) => {
                    if let Err(err) = self.apply(change) {
                        self.errors.report(err).await;
                    }
                }
                WatchCommand::Close(reply) => {
                    let result = self.close();
                    let _ = reply.send(result);
                    debug!("watch mutator closed");
                    return;
                }
            }
        }

        // Coordinator dropped its handle without closing.
        if let Err(err) = self.close() {
            self.errors.report(err).await;
        }
        debug!("watch mutator channel closed; exiting");
    }

    fn apply(&mut self, change: WatchChangeRequest) -> Result<()> {
        let WatchChangeRequest { dir, intent } = change;
        match intent {
            WatchIntent::Add => {
                if self.registered.contains(&dir) {
                    return Ok(());
                }
                self.notifier
                    .watch(&dir)
                    .map_err(|source| TreeloadError::Watch {
                        path: dir.clone(),
                        source,
                    })?;
                verbose_info!(self.verbose, dir = ?dir, "watching directory");
                self.registered.insert(dir);
            }
            WatchIntent::Remove => {
                if !self.registered.remove(&dir) {
                    return Ok(());
                }
                // The entry is gone from `registered` either way: a failed
                // unwatch usually means the directory vanished with its watch.
                self.notifier
                    .unwatch(&dir)
                    .map_err(|source| TreeloadError::Watch {
                        path: dir.clone(),
                        source,
                    })?;
                verbose_info!(self.verbose, dir = ?dir, "stopped watching directory");
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let dirs: Vec<PathBuf> = self.registered.iter().map(|d| d.to_path_buf()).collect();
        for dir in dirs {
            self.registered.remove(&dir);
            if let Err(err) = self.notifier.unwatch(&dir) {
                warn!(dir = ?dir, error = %err, "failed to release watch during close");
            }
        }
        self.notifier.close().map_err(|source| TreeloadError::Watch {
            path: PathBuf::new(),
            source,
        })
    }
}
