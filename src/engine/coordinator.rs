// src/engine/coordinator.rs

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

use crate::config::Settings;
use crate::errors::{Result, TreeloadError};
use crate::exec::ProcessManager;
use crate::resolve::{DependencyResolver, EntryTarget};
use crate::verbose_info;
use crate::watch::{ExtensionFilter, FsEvent, IgnoreSet, WatchSet, WatchSetManager, is_content_write};

use super::policy::ReloadPolicy;
use super::queue::PendingReload;
use super::sink::ErrorReporter;
use super::{Control, ReloadNotification};

/// The reload control loop.
///
/// Sole owner of the resolver, the watch-set manager and the process
/// manager; every reload cycle runs to completion before the next event is
/// looked at.
pub struct ReloadCoordinator {
    entry: PathBuf,
    extensions: ExtensionFilter,
    ignore: IgnoreSet,
    verbose: bool,
    resolver: DependencyResolver,
    watches: WatchSetManager,
    process: ProcessManager,
    policy: Box<dyn ReloadPolicy>,
    /// Target of the last successful resolution.
    target: Option<EntryTarget>,
    pending: PendingReload,
    notifications: Option<mpsc::Sender<ReloadNotification>>,
    errors: ErrorReporter,
    health: CycleHealth,
    cycles: u64,
}

impl std::fmt::Debug for ReloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadCoordinator")
            .field("entry", &self.entry)
            .field("target", &self.target)
            .field("process", &self.process)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

impl ReloadCoordinator {
    pub fn new(
        settings: &Settings,
        resolver: DependencyResolver,
        watches: WatchSetManager,
        process: ProcessManager,
        policy: Box<dyn ReloadPolicy>,
        errors: ErrorReporter,
        notifications: Option<mpsc::Sender<ReloadNotification>>,
    ) -> Self {
        Self {
            entry: settings.entry.clone(),
            extensions: settings.extensions.clone(),
            ignore: settings.ignore.clone(),
            verbose: settings.verbose,
            resolver,
            watches,
            process,
            policy,
            target: None,
            pending: PendingReload::new(),
            notifications,
            errors,
            health: CycleHealth::default(),
            cycles: 0,
        }
    }

    /// Main loop.
    ///
    /// - Runs the startup cycle (empty trigger path).
    /// - Then alternates between draining pending events into at most one
    ///   queued reload and waiting for the next event or control message.
    /// - Returns once closed, or once the control handle is dropped.
    pub async fn run(
        mut self,
        mut events_rx: mpsc::Receiver<FsEvent>,
        mut control_rx: mpsc::Receiver<Control>,
    ) {
        info!(entry = ?self.entry, extensions = %self.extensions, "treeload coordinator started");
        self.cycle(PathBuf::new()).await;

        let mut events_open = true;
        loop {
            // Control first, so a stream of writes cannot starve `close`.
            match control_rx.try_recv() {
                Ok(ctrl) => {
                    self.handle_control(Some(ctrl)).await;
                    break;
                }
                Err(TryRecvError::Disconnected) => {
                    self.handle_control(None).await;
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }

            if events_open {
                events_open = self.drain_ready(&mut events_rx);
            }
            self.release_deferred();
            if let Some(path) = self.pending.take() {
                self.cycle(path).await;
                continue;
            }

            let deferred = self.policy.deferred_until();
            tokio::select! {
                biased;

                ctrl = control_rx.recv() => {
                    self.handle_control(ctrl).await;
                    break;
                }

                ev = events_rx.recv(), if events_open => match ev {
                    Some(ev) => self.offer(ev),
                    None => {
                        debug!("file event channel closed; waiting for close");
                        events_open = false;
                    }
                },

                // Picked up by `release_deferred` on the next turn.
                _ = sleep_until(deferred.unwrap_or_else(Instant::now)), if deferred.is_some() => {}
            }
        }

        info!(cycles = self.cycles, "treeload coordinator stopped");
    }

    /// Move every already-queued event through the filters. Returns false if
    /// the channel is closed.
    fn drain_ready(&mut self, events_rx: &mut mpsc::Receiver<FsEvent>) -> bool {
        loop {
            match events_rx.try_recv() {
                Ok(ev) => self.offer(ev),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// Queue a write the policy held back, once it is due.
    fn release_deferred(&mut self) {
        if let Some(path) = self.policy.take_deferred() {
            debug!(path = ?path, "held-back write is due");
            self.pending.record(&path);
        }
    }

    /// Filter chain: content write, extension, ignore globs, policy.
    fn offer(&mut self, ev: FsEvent) {
        if !is_content_write(&ev.kind) {
            trace!(path = ?ev.path, kind = ?ev.kind, "not a content write");
            return;
        }
        if !self.extensions.matches(&ev.path) {
            trace!(path = ?ev.path, "extension not watched");
            return;
        }
        if self.ignore.is_ignored(&ev.path) {
            debug!(path = ?ev.path, "path matches an ignore glob");
            return;
        }
        if !self.policy.should_reload(&ev.path) {
            return;
        }
        self.pending.record(&ev.path);
    }

    /// kill -> resolve -> re-watch -> spawn -> notify.
    async fn cycle(&mut self, trigger: PathBuf) {
        self.cycles += 1;
        if trigger.as_os_str().is_empty() {
            verbose_info!(self.verbose, entry = ?self.entry, "initial build");
        } else {
            verbose_info!(self.verbose, path = ?trigger, "change detected; reloading");
        }

        if let Err(err) = self.process.kill().await {
            self.errors.report(err.into()).await;
        }

        let mut ok = true;
        match self.resolver.resolve(&self.entry).await {
            Ok(resolution) => {
                if self.verbose {
                    info!("watch set ({} dirs):\n{}", resolution.watch_set.len(), resolution.watch_set);
                    info!(
                        "import graph ({} packages):\n{}",
                        resolution.graph.package_count(),
                        resolution.graph
                    );
                }
                if let Err(err) = self.watches.apply(resolution.watch_set).await {
                    self.errors.report(err).await;
                }
                self.target = Some(resolution.target);
            }
            Err(err) => {
                ok = false;
                self.errors.report(err).await;
                if !self.watches.is_established() {
                    let fallback = fallback_watch_set(&self.entry);
                    warn!(dirs = %fallback, "no watch set yet; watching the entry directory until resolution succeeds");
                    if let Err(err) = self.watches.apply(fallback).await {
                        self.errors.report(err).await;
                    }
                }
            }
        }

        match &self.target {
            Some(target) => {
                if let Err(err) = self.process.spawn(target) {
                    ok = false;
                    self.errors.report(err.into()).await;
                }
            }
            None => ok = false,
        }

        if self.health.record(ok) {
            verbose_info!(self.verbose, "successful build and run after earlier failure");
        }
        self.notify(trigger);
    }

    fn notify(&mut self, triggering_path: PathBuf) {
        let Some(tx) = &self.notifications else {
            return;
        };
        match tx.try_send(ReloadNotification { triggering_path }) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => {
                warn!(path = ?n.triggering_path, "reload listener is not keeping up; notification dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("reload listener went away; no further notifications");
                self.notifications = None;
            }
        }
    }

    async fn handle_control(&mut self, ctrl: Option<Control>) {
        let result = self.shutdown().await;
        match ctrl {
            Some(Control::Close(reply)) => {
                let _ = reply.send(result);
            }
            None => {
                debug!("control handle dropped; shutting down");
                if let Err(err) = result {
                    self.errors.report(err).await;
                }
            }
        }
    }

    /// Kill the process and release every watch, collecting failures.
    async fn shutdown(&mut self) -> Result<()> {
        let mut failures = Vec::new();
        if let Err(err) = self.process.kill().await {
            failures.push(TreeloadError::from(err));
        }
        if let Err(err) = self.watches.close().await {
            failures.push(err);
        }
        self.target = None;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(TreeloadError::Shutdown(failures))
        }
    }
}

/// Whether the previous cycle failed to resolve or spawn.
#[derive(Debug, Default)]
struct CycleHealth {
    failing: bool,
}

impl CycleHealth {
    /// Record one cycle's outcome. Returns true when it is the first good
    /// cycle after a failing one.
    fn record(&mut self, ok: bool) -> bool {
        let recovered = ok && self.failing;
        self.failing = !ok;
        recovered
    }
}

fn fallback_watch_set(entry: &Path) -> WatchSet {
    entry.parent().into_iter().collect()
}
