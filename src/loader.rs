// src/loader.rs

//! Public facade: configure with [`TreeloaderBuilder`], run with
//! [`TreeloaderBuilder::start`], stop with [`Treeloader::close`].

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{Options, Settings};
use crate::engine::{
    Control, ReloadCoordinator, ReloadNotification, ReloadPolicy, error_sink, policy_for,
};
use crate::errors::{Result, TreeloadError};
use crate::exec::{CargoRunLauncher, Launcher, ProcessManager};
use crate::resolve::{CargoImportSource, DependencyResolver, ImportSource};
use crate::watch::watcher::FS_EVENT_CAPACITY;
use crate::watch::{NotifierFactory, NotifyNotifier, WatchMutator, WatchSetManager, spawn_forwarder};

/// Builder for a [`Treeloader`].
///
/// Only [`Options`] is required; every collaborator has a production
/// default (cargo metadata, `cargo run`, the platform notifier, the policy
/// named in the options).
pub struct TreeloaderBuilder {
    options: Options,
    import_source: Option<Box<dyn ImportSource>>,
    launcher: Option<Box<dyn Launcher>>,
    notifier: Option<NotifierFactory>,
    policy: Option<Box<dyn ReloadPolicy>>,
    reload_tx: Option<mpsc::Sender<ReloadNotification>>,
    error_tx: Option<mpsc::Sender<TreeloadError>>,
}

impl std::fmt::Debug for TreeloaderBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeloaderBuilder")
            .field("options", &self.options)
            .field("launcher", &self.launcher)
            .finish_non_exhaustive()
    }
}

impl TreeloaderBuilder {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            import_source: None,
            launcher: None,
            notifier: None,
            policy: None,
            reload_tx: None,
            error_tx: None,
        }
    }

    pub fn import_source(mut self, source: impl ImportSource + 'static) -> Self {
        self.import_source = Some(Box::new(source));
        self
    }

    pub fn launcher(mut self, launcher: impl Launcher + 'static) -> Self {
        self.launcher = Some(Box::new(launcher));
        self
    }

    pub fn notifier(mut self, factory: NotifierFactory) -> Self {
        self.notifier = Some(factory);
        self
    }

    /// Overrides the policy selected by [`Options::policy`].
    pub fn policy(mut self, policy: impl ReloadPolicy + 'static) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    /// Receive one [`ReloadNotification`] per completed cycle. Notifications
    /// that do not fit are dropped.
    pub fn reload_channel(mut self, tx: mpsc::Sender<ReloadNotification>) -> Self {
        self.reload_tx = Some(tx);
        self
    }

    /// Receive every steady-state error in addition to the error log.
    pub fn error_channel(mut self, tx: mpsc::Sender<TreeloadError>) -> Self {
        self.error_tx = Some(tx);
        self
    }

    /// Validate, create the notifier, and spawn the actors.
    ///
    /// Must be called from within a tokio runtime. Configuration and notifier
    /// errors are returned here, before any task exists.
    pub fn start(self) -> Result<Treeloader> {
        let import_source = self
            .import_source
            .unwrap_or_else(|| Box::new(CargoImportSource::default()));
        let settings = self.options.validate(import_source.native_extension())?;

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let factory = self.notifier.unwrap_or_else(NotifyNotifier::factory);
        let notifier = factory(raw_tx)?;

        debug!(settings = ?settings, "starting treeload");

        let (reporter, sink) = error_sink(self.error_tx);
        let sink_task = tokio::spawn(sink.run());

        let (watch_tx, mutator_task) =
            WatchMutator::new(notifier, reporter.clone(), settings.verbose).spawn();

        let (events_tx, events_rx) = mpsc::channel(FS_EVENT_CAPACITY);
        let forwarder_task = spawn_forwarder(raw_rx, events_tx, reporter.clone());

        let launcher = self
            .launcher
            .unwrap_or_else(|| Box::new(CargoRunLauncher::default()));
        let policy = self.policy.unwrap_or_else(|| policy_for(&settings));
        let coordinator = ReloadCoordinator::new(
            &settings,
            DependencyResolver::new(import_source, settings.max_depth),
            WatchSetManager::new(watch_tx),
            ProcessManager::new(launcher, settings.verbose),
            policy,
            reporter,
            self.reload_tx,
        );

        let (control_tx, control_rx) = mpsc::channel(1);
        let coordinator_task = tokio::spawn(coordinator.run(events_rx, control_rx));

        Ok(Treeloader {
            settings,
            control_tx: Some(control_tx),
            coordinator_task: Some(coordinator_task),
            mutator_task: Some(mutator_task),
            _background: vec![forwarder_task, sink_task],
        })
    }
}

/// Handle to a running reload loop.
///
/// Dropping it without [`Treeloader::close`] still shuts the loop down in
/// the background.
#[derive(Debug)]
pub struct Treeloader {
    settings: Settings,
    control_tx: Option<mpsc::Sender<Control>>,
    coordinator_task: Option<JoinHandle<()>>,
    mutator_task: Option<JoinHandle<()>>,
    /// Forwarder and error sink; both end on their own once the notifier
    /// and every reporter are gone.
    _background: Vec<JoinHandle<()>>,
}

impl Treeloader {
    pub fn builder(options: Options) -> TreeloaderBuilder {
        TreeloaderBuilder::new(options)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_closed(&self) -> bool {
        self.control_tx.is_none()
    }

    /// Kill the watched program and release every watch.
    ///
    /// Waits until both have happened. Failures are collected into one
    /// [`TreeloadError::Shutdown`]. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        let Some(control_tx) = self.control_tx.take() else {
            return Ok(());
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let result = if control_tx.send(Control::Close(reply_tx)).await.is_ok() {
            reply_rx.await.unwrap_or(Ok(()))
        } else {
            // Coordinator already gone; it shut itself down on the way out.
            Ok(())
        };

        for task in [self.coordinator_task.take(), self.mutator_task.take()]
            .into_iter()
            .flatten()
        {
            if let Err(err) = task.await {
                warn!(error = %err, "treeload task ended abnormally");
            }
        }
        result
    }
}
