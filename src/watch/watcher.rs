// src/watch/watcher.rs

use std::path::PathBuf;

use notify::EventKind;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::engine::ErrorReporter;
use crate::errors::TreeloadError;

use super::filter::is_content_write;
use super::notifier::RawEventReceiver;

/// Capacity of the forwarder -> coordinator channel.
pub const FS_EVENT_CAPACITY: usize = 64;

/// One path touched by one notifier event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub path: PathBuf,
    pub kind: EventKind,
}

impl FsEvent {
    pub fn new(path: impl Into<PathBuf>, kind: EventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Spawn the event forwarder.
///
/// Drains the unbounded channel fed by the notify callback thread. Content
/// writes go to the coordinator, one [`FsEvent`] per path; notifier errors go
/// to the error sink. Everything else is dropped here. The task ends once
/// the notifier is gone or the coordinator stops listening.
pub fn spawn_forwarder(
    mut raw_rx: RawEventReceiver,
    events_tx: mpsc::Sender<FsEvent>,
    errors: ErrorReporter,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(res) = raw_rx.recv().await {
            match res {
                Ok(event) => {
                    trace!(?event, "received notify event");
                    if !is_content_write(&event.kind) {
                        continue;
                    }
                    for path in event.paths {
                        if events_tx.send(FsEvent::new(path, event.kind)).await.is_err() {
                            debug!("coordinator stopped listening; event forwarder exiting");
                            return;
                        }
                    }
                }
                Err(err) => {
                    let path = err.paths.first().cloned().unwrap_or_default();
                    errors
                        .report(TreeloadError::Watch { path, source: err })
                        .await;
                }
            }
        }
        debug!("notifier closed; event forwarder exiting");
    })
}
