// src/engine/sink.rs

//! Single funnel for errors raised once the actors are running.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{error, warn};

use crate::errors::TreeloadError;

/// Capacity of the reporter -> sink channel.
pub const ERROR_CHANNEL_CAPACITY: usize = 64;

/// Cloneable handle every actor reports through.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    tx: mpsc::Sender<TreeloadError>,
}

impl ErrorReporter {
    pub async fn report(&self, err: TreeloadError) {
        if let Err(mpsc::error::SendError(err)) = self.tx.send(err).await {
            // Sink already gone (shutdown); still make it visible.
            error!(error = %err, "error reported after the error sink stopped");
        }
    }
}

/// Consumer side: logs every error and optionally forwards it.
#[derive(Debug)]
pub struct ErrorSink {
    rx: mpsc::Receiver<TreeloadError>,
    forward: Option<mpsc::Sender<TreeloadError>>,
}

/// Create a connected reporter/sink pair.
///
/// `forward` is the caller's error channel; errors that do not fit into it
/// are dropped after being logged.
pub fn error_sink(forward: Option<mpsc::Sender<TreeloadError>>) -> (ErrorReporter, ErrorSink) {
    let (tx, rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);
    (ErrorReporter { tx }, ErrorSink { rx, forward })
}

impl ErrorSink {
    /// Run until every [`ErrorReporter`] has been dropped.
    pub async fn run(mut self) {
        while let Some(err) = self.rx.recv().await {
            error!(error = %err, "treeload error");

            let Some(forward) = &self.forward else {
                continue;
            };
            match forward.try_send(err) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("error channel full; dropping forwarded error");
                }
                Err(TrySendError::Closed(_)) => {
                    warn!("error channel closed; no longer forwarding errors");
                    self.forward = None;
                }
            }
        }
    }
}
