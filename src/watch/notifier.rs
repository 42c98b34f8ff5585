// src/watch/notifier.rs

use std::fmt;
use std::path::Path;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::errors::{Result, TreeloadError};

/// Raw notifier output, straight from the notify callback thread.
pub type RawEvent = notify::Result<Event>;
pub type RawEventSender = mpsc::UnboundedSender<RawEvent>;
pub type RawEventReceiver = mpsc::UnboundedReceiver<RawEvent>;

/// Creates the notifier once the event channel exists.
pub type NotifierFactory = Box<dyn FnOnce(RawEventSender) -> Result<Box<dyn Notifier>> + Send>;

/// The file-system notification primitive.
///
/// Watches are per directory and non-recursive: the watch set already lists
/// every directory that matters. Only the watch mutator ever holds one.
pub trait Notifier: Send {
    fn watch(&mut self, dir: &Path) -> notify::Result<()>;

    fn unwatch(&mut self, dir: &Path) -> notify::Result<()>;

    /// Release the OS handle. Dropping also releases it; this lets
    /// implementations surface failures.
    fn close(&mut self) -> notify::Result<()> {
        Ok(())
    }
}

/// [`Notifier`] backed by the platform's recommended `notify` watcher.
pub struct NotifyNotifier {
    inner: Option<RecommendedWatcher>,
}

impl fmt::Debug for NotifyNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyNotifier")
            .field("open", &self.inner.is_some())
            .finish()
    }
}

impl NotifyNotifier {
    pub fn new(events: RawEventSender) -> Result<Self> {
        // Called synchronously by notify on its own thread. A send only
        // fails once the forwarder is gone, i.e. during shutdown.
        let handler = move |res: RawEvent| {
            let _ = events.send(res);
        };
        let inner = RecommendedWatcher::new(handler, Config::default()).map_err(|source| {
            TreeloadError::Watch {
                path: Default::default(),
                source,
            }
        })?;
        Ok(Self { inner: Some(inner) })
    }

    /// Default factory used by the loader.
    pub fn factory() -> NotifierFactory {
        Box::new(|events| Ok(Box::new(NotifyNotifier::new(events)?) as Box<dyn Notifier>))
    }

    fn inner(&mut self) -> notify::Result<&mut RecommendedWatcher> {
        self.inner
            .as_mut()
            .ok_or_else(|| notify::Error::generic("notifier already closed"))
    }
}

impl Notifier for NotifyNotifier {
    fn watch(&mut self, dir: &Path) -> notify::Result<()> {
        self.inner()?.watch(dir, RecursiveMode::NonRecursive)
    }

    fn unwatch(&mut self, dir: &Path) -> notify::Result<()> {
        self.inner()?.unwatch(dir)
    }

    fn close(&mut self) -> notify::Result<()> {
        self.inner.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_notifier_refuses_new_watches() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut notifier = NotifyNotifier::new(tx).unwrap();
        let dir = tempfile::tempdir().unwrap();

        notifier.watch(dir.path()).unwrap();
        notifier.close().unwrap();
        assert!(notifier.watch(dir.path()).is_err());
    }
}
