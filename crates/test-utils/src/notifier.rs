//! Fake notifier that records every call and lets tests inject events.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use notify::event::{DataChange, ModifyKind};
use notify::{Event, EventKind};

use treeload::watch::{Notifier, NotifierFactory, RawEventSender};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierCall {
    Watch(PathBuf),
    Unwatch(PathBuf),
    Close,
}

#[derive(Debug, Default)]
struct Shared {
    calls: Vec<NotifierCall>,
    watched: BTreeSet<PathBuf>,
    events: Option<RawEventSender>,
    fail_on: BTreeSet<PathBuf>,
}

/// Control handle for the fake; the notifier itself is created through
/// [`RecordingNotifier::factory`].
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    shared: Arc<Mutex<Shared>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self) -> NotifierFactory {
        let shared = Arc::clone(&self.shared);
        Box::new(move |events| {
            shared.lock().unwrap().events = Some(events);
            Ok(Box::new(FakeNotifier { shared }) as Box<dyn Notifier>)
        })
    }

    /// Make `watch(dir)` fail.
    pub fn fail_on(&self, dir: impl Into<PathBuf>) {
        self.shared.lock().unwrap().fail_on.insert(dir.into());
    }

    pub fn calls(&self) -> Vec<NotifierCall> {
        self.shared.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.shared.lock().unwrap().calls.clear();
    }

    pub fn watched(&self) -> BTreeSet<PathBuf> {
        self.shared.lock().unwrap().watched.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared
            .lock()
            .unwrap()
            .calls
            .contains(&NotifierCall::Close)
    }

    /// Deliver an arbitrary event as if the OS had reported it. Returns
    /// false once the notifier is closed.
    pub fn emit(&self, kind: EventKind, path: impl AsRef<Path>) -> bool {
        let shared = self.shared.lock().unwrap();
        let Some(tx) = &shared.events else {
            return false;
        };
        tx.send(Ok(Event::new(kind).add_path(path.as_ref().to_path_buf())))
            .is_ok()
    }

    /// Deliver a content write to `path`.
    pub fn write(&self, path: impl AsRef<Path>) -> bool {
        self.emit(EventKind::Modify(ModifyKind::Data(DataChange::Content)), path)
    }

    /// Deliver a notifier error.
    pub fn error(&self, err: notify::Error) -> bool {
        let shared = self.shared.lock().unwrap();
        shared
            .events
            .as_ref()
            .is_some_and(|tx| tx.send(Err(err)).is_ok())
    }
}

struct FakeNotifier {
    shared: Arc<Mutex<Shared>>,
}

impl Notifier for FakeNotifier {
    fn watch(&mut self, dir: &Path) -> notify::Result<()> {
        let mut shared = self.shared.lock().unwrap();
        if shared.fail_on.contains(dir) {
            return Err(notify::Error::path_not_found().add_path(dir.to_path_buf()));
        }
        shared.calls.push(NotifierCall::Watch(dir.to_path_buf()));
        shared.watched.insert(dir.to_path_buf());
        Ok(())
    }

    fn unwatch(&mut self, dir: &Path) -> notify::Result<()> {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(NotifierCall::Unwatch(dir.to_path_buf()));
        shared.watched.remove(dir);
        Ok(())
    }

    fn close(&mut self) -> notify::Result<()> {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(NotifierCall::Close);
        // Like a real watcher going away: the event stream ends.
        shared.events = None;
        Ok(())
    }
}
