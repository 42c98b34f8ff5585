// src/engine/policy.rs

//! The `should_reload` extension point.
//!
//! Every write that survives the kind/extension/ignore filters is offered to
//! a [`ReloadPolicy`] before it may start a reload cycle. The coordinator
//! owns the policy, so implementations can keep state without locking.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::ReloadPolicyKind;
use crate::watch::hash::HashCache;

pub trait ReloadPolicy: Send {
    fn should_reload(&mut self, path: &Path) -> bool;

    /// When a write held back by `should_reload` becomes due, if one is.
    fn deferred_until(&self) -> Option<Instant> {
        None
    }

    /// Hand back the held-back write once [`Self::deferred_until`] has
    /// passed. The returned path reloads without another `should_reload`.
    fn take_deferred(&mut self) -> Option<PathBuf> {
        None
    }
}

/// Every relevant write reloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl ReloadPolicy for AcceptAll {
    fn should_reload(&mut self, _path: &Path) -> bool {
        true
    }
}

/// Accepts the first write, then holds back writes that land within `window`
/// of the last accepted one. The latest held-back write fires once the
/// window closes, so the final edit of a burst always reloads.
#[derive(Debug)]
pub struct Debounce {
    window: Duration,
    last: Option<Instant>,
    held: Option<PathBuf>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: None,
            held: None,
        }
    }
}

impl ReloadPolicy for Debounce {
    fn should_reload(&mut self, path: &Path) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last {
            if now.duration_since(last) < self.window {
                debug!(path = ?path, "write inside debounce window; deferring");
                self.held = Some(path.to_path_buf());
                return false;
            }
        }
        // An accepted write supersedes anything held back.
        self.held = None;
        self.last = Some(now);
        true
    }

    fn deferred_until(&self) -> Option<Instant> {
        match (&self.held, self.last) {
            (Some(_), Some(last)) => Some(last + self.window),
            _ => None,
        }
    }

    fn take_deferred(&mut self) -> Option<PathBuf> {
        let due = self.deferred_until()?;
        let now = Instant::now();
        if now < due {
            return None;
        }
        self.last = Some(now);
        self.held.take()
    }
}

/// Only reloads when the written file's content hash actually changed.
///
/// Saving a file without edits, or tools touching files with identical
/// content, no longer restarts the program.
#[derive(Debug)]
pub struct ContentHash {
    fs: Arc<dyn FileSystem>,
    cache: HashCache,
}

impl ContentHash {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            cache: HashCache::new(),
        }
    }
}

impl Default for ContentHash {
    fn default() -> Self {
        Self::new(Arc::new(RealFileSystem))
    }
}

impl ReloadPolicy for ContentHash {
    fn should_reload(&mut self, path: &Path) -> bool {
        match self.cache.refresh(self.fs.as_ref(), path) {
            Ok(true) => true,
            Ok(false) => {
                debug!(path = ?path, "content unchanged; skipping");
                false
            }
            Err(err) => {
                // Most likely deleted between the event and now; let the
                // cycle find out.
                warn!(path = ?path, error = %err, "failed to hash written file; reloading anyway");
                self.cache.forget(path);
                true
            }
        }
    }
}

/// Build the policy selected in `settings`.
pub fn policy_for(settings: &Settings) -> Box<dyn ReloadPolicy> {
    match settings.policy {
        ReloadPolicyKind::All => Box::new(AcceptAll),
        ReloadPolicyKind::Debounce => Box::new(Debounce::new(settings.debounce)),
        ReloadPolicyKind::Hash => Box::new(ContentHash::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[tokio::test(start_paused = true)]
    async fn debounce_holds_writes_inside_the_window() {
        let mut policy = Debounce::new(Duration::from_millis(100));
        let path = Path::new("/w/main.rs");

        assert!(policy.should_reload(path));
        assert_eq!(policy.deferred_until(), None);
        tokio::time::advance(Duration::from_millis(50)).await;
        assert!(!policy.should_reload(path));
        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(policy.should_reload(path));
        assert_eq!(policy.deferred_until(), None, "accepted write clears the held one");
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_releases_the_last_held_write_when_the_window_closes() {
        let mut policy = Debounce::new(Duration::from_millis(100));
        let start = Instant::now();

        assert!(policy.should_reload(Path::new("/w/a.rs")));
        tokio::time::advance(Duration::from_millis(20)).await;
        assert!(!policy.should_reload(Path::new("/w/b.rs")));
        tokio::time::advance(Duration::from_millis(20)).await;
        assert!(!policy.should_reload(Path::new("/w/final.rs")));

        assert_eq!(policy.deferred_until(), Some(start + Duration::from_millis(100)));
        assert_eq!(policy.take_deferred(), None, "not due yet");

        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(policy.take_deferred(), Some(PathBuf::from("/w/final.rs")));
        assert_eq!(policy.deferred_until(), None);
        assert_eq!(policy.take_deferred(), None);

        // The release counts as accepted: a write right after it is held again.
        assert!(!policy.should_reload(Path::new("/w/a.rs")));
    }

    #[test]
    fn other_policies_never_defer() {
        let mut all = AcceptAll;
        assert!(all.should_reload(Path::new("/w/a.rs")));
        assert_eq!(all.deferred_until(), None);
        assert_eq!(all.take_deferred(), None);
    }

    #[test]
    fn content_hash_skips_identical_rewrites() {
        let fs = MockFileSystem::new();
        let path = Path::new("/w/main.rs");
        fs.add_file(path, "a");
        let mut policy = ContentHash::new(Arc::new(fs.clone()));

        assert!(policy.should_reload(path));
        assert!(!policy.should_reload(path));
        fs.add_file(path, "b");
        assert!(policy.should_reload(path));
    }

    #[test]
    fn content_hash_reloads_when_file_vanished() {
        let mut policy = ContentHash::new(Arc::new(MockFileSystem::new()));
        assert!(policy.should_reload(Path::new("/w/gone.rs")));
    }
}
