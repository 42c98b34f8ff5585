// src/engine/queue.rs

use std::path::{Path, PathBuf};

use tracing::debug;

/// Depth-1 queue of reload triggers that arrive while a cycle is running.
///
/// Any number of accepted events collapse into a single pending reload; the
/// most recent path is the one reported for it.
#[derive(Debug, Default)]
pub struct PendingReload {
    latest: Option<PathBuf>,
    coalesced: usize,
}

impl PendingReload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_none()
    }

    /// Remember `path` as the trigger for the next cycle.
    pub fn record(&mut self, path: &Path) {
        if let Some(prev) = self.latest.replace(path.to_path_buf()) {
            self.coalesced += 1;
            debug!(dropped = ?prev, latest = ?path, "coalesced pending reload");
        }
    }

    /// Take the pending trigger, if any, resetting the queue.
    pub fn take(&mut self) -> Option<PathBuf> {
        let latest = self.latest.take();
        if latest.is_some() {
            debug!(coalesced = self.coalesced, "draining pending reload");
        }
        self.coalesced = 0;
        latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_path_wins() {
        let mut q = PendingReload::new();
        assert!(q.is_empty());
        assert_eq!(q.take(), None);

        q.record(Path::new("/w/a.rs"));
        q.record(Path::new("/w/b.rs"));
        q.record(Path::new("/w/c.rs"));
        assert!(!q.is_empty());

        assert_eq!(q.take(), Some(PathBuf::from("/w/c.rs")));
        assert!(q.is_empty());
        assert_eq!(q.take(), None);
    }
}
