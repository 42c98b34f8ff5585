#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use treeload::config::Options;
use treeload::exec::ProgramLauncher;
use treeload::{ReloadNotification, TreeloadError, Treeloader};
use treeload_test_utils::{MemoryImportSource, RecordingNotifier};

pub use treeload_test_utils::{eventually, init_tracing, with_timeout, with_timeout_after};

/// Records its pid on start, flags any earlier instance still alive, then
/// sleeps until killed.
const SLEEPER: &str = r#"
here="$(dirname "$0")"
for p in $(cat "$here/spawns.log" 2>/dev/null); do
    if kill -0 "$p" 2>/dev/null; then echo "$p" >> "$here/overlap.log"; fi
done
echo $$ >> "$here/spawns.log"
exec sleep 30
"#;

/// A workspace on disk with an entry package `app` importing `core`.
pub struct Fixture {
    pub dir: TempDir,
    pub root: PathBuf,
    pub graph: MemoryImportSource,
    pub notifier: RecordingNotifier,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        // Canonical, so paths line up with what the loader validates into.
        let root = dir.path().canonicalize().unwrap();
        for sub in ["app", "core", "util"] {
            std::fs::create_dir_all(root.join(sub)).unwrap();
        }
        std::fs::write(root.join("app/main.rs"), "fn main() {}\n").unwrap();
        std::fs::write(root.join("sleeper.sh"), SLEEPER).unwrap();

        let graph = MemoryImportSource::new()
            .entry("app", root.join("app"))
            .package("core", root.join("core"), &[])
            .package("util", root.join("util"), &[])
            .platform("std")
            .imports("app", &["core", "std"]);

        Self {
            dir,
            root,
            graph,
            notifier: RecordingNotifier::new(),
        }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn entry(&self) -> PathBuf {
        self.path("app/main.rs")
    }

    pub fn options(&self) -> Options {
        Options::new(self.entry())
    }

    pub fn launcher(&self) -> ProgramLauncher {
        ProgramLauncher::new("sh").arg(self.path("sleeper.sh"))
    }

    /// Pids of every process the loader started, in order.
    pub fn spawns(&self) -> Vec<i32> {
        read_pids(&self.path("spawns.log"))
    }

    pub fn overlaps(&self) -> Vec<i32> {
        read_pids(&self.path("overlap.log"))
    }

    pub fn start(&self, options: Options) -> Running {
        let (reload_tx, reload_rx) = mpsc::channel(64);
        let (error_tx, error_rx) = mpsc::channel(64);
        let loader = Treeloader::builder(options)
            .import_source(self.graph.clone())
            .launcher(self.launcher())
            .notifier(self.notifier.factory())
            .reload_channel(reload_tx)
            .error_channel(error_tx)
            .start()
            .expect("loader starts");
        Running {
            loader,
            reloads: reload_rx,
            errors: error_rx,
        }
    }
}

pub struct Running {
    pub loader: Treeloader,
    pub reloads: mpsc::Receiver<ReloadNotification>,
    pub errors: mpsc::Receiver<TreeloadError>,
}

impl Running {
    pub async fn next_reload(&mut self) -> ReloadNotification {
        with_timeout(self.reloads.recv())
            .await
            .expect("reload channel open")
    }

    pub async fn next_error(&mut self) -> TreeloadError {
        with_timeout(self.errors.recv())
            .await
            .expect("error channel open")
    }

    /// Assert nothing is reloaded within a short grace period.
    pub async fn assert_quiet(&mut self) {
        let got = tokio::time::timeout(Duration::from_millis(300), self.reloads.recv()).await;
        assert!(got.is_err(), "unexpected reload: {got:?}");
    }
}

pub fn read_pids(path: &Path) -> Vec<i32> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter_map(|l| l.trim().parse().ok())
        .collect()
}

/// Gone, or a zombie nobody has reaped yet.
#[cfg(unix)]
pub fn is_dead(pid: i32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    if kill(Pid::from_raw(pid), None).is_err() {
        return true;
    }
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| {
            stat.rsplit_once(')')
                .map(|(_, rest)| rest.trim_start().starts_with('Z'))
        })
        .unwrap_or(false)
}
