// src/exec/process.rs

use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;

use tokio::process::Child;
use tracing::{debug, warn};

use crate::errors::ProcessError;
use crate::resolve::EntryTarget;
use crate::verbose_info;

use super::group;
use super::launcher::Launcher;

/// Lifecycle of the single watched process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Idle,
    Running,
    /// Only observable while [`ProcessManager::kill`] is in flight.
    Killing,
}

impl ProcessState {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessState::Idle => "idle",
            ProcessState::Running => "running",
            ProcessState::Killing => "killing",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry path, artifact name and the live process running it.
#[derive(Debug)]
pub struct CommandDescriptor {
    pub target: EntryTarget,
    pub pid: u32,
    child: Child,
}

impl CommandDescriptor {
    pub fn artifact(&self) -> &str {
        &self.target.artifact.name
    }
}

/// Owns spawning and forcibly terminating the watched program.
///
/// At most one process exists at any time; `spawn` refuses to start a second
/// one until `kill` has reaped the first.
#[derive(Debug)]
pub struct ProcessManager {
    launcher: Box<dyn Launcher>,
    current: Option<CommandDescriptor>,
    state: ProcessState,
    last_spawn: Option<Instant>,
    verbose: bool,
}

impl ProcessManager {
    pub fn new(launcher: Box<dyn Launcher>, verbose: bool) -> Self {
        Self {
            launcher,
            current: None,
            state: ProcessState::Idle,
            last_spawn: None,
            verbose,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Manager state, not liveness: a child that exited on its own (a failed
    /// build, a crash) still counts as running until [`Self::kill`] reaps
    /// it. Use [`Self::exited`] to ask the OS.
    pub fn running(&self) -> bool {
        self.state == ProcessState::Running
    }

    /// True when the current child has already exited without being killed.
    pub fn exited(&mut self) -> bool {
        self.current
            .as_mut()
            .is_some_and(|c| matches!(c.child.try_wait(), Ok(Some(_))))
    }

    pub fn pid(&self) -> Option<u32> {
        self.current.as_ref().map(|c| c.pid)
    }

    pub fn current(&self) -> Option<&CommandDescriptor> {
        self.current.as_ref()
    }

    /// Start `target` in its own process group, stdout/stderr inherited.
    pub fn spawn(&mut self, target: &EntryTarget) -> Result<(), ProcessError> {
        if self.state != ProcessState::Idle {
            return Err(ProcessError::InvalidState {
                op: "spawn",
                state: self.state.as_str(),
            });
        }

        let mut cmd = self.launcher.command(target);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        group::isolate(&mut cmd);

        let spawn_err = |source: std::io::Error| ProcessError::Spawn {
            artifact: target.artifact.name.clone(),
            source,
        };
        let child = cmd.spawn().map_err(spawn_err)?;
        // Only `None` once the child has been polled to completion.
        let pid = child.id().ok_or_else(|| {
            spawn_err(std::io::Error::other("child exited before its pid was read"))
        })?;

        let now = Instant::now();
        match self.last_spawn.replace(now) {
            Some(prev) => verbose_info!(
                self.verbose,
                artifact = %target.artifact.name,
                pid,
                since_last_ms = now.duration_since(prev).as_millis() as u64,
                "started process"
            ),
            None => verbose_info!(
                self.verbose,
                artifact = %target.artifact.name,
                pid,
                "started process"
            ),
        }

        self.current = Some(CommandDescriptor {
            target: target.clone(),
            pid,
            child,
        });
        self.state = ProcessState::Running;
        Ok(())
    }

    /// SIGKILL the whole process group and wait until the child is reaped.
    ///
    /// No-op when idle. The manager is idle afterwards whatever the outcome.
    pub async fn kill(&mut self) -> Result<(), ProcessError> {
        let Some(mut current) = self.current.take() else {
            return Ok(());
        };
        self.state = ProcessState::Killing;
        let pid = current.pid;
        let started = Instant::now();

        // Descendants may outlive a leader that already exited, so the group
        // is signalled either way; only a live leader's status is ours.
        let issued = !matches!(current.child.try_wait(), Ok(Some(_)));
        let signalled = group::kill_group(pid).map_err(|source| ProcessError::Kill { pid, source });
        if signalled.is_err() {
            // At least take the direct child down so the wait below returns.
            let _ = current.child.start_kill();
        }
        let waited = current.child.wait().await;
        self.state = ProcessState::Idle;

        signalled?;
        let status = waited.map_err(|source| ProcessError::Kill { pid, source })?;
        verbose_info!(
            self.verbose,
            artifact = %current.artifact(),
            pid,
            %status,
            took_ms = started.elapsed().as_millis() as u64,
            "killed process"
        );

        if status.success() || (issued && ended_by_kill(&status)) {
            Ok(())
        } else {
            Err(ProcessError::AbnormalExit {
                pid,
                status: status.to_string(),
            })
        }
    }
}

impl Drop for ProcessManager {
    fn drop(&mut self) {
        // `kill_on_drop` only reaches the direct child; take the group too.
        if let Some(current) = &self.current {
            debug!(pid = current.pid, "process manager dropped while running");
            if let Err(err) = group::kill_group(current.pid) {
                warn!(pid = current.pid, error = %err, "failed to kill process group on drop");
            }
        }
    }
}

/// Whether `status` is what our own kill leaves behind.
#[cfg(unix)]
fn ended_by_kill(status: &ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal().is_some()
}

#[cfg(not(unix))]
fn ended_by_kill(status: &ExitStatus) -> bool {
    // `taskkill /F` leaves exit code 1.
    status.code() == Some(1)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::exec::ProgramLauncher;
    use crate::resolve::{Artifact, ArtifactKind};

    fn script(body: &str) -> (tempfile::TempDir, EntryTarget) {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("entry.sh");
        std::fs::write(&entry, body).unwrap();
        let target = EntryTarget {
            entry,
            artifact: Artifact {
                name: "entry".into(),
                kind: ArtifactKind::Bin,
                manifest: None,
            },
        };
        (dir, target)
    }

    #[tokio::test]
    async fn spawn_then_kill_cycles_through_idle() {
        let (_dir, target) = script("trap '' TERM\nsleep 30\n");
        let mut pm = ProcessManager::new(Box::new(ProgramLauncher::new("sh")), false);

        assert!(pm.kill().await.is_ok(), "kill while idle is a no-op");
        pm.spawn(&target).unwrap();
        assert!(pm.running());
        assert!(pm.pid().is_some());

        let err = pm.spawn(&target).unwrap_err();
        assert!(matches!(err, ProcessError::InvalidState { op: "spawn", state: "running" }));

        // TERM is trapped; only a group SIGKILL ends this.
        pm.kill().await.unwrap();
        assert_eq!(pm.state(), ProcessState::Idle);
        assert_eq!(pm.pid(), None);

        pm.spawn(&target).unwrap();
        pm.kill().await.unwrap();
        assert!(!pm.running());
    }

    #[tokio::test]
    async fn nonzero_exit_before_kill_is_abnormal() {
        let (_dir, target) = script("exit 3\n");
        let mut pm = ProcessManager::new(Box::new(ProgramLauncher::new("sh")), true);
        pm.spawn(&target).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        match pm.kill().await {
            Err(ProcessError::AbnormalExit { status, .. }) => assert!(status.contains('3')),
            other => panic!("expected AbnormalExit, got {other:?}"),
        }
        assert_eq!(pm.state(), ProcessState::Idle);
    }

    #[tokio::test]
    async fn signal_death_before_kill_is_abnormal() {
        let (_dir, target) = script("kill -KILL $$\n");
        let mut pm = ProcessManager::new(Box::new(ProgramLauncher::new("sh")), false);
        pm.spawn(&target).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        // Not our signal, so not a clean kill.
        assert!(matches!(pm.kill().await, Err(ProcessError::AbnormalExit { .. })));
    }

    #[tokio::test]
    async fn exited_reports_liveness_while_running_reports_state() {
        let (_dir, target) = script("exit 1\n");
        let mut pm = ProcessManager::new(Box::new(ProgramLauncher::new("sh")), false);
        pm.spawn(&target).unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while !pm.exited() {
            assert!(std::time::Instant::now() < deadline, "child never exited");
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(pm.running(), "state holds until kill");

        assert!(matches!(pm.kill().await, Err(ProcessError::AbnormalExit { .. })));
        assert!(!pm.running());
        assert!(!pm.exited());
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let mut pm = ProcessManager::new(
            Box::new(ProgramLauncher::new("/definitely/not/a/program")),
            false,
        );
        let target = EntryTarget {
            entry: PathBuf::from("/tmp/x"),
            artifact: Artifact {
                name: "x".into(),
                kind: ArtifactKind::Bin,
                manifest: None,
            },
        };
        assert!(matches!(pm.spawn(&target), Err(ProcessError::Spawn { .. })));
        assert_eq!(pm.state(), ProcessState::Idle);
    }
}
