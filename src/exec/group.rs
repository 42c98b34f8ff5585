// src/exec/group.rs

//! Process-group isolation and group-wide kill.
//!
//! On unix the child becomes the leader of a fresh process group and the
//! whole group receives SIGKILL. On Windows the child gets a new process
//! group and `taskkill /T /F` reaps the tree.

use std::io;

use tokio::process::Command;
use tracing::trace;

/// Make the child spawned from `cmd` lead its own process group.
pub fn isolate(cmd: &mut Command) {
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    #[cfg(windows)]
    {
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }
}

/// Forcibly terminate every process in the group led by `pid`.
///
/// A group that no longer exists is not an error.
pub fn kill_group(pid: u32) -> io::Result<()> {
    if pid == 0 {
        // killpg(0) would target our own group.
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "refusing to signal process group 0",
        ));
    }

    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let raw = i32::try_from(pid)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
        match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
            Ok(()) => {
                trace!(pid, "sent SIGKILL to process group");
                Ok(())
            }
            Err(Errno::ESRCH) => {
                trace!(pid, "process group already gone");
                Ok(())
            }
            Err(errno) => Err(io::Error::from(errno)),
        }
    }

    #[cfg(windows)]
    {
        // 128: no such process.
        let status = std::process::Command::new("taskkill")
            .arg("/T")
            .arg("/F")
            .arg("/PID")
            .arg(pid.to_string())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()?;
        if status.success() || status.code() == Some(128) {
            trace!(pid, "taskkill finished");
            Ok(())
        } else {
            Err(io::Error::other(format!("taskkill exited with {status}")))
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "process groups are not supported on this platform",
        ))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn group_kill_takes_the_grandchild_too() {
        let mut cmd = Command::new("sh");
        // The inner sleep is a grandchild in the same group.
        cmd.arg("-c").arg("sleep 30 & echo $!; wait");
        cmd.stdout(std::process::Stdio::piped());
        isolate(&mut cmd);
        let mut child = cmd.spawn().unwrap();
        let pid = child.id().unwrap();

        use tokio::io::AsyncBufReadExt;
        let stdout = child.stdout.take().unwrap();
        let mut lines = tokio::io::BufReader::new(stdout).lines();
        let grandchild: i32 = lines.next_line().await.unwrap().unwrap().trim().parse().unwrap();

        kill_group(pid).unwrap();
        child.wait().await.unwrap();

        // The grandchild is not ours to reap; poll until init has.
        let mut gone = false;
        for _ in 0..50 {
            if is_dead(grandchild) {
                gone = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(gone, "grandchild {grandchild} survived the group kill");

        // Second kill: group no longer exists.
        kill_group(pid).unwrap();
    }

    /// Gone, or a zombie nobody has reaped yet.
    fn is_dead(pid: i32) -> bool {
        if nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_err() {
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

    #[test]
    fn group_zero_is_rejected() {
        assert_eq!(kill_group(0).unwrap_err().kind(), io::ErrorKind::InvalidInput);
    }
}
