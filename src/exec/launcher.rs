// src/exec/launcher.rs

//! How an [`EntryTarget`] turns into a command line.

use std::ffi::OsString;
use std::fmt;

use tokio::process::Command;

use crate::resolve::{ArtifactKind, EntryTarget};

/// Builds the command that runs an entry target.
///
/// The [`super::ProcessManager`] owns stdio and process-group setup; a
/// launcher only decides program and arguments.
pub trait Launcher: Send + Sync + fmt::Debug {
    fn command(&self, target: &EntryTarget) -> Command;
}

/// `cargo run --quiet --manifest-path <manifest> --bin|--example <artifact>`.
#[derive(Debug, Clone)]
pub struct CargoRunLauncher {
    cargo: OsString,
    offline: bool,
    args: Vec<OsString>,
}

impl Default for CargoRunLauncher {
    fn default() -> Self {
        Self {
            cargo: std::env::var_os("CARGO").unwrap_or_else(|| OsString::from("cargo")),
            offline: false,
            args: Vec::new(),
        }
    }
}

impl CargoRunLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Arguments passed through to the program after `--`.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl Launcher for CargoRunLauncher {
    fn command(&self, target: &EntryTarget) -> Command {
        let artifact = &target.artifact;
        let mut cmd = Command::new(&self.cargo);
        cmd.arg("run").arg("--quiet");
        if self.offline {
            cmd.arg("--offline");
        }
        if let Some(manifest) = &artifact.manifest {
            cmd.arg("--manifest-path").arg(manifest);
        } else if let Some(dir) = target.entry.parent() {
            cmd.current_dir(dir);
        }
        cmd.arg(match artifact.kind {
            ArtifactKind::Bin => "--bin",
            ArtifactKind::Example => "--example",
        })
        .arg(&artifact.name);
        if !self.args.is_empty() {
            cmd.arg("--").args(&self.args);
        }
        cmd
    }
}

/// `<program> [args...] <entry>`, for interpreted entry points.
#[derive(Debug, Clone)]
pub struct ProgramLauncher {
    program: OsString,
    args: Vec<OsString>,
}

impl ProgramLauncher {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl Launcher for ProgramLauncher {
    fn command(&self, target: &EntryTarget) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(&target.entry);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::resolve::Artifact;

    fn target(kind: ArtifactKind) -> EntryTarget {
        EntryTarget {
            entry: PathBuf::from("/ws/app/src/main.rs"),
            artifact: Artifact {
                name: "app".into(),
                kind,
                manifest: Some(PathBuf::from("/ws/app/Cargo.toml")),
            },
        }
    }

    fn argv(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn cargo_run_addresses_bins_and_examples() {
        let launcher = CargoRunLauncher::new().offline(true);
        assert_eq!(
            argv(&launcher.command(&target(ArtifactKind::Bin))),
            vec!["run", "--quiet", "--offline", "--manifest-path", "/ws/app/Cargo.toml", "--bin", "app"]
        );

        let launcher = CargoRunLauncher::new().args(["--port", "8080"]);
        assert_eq!(
            argv(&launcher.command(&target(ArtifactKind::Example))),
            vec![
                "run",
                "--quiet",
                "--manifest-path",
                "/ws/app/Cargo.toml",
                "--example",
                "app",
                "--",
                "--port",
                "8080"
            ]
        );
    }

    #[test]
    fn program_launcher_appends_the_entry() {
        let launcher = ProgramLauncher::new("python3").arg("-u");
        let cmd = launcher.command(&target(ArtifactKind::Bin));
        assert_eq!(cmd.as_std().get_program(), "python3");
        assert_eq!(argv(&cmd), vec!["-u", "/ws/app/src/main.rs"]);
    }
}
