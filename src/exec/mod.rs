// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`launcher`] turns a resolved entry target into a command line
//!   (`cargo run`, or an arbitrary interpreter for tests).
//! - [`process`] owns the single live child and its Idle/Running lifecycle.
//! - [`group`] isolates the child in its own process group and kills the
//!   whole group at once.

pub mod group;
pub mod launcher;
pub mod process;

pub use launcher::{CargoRunLauncher, Launcher, ProgramLauncher};
pub use process::{CommandDescriptor, ProcessManager, ProcessState};
