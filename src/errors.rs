// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Configuration errors are returned straight to the caller of
//! [`crate::loader::TreeloaderBuilder::start`]. Everything raised once the
//! actors are running travels through the error sink instead.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeloadError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Dependency resolution error: {0}")]
    DependencyResolution(String),

    #[error("Import graph exceeds depth limit of {limit}: {}", .chain.join(" -> "))]
    DepthExceeded { limit: usize, chain: Vec<String> },

    #[error("Watch error on {path:?}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Shutdown failed: {}", ShutdownList(.0))]
    Shutdown(Vec<TreeloadError>),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TreeloadError {
    /// The entry could not be mapped to an executable package.
    pub fn invalid_entry(entry: &std::path::Path, why: impl fmt::Display) -> Self {
        TreeloadError::DependencyResolution(format!("invalid entry {:?}: {why}", entry))
    }
}

/// Failures of the process-group lifecycle.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to start {artifact:?}: {source}")]
    Spawn {
        artifact: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to kill process group {pid}: {source}")]
    Kill {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("process {pid} ended abnormally: {status}")]
    AbnormalExit { pid: u32, status: String },

    #[error("cannot {op} while the process is {state}")]
    InvalidState { op: &'static str, state: &'static str },
}

struct ShutdownList<'a>(&'a [TreeloadError]);

impl fmt::Display for ShutdownList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TreeloadError>;
