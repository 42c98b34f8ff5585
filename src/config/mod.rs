// src/config/mod.rs

//! Construction-time configuration.
//!
//! - [`model`] holds the raw TOML file shape and the programmatic [`Options`].
//! - [`loader`] reads the TOML file and merges it with CLI flags.
//! - [`validate`] turns [`Options`] into normalized [`Settings`].

pub mod loader;
pub mod model;
pub mod validate;

use std::path::PathBuf;
use std::time::Duration;

use crate::types::ReloadPolicyKind;
use crate::watch::filter::{ExtensionFilter, IgnoreSet};

pub use loader::{load_from_path, options_from_sources};
pub use model::{Options, RawConfigFile};

/// Validated, per-instance settings. Nothing here is process-global, so
/// several reload loops can live in one process.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Absolute path of the entry source file.
    pub entry: PathBuf,
    pub extensions: ExtensionFilter,
    pub ignore: IgnoreSet,
    pub verbose: bool,
    pub max_depth: usize,
    pub policy: ReloadPolicyKind,
    pub debounce: Duration,
}
