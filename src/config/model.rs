// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{DEFAULT_DEBOUNCE_MS, DEFAULT_MAX_DEPTH, ReloadPolicyKind};

/// Optional TOML configuration file.
///
/// ```toml
/// verbose = true
///
/// [watch]
/// extensions = ["rs", "toml"]
/// ignore = ["**/generated/**"]
///
/// [reload]
/// policy = "debounce"
/// debounce_ms = 300
///
/// [resolve]
/// max_depth = 50
/// offline = true
/// ```
///
/// All sections are optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub verbose: Option<bool>,

    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub reload: ReloadSection,

    #[serde(default)]
    pub resolve: ResolveSection,
}

/// `[watch]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchSection {
    #[serde(default)]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub ignore: Vec<String>,
}

/// `[reload]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReloadSection {
    #[serde(default)]
    pub policy: Option<ReloadPolicyKind>,

    #[serde(default)]
    pub debounce_ms: Option<u64>,
}

/// `[resolve]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveSection {
    #[serde(default)]
    pub max_depth: Option<usize>,

    #[serde(default)]
    pub offline: Option<bool>,
}

/// Everything needed to construct a reload loop, before validation.
///
/// Paths and extensions are taken as given; [`Options::validate`] turns this
/// into normalized [`super::Settings`].
#[derive(Debug, Clone)]
pub struct Options {
    /// Entry source file of the watched program. Required.
    pub entry: PathBuf,
    /// Extension allow-list; empty means "the native source extension".
    pub extensions: Vec<String>,
    pub verbose: bool,
    pub max_depth: usize,
    pub ignore: Vec<String>,
    pub policy: ReloadPolicyKind,
    pub debounce: Duration,
}

impl Options {
    pub fn new(entry: impl Into<PathBuf>) -> Self {
        Self {
            entry: entry.into(),
            ..Self::default()
        }
    }

    pub fn extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = exts.into_iter().map(Into::into).collect();
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn ignore(mut self, glob: impl Into<String>) -> Self {
        self.ignore.push(glob.into());
        self
    }

    pub fn policy(mut self, policy: ReloadPolicyKind) -> Self {
        self.policy = policy;
        self
    }

    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            entry: PathBuf::new(),
            extensions: Vec::new(),
            verbose: false,
            max_depth: DEFAULT_MAX_DEPTH,
            ignore: Vec::new(),
            policy: ReloadPolicyKind::default(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}
