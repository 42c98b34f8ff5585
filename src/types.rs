use std::str::FromStr;

use clap::ValueEnum;
use serde::Deserialize;

/// Which `should_reload` policy gates accepted write events.
///
/// - `All`: every relevant write starts a reload cycle (default).
/// - `Debounce`: writes landing within the debounce window of the last
///   accepted one are dropped.
/// - `Hash`: a write only counts when the file's content hash changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReloadPolicyKind {
    #[default]
    All,
    Debounce,
    Hash,
}

impl FromStr for ReloadPolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(ReloadPolicyKind::All),
            "debounce" => Ok(ReloadPolicyKind::Debounce),
            "hash" => Ok(ReloadPolicyKind::Hash),
            other => Err(format!(
                "invalid reload policy: {other} (expected \"all\", \"debounce\" or \"hash\")"
            )),
        }
    }
}

/// Default recursion bound for the import graph walk.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Default debounce window, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;
