// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::CliArgs;
use crate::config::model::{Options, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path.
///
/// This only performs TOML deserialization; semantic checks happen in
/// [`Options::validate`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Pick up `Treeload.toml` from the current directory when it exists and no
/// explicit `--config` was given.
pub fn discover_config(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = default_config_path();
            default.is_file().then_some(default)
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("Treeload.toml")
}

/// Merge CLI flags over an optional config file. Flags win.
pub fn options_from_sources(args: &CliArgs, file: Option<RawConfigFile>) -> Options {
    let file = file.unwrap_or_default();
    let mut opts = Options::new(args.entry.clone());

    opts.extensions = if args.extensions.is_empty() {
        file.watch.extensions
    } else {
        args.extensions.clone()
    };
    opts.verbose = args.verbose || file.verbose.unwrap_or(false);
    if let Some(depth) = args.max_depth.or(file.resolve.max_depth) {
        opts.max_depth = depth;
    }
    opts.ignore = file.watch.ignore;
    opts.ignore.extend(args.ignore.iter().cloned());
    if let Some(policy) = args.policy.or(file.reload.policy) {
        opts.policy = policy;
    }
    if let Some(ms) = args.debounce_ms.or(file.reload.debounce_ms) {
        opts.debounce = Duration::from_millis(ms);
    }
    opts
}

/// Whether `--offline` was requested by either source.
pub fn offline_requested(args: &CliArgs, file: Option<&RawConfigFile>) -> bool {
    args.offline || file.and_then(|f| f.resolve.offline).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReloadPolicyKind;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn flags_override_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
verbose = true

[watch]
extensions = ["toml"]
ignore = ["**/gen/**"]

[reload]
policy = "hash"

[resolve]
max_depth = 7
offline = true
"#
        )
        .unwrap();
        let raw = load_from_path(file.path()).unwrap();
        let args = CliArgs::try_parse_from([
            "treeload",
            "-e",
            "rs",
            "--ignore",
            "*.bak",
            "--policy",
            "debounce",
            "main.rs",
        ])
        .unwrap();

        assert!(offline_requested(&args, Some(&raw)));
        let opts = options_from_sources(&args, Some(raw));
        assert_eq!(opts.extensions, vec!["rs".to_string()]);
        assert!(opts.verbose);
        assert_eq!(opts.max_depth, 7);
        assert_eq!(opts.ignore, vec!["**/gen/**".to_string(), "*.bak".to_string()]);
        assert_eq!(opts.policy, ReloadPolicyKind::Debounce);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[watch]\nextension = [\"rs\"]\n").unwrap();
        assert!(load_from_path(file.path()).is_err());
    }
}
