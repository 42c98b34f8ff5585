// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::ReloadPolicyKind;

/// Command-line arguments for `treeload`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "treeload",
    version,
    about = "Rebuild and restart a program whenever a source it imports changes.",
    long_about = None
)]
pub struct CliArgs {
    /// Entry source file of the program to run (e.g. `src/main.rs`).
    #[arg(value_name = "ENTRY")]
    pub entry: PathBuf,

    /// Comma delimited list of file extensions to watch (defaults to `rs`).
    #[arg(short, long, value_delimiter = ',', value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Log every watch change and every spawn/kill.
    #[arg(short, long)]
    pub verbose: bool,

    /// Maximum import depth before resolution gives up.
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Which writes are allowed to start a reload cycle.
    #[arg(long, value_enum, value_name = "POLICY")]
    pub policy: Option<ReloadPolicyKind>,

    /// Debounce window for `--policy debounce`.
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Glob of paths whose writes never trigger a reload. Repeatable.
    #[arg(long, value_name = "GLOB")]
    pub ignore: Vec<String>,

    /// Resolve the package graph without touching the network.
    #[arg(long)]
    pub offline: bool,

    /// Optional TOML config file. Flags given here win over the file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TREELOAD_LOG` or a verbosity-based default is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Arguments handed to the program, after `--`.
    #[arg(last = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_split_on_commas() {
        let args = CliArgs::try_parse_from(["treeload", "-e", "rs,.toml", "-v", "src/main.rs"])
            .expect("valid args");
        assert_eq!(args.extensions, vec!["rs".to_string(), ".toml".to_string()]);
        assert!(args.verbose);
        assert_eq!(args.entry, PathBuf::from("src/main.rs"));
    }

    #[test]
    fn policy_is_a_value_enum() {
        let args = CliArgs::try_parse_from(["treeload", "--policy", "hash", "main.rs"])
            .expect("valid args");
        assert_eq!(args.policy, Some(ReloadPolicyKind::Hash));
    }

    #[test]
    fn trailing_args_go_to_the_program() {
        let args = CliArgs::try_parse_from(["treeload", "src/main.rs", "--", "--port", "8080"])
            .expect("valid args");
        assert_eq!(args.args, vec!["--port".to_string(), "8080".to_string()]);
        assert!(args.ignore.is_empty());
    }
}
