// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod loader;
pub mod logging;
pub mod resolve;
pub mod types;
pub mod watch;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::Options;
use crate::config::loader::{discover_config, load_from_path, offline_requested};
use crate::exec::CargoRunLauncher;
use crate::resolve::CargoImportSource;

pub use crate::config::options_from_sources;
pub use crate::engine::ReloadNotification;
pub use crate::errors::TreeloadError;
pub use crate::loader::{Treeloader, TreeloaderBuilder};

/// Everything the binary needs, merged from flags and the config file.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub options: Options,
    pub offline: bool,
    pub program_args: Vec<String>,
}

/// Load the config file (explicit `--config`, or `Treeload.toml` in the
/// working directory) and merge the CLI flags over it.
pub fn prepare(args: &CliArgs) -> Result<Invocation> {
    let file = match discover_config(args.config.as_deref()) {
        Some(path) => {
            debug!(config = ?path, "loading config file");
            let raw = load_from_path(&path)
                .with_context(|| format!("loading config file {:?}", path))?;
            Some(raw)
        }
        None => None,
    };

    Ok(Invocation {
        offline: offline_requested(args, file.as_ref()),
        options: options_from_sources(args, file),
        program_args: args.args.clone(),
    })
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - the cargo import source and `cargo run` launcher
/// - the reload loop
/// - Ctrl-C handling
pub async fn run(invocation: Invocation) -> Result<()> {
    let Invocation {
        options,
        offline,
        program_args,
    } = invocation;

    let mut loader = Treeloader::builder(options)
        .import_source(CargoImportSource::default().offline(offline))
        .launcher(CargoRunLauncher::new().offline(offline).args(program_args))
        .start()?;

    info!(
        entry = ?loader.settings().entry,
        extensions = %loader.settings().extensions,
        "watching for changes; press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("listening for Ctrl-C")?;
    info!("Ctrl-C received; shutting down");

    loader.close().await?;
    Ok(())
}
