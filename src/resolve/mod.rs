// src/resolve/mod.rs

//! Dependency resolution: which directories does the entry program read?
//!
//! The walk itself ([`DependencyResolver`]) knows nothing about any build
//! system. Package discovery is delegated to an [`ImportSource`]:
//!
//! - [`cargo`] implements it on top of `cargo metadata`.
//! - Tests plug in an in-memory graph.
//!
//! The walk records what it saw into an [`ImportGraph`] and accumulates the
//! owning directories of every non-platform package into a [`WatchSet`].

pub mod cargo;
pub mod graph;

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tracing::debug;

use crate::errors::{Result, TreeloadError};
use crate::watch::WatchSet;

pub use cargo::CargoImportSource;
pub use graph::ImportGraph;

/// How the build backend should address an executable target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Bin,
    Example,
}

/// The runnable thing an entry file builds into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub kind: ArtifactKind,
    /// Build manifest owning the artifact, if the ecosystem has one.
    pub manifest: Option<PathBuf>,
}

/// One node of the import graph as reported by an [`ImportSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    /// Stable identity, unique within one load.
    pub id: String,
    /// Human-readable name for logs and error chains.
    pub name: String,
    /// Directories whose files feed this package's build.
    pub dirs: Vec<PathBuf>,
    /// Part of the platform/standard library (or otherwise immutable input):
    /// never walked, never watched.
    pub platform: bool,
    /// Present when this package is the entry and builds an executable.
    pub artifact: Option<Artifact>,
}

impl PackageInfo {
    pub fn new(id: impl Into<String>, dirs: Vec<PathBuf>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            dirs,
            platform: false,
            artifact: None,
        }
    }
}

/// Pluggable "resolve imports of module M" capability.
pub trait ImportSource: Send {
    /// Extension of the ecosystem's source files, without the dot.
    fn native_extension(&self) -> &str;

    /// Snapshot the package graph around `entry` and return the package the
    /// entry belongs to. Called once per resolution.
    fn load<'a>(
        &'a mut self,
        entry: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<PackageInfo>> + Send + 'a>>;

    /// Direct imports of `package`, as of the last [`ImportSource::load`].
    fn imports_of(&self, package: &PackageInfo) -> Result<Vec<PackageInfo>>;
}

/// The executable a resolution settled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTarget {
    pub entry: PathBuf,
    pub artifact: Artifact,
}

/// Output of one successful resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub target: EntryTarget,
    pub watch_set: WatchSet,
    pub graph: ImportGraph,
}

/// Walks the import graph of the entry program.
pub struct DependencyResolver {
    source: Box<dyn ImportSource>,
    max_depth: usize,
}

impl DependencyResolver {
    pub fn new(source: Box<dyn ImportSource>, max_depth: usize) -> Self {
        Self { source, max_depth }
    }

    pub fn native_extension(&self) -> &str {
        self.source.native_extension()
    }

    /// Resolve the full watch set for `entry`.
    ///
    /// Either returns a complete [`Resolution`] or an error; nothing the
    /// caller holds is touched on failure.
    pub async fn resolve(&mut self, entry: &Path) -> Result<Resolution> {
        let root = self.source.load(entry).await?;
        let Some(artifact) = root.artifact.clone() else {
            return Err(TreeloadError::invalid_entry(
                entry,
                format!("package `{}` is not an executable entry point", root.name),
            ));
        };

        let mut walk = Walk::new(self.source.as_ref(), self.max_depth);
        if let Some(dir) = entry.parent() {
            walk.watch_set.insert(dir);
        }
        walk.visit(&root, 0)?;

        debug!(
            packages = walk.graph.package_count(),
            imports = walk.graph.import_count(),
            dirs = walk.watch_set.len(),
            "import graph resolved"
        );

        Ok(Resolution {
            target: EntryTarget {
                entry: entry.to_path_buf(),
                artifact,
            },
            watch_set: walk.watch_set,
            graph: walk.graph,
        })
    }
}

/// State of one depth-first walk.
struct Walk<'a> {
    source: &'a dyn ImportSource,
    max_depth: usize,
    /// Packages whose whole subtree is done; reaching one again is a diamond.
    visited: HashSet<String>,
    /// Current import chain (id, name); reaching one of these is a cycle.
    chain: Vec<(String, String)>,
    graph: ImportGraph,
    watch_set: WatchSet,
}

impl<'a> Walk<'a> {
    fn new(source: &'a dyn ImportSource, max_depth: usize) -> Self {
        Self {
            source,
            max_depth,
            visited: HashSet::new(),
            chain: Vec::new(),
            graph: ImportGraph::new(),
            watch_set: WatchSet::new(),
        }
    }

    fn visit(&mut self, package: &PackageInfo, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(self.exceeded(&package.name));
        }
        if self.visited.contains(&package.id) {
            return Ok(());
        }

        self.graph.add_package(&package.id);
        self.watch_set.extend(package.dirs.iter().cloned());
        self.chain.push((package.id.clone(), package.name.clone()));

        let source = self.source;
        for import in source.imports_of(package)? {
            if import.platform {
                continue;
            }
            self.graph.add_import(&package.id, &import.id);
            if self.chain.iter().any(|(id, _)| *id == import.id) {
                return Err(self.exceeded(&import.name));
            }
            self.visit(&import, depth + 1)?;
        }

        self.chain.pop();
        self.visited.insert(package.id.clone());
        Ok(())
    }

    fn exceeded(&self, last: &str) -> TreeloadError {
        let mut chain: Vec<String> = self.chain.iter().map(|(_, name)| name.clone()).collect();
        chain.push(last.to_string());
        TreeloadError::DepthExceeded {
            limit: self.max_depth,
            chain,
        }
    }
}
