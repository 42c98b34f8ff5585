//! In-memory [`ImportSource`] whose graph tests can rewrite between cycles.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use treeload::errors::{Result, TreeloadError};
use treeload::resolve::{Artifact, ArtifactKind, ImportSource, PackageInfo};

#[derive(Debug, Clone)]
struct PackageNode {
    dirs: Vec<PathBuf>,
    imports: Vec<String>,
    platform: bool,
}

/// Runs at the start of every load, outside the state lock.
#[derive(Clone)]
struct LoadHook(Arc<dyn Fn() + Send + Sync>);

impl fmt::Debug for LoadHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LoadHook")
    }
}

#[derive(Debug, Default)]
struct State {
    entry: Option<String>,
    packages: BTreeMap<String, PackageNode>,
    failure: Option<String>,
    loads: usize,
    on_load: Option<LoadHook>,
}

/// Package graph keyed by id. Clones share state, so a test keeps one clone
/// as a control handle and hands the other to the loader.
///
/// ```ignore
/// let graph = MemoryImportSource::new()
///     .entry("app", "/ws/app")
///     .package("core", "/ws/core", &[])
///     .imports("app", &["core"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryImportSource {
    state: Arc<Mutex<State>>,
}

impl MemoryImportSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// The executable package; built as a `bin` artifact named `id`.
    pub fn entry(self, id: &str, dir: impl Into<PathBuf>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.entry = Some(id.to_string());
            state.packages.insert(id.to_string(), node(dir.into(), false));
        }
        self
    }

    pub fn package(self, id: &str, dir: impl Into<PathBuf>, imports: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .packages
            .insert(id.to_string(), node(dir.into(), false));
        self.set_imports(id, imports);
        self
    }

    /// A platform package: reported as an import, never watched.
    pub fn platform(self, id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .packages
            .insert(id.to_string(), node(PathBuf::from(format!("/platform/{id}")), true));
        self
    }

    pub fn imports(self, id: &str, imports: &[&str]) -> Self {
        self.set_imports(id, imports);
        self
    }

    /// Rewrite the direct imports of `id`; picked up by the next resolution.
    pub fn set_imports(&self, id: &str, imports: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let pkg = state
            .packages
            .get_mut(id)
            .unwrap_or_else(|| panic!("unknown package {id}"));
        pkg.imports = imports.iter().map(|s| s.to_string()).collect();
    }

    /// Make every following load fail with `reason`, or succeed again with
    /// `None`.
    pub fn set_failure(&self, reason: Option<&str>) {
        self.state.lock().unwrap().failure = reason.map(str::to_string);
    }

    /// Call `hook` whenever a resolution starts, e.g. to look at the world
    /// the resolver runs in.
    pub fn on_load(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.state.lock().unwrap().on_load = Some(LoadHook(Arc::new(hook)));
    }

    /// How many resolutions have started.
    pub fn loads(&self) -> usize {
        self.state.lock().unwrap().loads
    }

    fn info(state: &State, id: &str) -> Result<PackageInfo> {
        let pkg = state.packages.get(id).ok_or_else(|| {
            TreeloadError::DependencyResolution(format!("unknown package `{id}`"))
        })?;
        let mut info = PackageInfo::new(id, pkg.dirs.clone());
        info.platform = pkg.platform;
        if state.entry.as_deref() == Some(id) {
            info.artifact = Some(Artifact {
                name: id.to_string(),
                kind: ArtifactKind::Bin,
                manifest: None,
            });
        }
        Ok(info)
    }
}

fn node(dir: PathBuf, platform: bool) -> PackageNode {
    PackageNode {
        dirs: vec![dir],
        imports: Vec::new(),
        platform,
    }
}

impl ImportSource for MemoryImportSource {
    fn native_extension(&self) -> &str {
        "rs"
    }

    fn load<'a>(
        &'a mut self,
        entry: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<PackageInfo>> + Send + 'a>> {
        let hook = self.state.lock().unwrap().on_load.clone();
        if let Some(LoadHook(hook)) = hook {
            hook();
        }
        let result = {
            let mut state = self.state.lock().unwrap();
            state.loads += 1;
            match (&state.failure, &state.entry) {
                (Some(reason), _) => Err(TreeloadError::DependencyResolution(reason.clone())),
                (None, None) => Err(TreeloadError::invalid_entry(entry, "no entry package")),
                (None, Some(id)) => Self::info(&state, id),
            }
        };
        Box::pin(async move { result })
    }

    fn imports_of(&self, package: &PackageInfo) -> Result<Vec<PackageInfo>> {
        let state = self.state.lock().unwrap();
        let pkg = state.packages.get(&package.id).ok_or_else(|| {
            TreeloadError::DependencyResolution(format!("unknown package `{}`", package.id))
        })?;
        pkg.imports.iter().map(|id| Self::info(&state, id)).collect()
    }
}
