// src/resolve/cargo.rs

//! [`ImportSource`] backed by `cargo metadata`.
//!
//! - The package owning the entry is found by matching the entry file against
//!   every target's `src_path`.
//! - Registry and git packages count as platform packages: they cannot be
//!   edited in place, so watching them is pointless.
//! - Dev-only edges are dropped; they do not feed the running binary.

use std::collections::{BTreeSet, HashMap};
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::{Result, TreeloadError};
use crate::fs::{FileSystem, RealFileSystem};
use crate::resolve::{Artifact, ArtifactKind, ImportSource, PackageInfo};

/// Target kinds whose sources are compiled into a dependent's binary.
const LINKED_KINDS: &[&str] = &[
    "lib",
    "rlib",
    "dylib",
    "cdylib",
    "staticlib",
    "proc-macro",
    "custom-build",
];

#[derive(Debug, Deserialize)]
struct Metadata {
    packages: Vec<MetaPackage>,
    resolve: Option<MetaResolve>,
}

#[derive(Debug, Clone, Deserialize)]
struct MetaPackage {
    id: String,
    name: String,
    manifest_path: PathBuf,
    source: Option<String>,
    #[serde(default)]
    targets: Vec<MetaTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct MetaTarget {
    name: String,
    kind: Vec<String>,
    src_path: PathBuf,
}

impl MetaTarget {
    fn has_kind(&self, kind: &str) -> bool {
        self.kind.iter().any(|k| k == kind)
    }
}

#[derive(Debug, Deserialize)]
struct MetaResolve {
    nodes: Vec<MetaNode>,
}

#[derive(Debug, Deserialize)]
struct MetaNode {
    id: String,
    #[serde(default)]
    deps: Vec<MetaDep>,
}

#[derive(Debug, Deserialize)]
struct MetaDep {
    pkg: String,
    #[serde(default)]
    dep_kinds: Vec<MetaDepKind>,
}

#[derive(Debug, Deserialize)]
struct MetaDepKind {
    kind: Option<String>,
}

impl MetaDep {
    /// Older cargo versions omit `dep_kinds`; treat that as a normal edge.
    fn is_dev_only(&self) -> bool {
        !self.dep_kinds.is_empty()
            && self
                .dep_kinds
                .iter()
                .all(|k| k.kind.as_deref() == Some("dev"))
    }
}

/// One `cargo metadata` result, indexed for the walk.
#[derive(Debug, Default)]
struct Snapshot {
    packages: HashMap<String, MetaPackage>,
    imports: HashMap<String, Vec<String>>,
}

impl Snapshot {
    fn from_metadata(metadata: Metadata) -> Self {
        let imports = metadata
            .resolve
            .map(|r| {
                r.nodes
                    .into_iter()
                    .map(|node| {
                        let deps = node
                            .deps
                            .into_iter()
                            .filter(|d| !d.is_dev_only())
                            .map(|d| d.pkg)
                            .collect();
                        (node.id, deps)
                    })
                    .collect()
            })
            .unwrap_or_default();
        let packages = metadata
            .packages
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        Self { packages, imports }
    }
}

/// Resolves imports through cargo's package graph.
#[derive(Debug)]
pub struct CargoImportSource {
    fs: Arc<dyn FileSystem>,
    cargo: OsString,
    offline: bool,
    snapshot: Snapshot,
}

impl Default for CargoImportSource {
    fn default() -> Self {
        Self::new(Arc::new(RealFileSystem))
    }
}

impl CargoImportSource {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            cargo: std::env::var_os("CARGO").unwrap_or_else(|| OsString::from("cargo")),
            offline: false,
            snapshot: Snapshot::default(),
        }
    }

    /// Pass `--offline` to `cargo metadata`.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    async fn fetch_metadata(&self, manifest: &Path) -> Result<Metadata> {
        let mut cmd = Command::new(&self.cargo);
        cmd.arg("metadata")
            .arg("--format-version")
            .arg("1")
            .arg("--manifest-path")
            .arg(manifest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if self.offline {
            cmd.arg("--offline");
        }

        debug!(manifest = ?manifest, "running cargo metadata");
        let output = cmd.output().await.map_err(|e| {
            TreeloadError::DependencyResolution(format!("failed to run cargo metadata: {e}"))
        })?;
        if !output.status.success() {
            return Err(TreeloadError::DependencyResolution(format!(
                "cargo metadata failed for {:?}: {}",
                manifest,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        serde_json::from_slice(&output.stdout).map_err(|e| {
            TreeloadError::DependencyResolution(format!("unreadable cargo metadata: {e}"))
        })
    }

    /// Map the entry file onto the package and target it is the root of.
    fn entry_package(&self, entry: &Path) -> Result<PackageInfo> {
        let wanted = self.canonical(entry);
        let found = self.snapshot.packages.values().find_map(|pkg| {
            pkg.targets
                .iter()
                .find(|t| self.canonical(&t.src_path) == wanted)
                .map(|t| (pkg, t))
        });
        let Some((pkg, target)) = found else {
            return Err(TreeloadError::invalid_entry(
                entry,
                "not the root source file of any cargo target",
            ));
        };

        let kind = if target.has_kind("bin") {
            ArtifactKind::Bin
        } else if target.has_kind("example") {
            ArtifactKind::Example
        } else {
            return Err(TreeloadError::invalid_entry(
                entry,
                format!(
                    "target `{}` is a {} target, not an executable entry point",
                    target.name,
                    target.kind.join("/")
                ),
            ));
        };

        let mut info = self.package_info(pkg, Some(target));
        info.artifact = Some(Artifact {
            name: target.name.clone(),
            kind,
            manifest: Some(pkg.manifest_path.clone()),
        });
        Ok(info)
    }

    fn package_info(&self, pkg: &MetaPackage, entry_target: Option<&MetaTarget>) -> PackageInfo {
        let platform = pkg.source.is_some();
        PackageInfo {
            id: pkg.id.clone(),
            name: pkg.name.clone(),
            dirs: if platform {
                Vec::new()
            } else {
                self.source_dirs(pkg, entry_target)
            },
            platform,
            artifact: None,
        }
    }

    /// Manifest directory plus every directory under the roots of the
    /// targets that end up in the entry binary.
    fn source_dirs(&self, pkg: &MetaPackage, entry_target: Option<&MetaTarget>) -> Vec<PathBuf> {
        let Some(manifest_dir) = pkg.manifest_path.parent() else {
            return Vec::new();
        };
        let mut dirs = BTreeSet::new();
        dirs.insert(manifest_dir.to_path_buf());

        for target in &pkg.targets {
            let relevant = entry_target == Some(target)
                || LINKED_KINDS.iter().any(|k| target.has_kind(k));
            if !relevant {
                continue;
            }
            let Some(root) = target.src_path.parent() else {
                continue;
            };
            // build.rs and friends live next to Cargo.toml; do not sweep the
            // whole package for them.
            if root != manifest_dir {
                collect_dirs(self.fs.as_ref(), root, &mut dirs);
            }
        }
        dirs.into_iter().collect()
    }

    fn canonical(&self, path: &Path) -> PathBuf {
        self.fs
            .canonicalize(path)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    #[cfg(test)]
    fn ingest(&mut self, json: &str) {
        let metadata: Metadata = serde_json::from_str(json).expect("valid metadata json");
        self.snapshot = Snapshot::from_metadata(metadata);
    }
}

impl ImportSource for CargoImportSource {
    fn native_extension(&self) -> &str {
        "rs"
    }

    fn load<'a>(
        &'a mut self,
        entry: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<PackageInfo>> + Send + 'a>> {
        Box::pin(async move {
            let manifest = find_manifest(self.fs.as_ref(), entry).ok_or_else(|| {
                TreeloadError::invalid_entry(entry, "no Cargo.toml in any parent directory")
            })?;
            let metadata = self.fetch_metadata(&manifest).await?;
            self.snapshot = Snapshot::from_metadata(metadata);
            self.entry_package(entry)
        })
    }

    fn imports_of(&self, package: &PackageInfo) -> Result<Vec<PackageInfo>> {
        let Some(deps) = self.snapshot.imports.get(&package.id) else {
            return Ok(Vec::new());
        };
        deps.iter()
            .map(|id| {
                self.snapshot
                    .packages
                    .get(id)
                    .map(|pkg| self.package_info(pkg, None))
                    .ok_or_else(|| {
                        TreeloadError::DependencyResolution(format!(
                            "`{}` imports unknown package {id}",
                            package.name
                        ))
                    })
            })
            .collect()
    }
}

/// Nearest `Cargo.toml` at or above the entry's directory.
pub fn find_manifest(fs: &dyn FileSystem, entry: &Path) -> Option<PathBuf> {
    entry
        .ancestors()
        .skip(1)
        .map(|dir| dir.join("Cargo.toml"))
        .find(|candidate| fs.is_file(candidate))
}

fn collect_dirs(fs: &dyn FileSystem, dir: &Path, out: &mut BTreeSet<PathBuf>) {
    if !fs.is_dir(dir) || !out.insert(dir.to_path_buf()) {
        return;
    }
    let children = match fs.read_dir(dir) {
        Ok(children) => children,
        Err(err) => {
            warn!(dir = ?dir, error = %err, "cannot list source directory");
            return;
        }
    };
    for child in children {
        let skip = child
            .file_name()
            .and_then(|n| n.to_str())
            .is_none_or(|n| n.starts_with('.') || n == "target");
        if !skip && fs.is_dir(&child) {
            collect_dirs(fs, &child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    const METADATA: &str = r#"{
      "packages": [
        {
          "id": "path+file:///ws/app#0.1.0",
          "name": "app",
          "manifest_path": "/ws/app/Cargo.toml",
          "source": null,
          "targets": [
            {"name": "app", "kind": ["bin"], "src_path": "/ws/app/src/main.rs"},
            {"name": "demo", "kind": ["example"], "src_path": "/ws/app/examples/demo.rs"},
            {"name": "build-script-build", "kind": ["custom-build"], "src_path": "/ws/app/build.rs"}
          ]
        },
        {
          "id": "path+file:///ws/core#0.1.0",
          "name": "core-lib",
          "manifest_path": "/ws/core/Cargo.toml",
          "source": null,
          "targets": [
            {"name": "core_lib", "kind": ["lib"], "src_path": "/ws/core/src/lib.rs"},
            {"name": "smoke", "kind": ["test"], "src_path": "/ws/core/tests/smoke.rs"}
          ]
        },
        {
          "id": "registry+https://github.com/rust-lang/crates.io-index#serde@1.0.0",
          "name": "serde",
          "manifest_path": "/home/.cargo/registry/serde/Cargo.toml",
          "source": "registry+https://github.com/rust-lang/crates.io-index",
          "targets": [
            {"name": "serde", "kind": ["lib"], "src_path": "/home/.cargo/registry/serde/src/lib.rs"}
          ]
        },
        {
          "id": "path+file:///ws/testkit#0.1.0",
          "name": "testkit",
          "manifest_path": "/ws/testkit/Cargo.toml",
          "source": null,
          "targets": [
            {"name": "testkit", "kind": ["lib"], "src_path": "/ws/testkit/src/lib.rs"}
          ]
        }
      ],
      "resolve": {
        "nodes": [
          {
            "id": "path+file:///ws/app#0.1.0",
            "deps": [
              {"pkg": "path+file:///ws/core#0.1.0", "dep_kinds": [{"kind": null}]},
              {"pkg": "registry+https://github.com/rust-lang/crates.io-index#serde@1.0.0", "dep_kinds": [{"kind": null}]},
              {"pkg": "path+file:///ws/testkit#0.1.0", "dep_kinds": [{"kind": "dev"}]}
            ]
          },
          {"id": "path+file:///ws/core#0.1.0", "deps": []},
          {"id": "path+file:///ws/testkit#0.1.0", "deps": []}
        ]
      }
    }"#;

    fn workspace() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file("/ws/app/Cargo.toml", "");
        fs.add_file("/ws/app/build.rs", "");
        fs.add_file("/ws/app/src/main.rs", "");
        fs.add_file("/ws/app/src/routes/mod.rs", "");
        fs.add_dir("/ws/app/src/.scratch");
        fs.add_file("/ws/app/examples/demo.rs", "");
        fs.add_file("/ws/core/Cargo.toml", "");
        fs.add_file("/ws/core/src/lib.rs", "");
        fs.add_file("/ws/core/tests/smoke.rs", "");
        fs
    }

    fn source() -> CargoImportSource {
        let mut src = CargoImportSource::new(Arc::new(workspace()));
        src.ingest(METADATA);
        src
    }

    #[test]
    fn manifest_is_found_above_the_entry() {
        let fs = workspace();
        assert_eq!(
            find_manifest(&fs, Path::new("/ws/app/src/routes/mod.rs")),
            Some(PathBuf::from("/ws/app/Cargo.toml"))
        );
        assert_eq!(find_manifest(&fs, Path::new("/elsewhere/main.rs")), None);
    }

    #[test]
    fn bin_entry_maps_to_its_package() {
        let src = source();
        let info = src.entry_package(Path::new("/ws/app/src/main.rs")).unwrap();
        assert_eq!(info.name, "app");
        let artifact = info.artifact.unwrap();
        assert_eq!(artifact.name, "app");
        assert_eq!(artifact.kind, ArtifactKind::Bin);
        assert_eq!(artifact.manifest, Some(PathBuf::from("/ws/app/Cargo.toml")));
        assert_eq!(
            info.dirs,
            vec![
                PathBuf::from("/ws/app"),
                PathBuf::from("/ws/app/src"),
                PathBuf::from("/ws/app/src/routes"),
            ]
        );
    }

    #[test]
    fn example_entry_is_executable() {
        let src = source();
        let info = src.entry_package(Path::new("/ws/app/examples/demo.rs")).unwrap();
        assert_eq!(info.artifact.unwrap().kind, ArtifactKind::Example);
        assert!(info.dirs.contains(&PathBuf::from("/ws/app/examples")));
    }

    #[test]
    fn library_entry_is_rejected() {
        let src = source();
        let err = src.entry_package(Path::new("/ws/core/src/lib.rs")).unwrap_err();
        match err {
            TreeloadError::DependencyResolution(msg) => {
                assert!(msg.contains("not an executable entry point"), "{msg}")
            }
            other => panic!("expected DependencyResolution, got {other:?}"),
        }
    }

    #[test]
    fn unknown_file_is_rejected() {
        let src = source();
        let err = src
            .entry_package(Path::new("/ws/app/src/routes/mod.rs"))
            .unwrap_err();
        assert!(matches!(err, TreeloadError::DependencyResolution(_)));
    }

    #[test]
    fn imports_skip_dev_edges_and_flag_registry_packages() {
        let src = source();
        let root = src.entry_package(Path::new("/ws/app/src/main.rs")).unwrap();
        let imports = src.imports_of(&root).unwrap();
        let names: Vec<&str> = imports.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(imports.len(), 2);
        assert!(names.contains(&"core-lib"));
        assert!(names.contains(&"serde"));
        assert!(!names.contains(&"testkit"));

        let core = imports.iter().find(|p| p.name == "core-lib").unwrap();
        assert!(!core.platform);
        // Test targets do not feed the binary.
        assert_eq!(
            core.dirs,
            vec![PathBuf::from("/ws/core"), PathBuf::from("/ws/core/src")]
        );
        let serde = imports.iter().find(|p| p.name == "serde").unwrap();
        assert!(serde.platform);
        assert!(serde.dirs.is_empty());
    }
}
