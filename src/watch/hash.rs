use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// Compute the hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Last known content hash per file.
///
/// Only files that were actually written are ever hashed; nothing is
/// precomputed for the rest of the watch set.
#[derive(Debug, Default)]
pub struct HashCache {
    hashes: HashMap<PathBuf, String>,
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehash `path` and remember the result.
    ///
    /// Returns true when the content differs from the previous hash, or when
    /// the file had never been hashed.
    pub fn refresh(&mut self, fs: &dyn FileSystem, path: &Path) -> Result<bool> {
        let hash = compute_file_hash(fs, path)?;
        let previous = self.hashes.insert(path.to_path_buf(), hash.clone());
        let changed = previous.as_deref() != Some(hash.as_str());
        debug!(path = ?path, hash = %hash, changed, "rehashed file");
        Ok(changed)
    }

    pub fn forget(&mut self, path: &Path) {
        if self.hashes.remove(path).is_some() {
            debug!("dropped cached hash for {:?}", path);
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
