//! On-disk cache store
//!
//! A flat directory of files and archives named by hex-encoded cache key.
//! Existence and modification time of an entry are its only metadata. Writes
//! go to a temp name first and are moved into place with an atomic rename,
//! so a concurrent reader never observes a half-written entry.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::cache::{CacheError, CacheKey};
use crate::config::CacheConfig;

/// What kind of artifact an entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// A single executable file
    Binary,

    /// A tar archive bundling a set of intermediate files that must be
    /// restored together
    Bundle,
}

/// Content-addressed store of build artifacts
#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
    max_age: Duration,
    swept: AtomicBool,
}

impl CacheStore {
    /// Open the store for the configured cache directory, creating it if
    /// absent. Directory creation tolerates races with other invocations.
    pub fn open(config: &CacheConfig) -> Result<Self, CacheError> {
        let root = Self::resolve_cache_dir(config.dir.as_deref())?;
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            max_age: Duration::from_secs(config.max_age_days * 24 * 60 * 60),
            swept: AtomicBool::new(false),
        })
    }

    /// Deterministic cache location: the override if given, otherwise the
    /// platform cache home.
    pub fn resolve_cache_dir(dir_override: Option<&Path>) -> Result<PathBuf, CacheError> {
        if let Some(dir) = dir_override {
            return Ok(dir.to_path_buf());
        }
        dirs::cache_dir()
            .map(|base| base.join("lope"))
            .ok_or(CacheError::NoCacheHome)
    }

    /// The store's root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maximum entry age before eviction
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn entry_path(&self, key: &CacheKey, kind: ArtifactKind) -> PathBuf {
        match kind {
            ArtifactKind::Binary => self.root.join(key.as_str()),
            ArtifactKind::Bundle => self.root.join(format!("{key}.tar")),
        }
    }

    /// Look up an entry, lazily evicting it when stale.
    ///
    /// Returns the entry path only if it exists, is usable for its artifact
    /// kind, and is not older than the configured max age. An entry exactly
    /// at the threshold is still valid; a strictly older one is deleted
    /// during the probe and reported as a miss.
    pub fn lookup(
        &self,
        key: &CacheKey,
        kind: ArtifactKind,
    ) -> Result<Option<PathBuf>, CacheError> {
        let path = self.entry_path(key, kind);

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if entry_age(&metadata) > self.max_age {
            debug!(%key, "evicting stale cache entry");
            remove_entry(&path);
            return Ok(None);
        }

        if kind == ArtifactKind::Binary && !is_executable(&metadata) {
            warn!(%key, "cache entry is not executable, treating as miss");
            remove_entry(&path);
            return Ok(None);
        }

        debug!(%key, path = %path.display(), "cache hit");
        Ok(Some(path))
    }

    /// Persist a single executable artifact under the key.
    pub fn store_binary(&self, key: &CacheKey, artifact: &Path) -> Result<PathBuf, CacheError> {
        let dest = self.entry_path(key, ArtifactKind::Binary);

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        let mut reader = fs::File::open(artifact)?;
        std::io::copy(&mut reader, tmp.as_file_mut())?;
        mark_executable(tmp.as_file())?;
        tmp.persist(&dest).map_err(|e| CacheError::Io(e.error))?;

        debug!(%key, dest = %dest.display(), "stored binary artifact");
        Ok(dest)
    }

    /// Persist a set of generated files as one archive under the key.
    ///
    /// The files must live under `dir`; they are archived by their path
    /// relative to it so the set restores into any destination directory.
    pub fn store_bundle(
        &self,
        key: &CacheKey,
        dir: &Path,
        files: &[PathBuf],
    ) -> Result<PathBuf, CacheError> {
        let dest = self.entry_path(key, ArtifactKind::Bundle);

        let tmp = NamedTempFile::new_in(&self.root)?;
        let mut builder = tar::Builder::new(tmp.as_file());
        for file in files {
            let name = file.strip_prefix(dir).map_err(|_| {
                CacheError::Io(std::io::Error::other(format!(
                    "bundle file {} is outside {}",
                    file.display(),
                    dir.display()
                )))
            })?;
            builder.append_path_with_name(file, name)?;
        }
        builder.finish()?;
        drop(builder);
        tmp.persist(&dest).map_err(|e| CacheError::Io(e.error))?;

        debug!(%key, dest = %dest.display(), count = files.len(), "stored bundle artifact");
        Ok(dest)
    }

    /// Restore a bundle's file set into the destination directory.
    pub fn restore_bundle(&self, entry: &Path, dest: &Path) -> Result<(), CacheError> {
        let file = fs::File::open(entry)?;
        let mut archive = tar::Archive::new(file);
        archive.unpack(dest)?;
        debug!(entry = %entry.display(), dest = %dest.display(), "restored bundle");
        Ok(())
    }

    /// Batch eviction of entries older than the configured max age.
    ///
    /// Guarded so repeated calls within one process are no-ops; the runner
    /// invokes this once before any lookup, never concurrently with one.
    /// Deletions of already-deleted files are tolerated: another invocation
    /// may be sweeping the same directory.
    pub fn sweep(&self) -> Result<(), CacheError> {
        if self.swept.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut evicted = 0usize;
        for entry in fs::read_dir(&self.root)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("failed to read cache entry during sweep: {e}");
                    continue;
                }
            };
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if metadata.is_file() && entry_age(&metadata) > self.max_age {
                remove_entry(&entry.path());
                evicted += 1;
            }
        }

        debug!(evicted, "cache sweep complete");
        Ok(())
    }

    /// Remove every entry in the store.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let mut removed = 0usize;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.metadata().map(|m| m.is_file()).unwrap_or(false) {
                remove_entry(&entry.path());
                removed += 1;
            }
        }
        debug!(removed, "cache cleared");
        Ok(removed)
    }
}

fn entry_age(metadata: &fs::Metadata) -> Duration {
    metadata
        .modified()
        .ok()
        .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())
        .unwrap_or(Duration::ZERO)
}

/// Best-effort removal; a concurrent invocation may have deleted the entry
/// first.
fn remove_entry(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "failed to remove cache entry: {e}"),
    }
}

#[cfg(unix)]
fn mark_executable(file: &fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn mark_executable(_file: &fs::File) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    true
}
