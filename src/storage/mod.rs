//! The storage adapter contract: something that holds file bytes under an
//! opaque storage-path and can copy, delete, and checksum them.
//!
//! Storages come in two shapes (`spec.md` §4.4's redesign of the original's
//! duck-typed adapters): a [`DirectTransport`] hands back a local path the
//! caller can open directly (a mounted filesystem), while a [`Sync`]
//! storage only exchanges bytes through the shared [`Cache`] via
//! `download`/`upload` (S3, GCS). The façade dispatches on a closed
//! [`StorageBackend`] enum rather than trait objects, since the set of
//! backends is small and fixed and the two shapes need different call
//! sequences around the cache, not just different trait impls.

pub mod local;
pub mod object_store;

use std::path::{Path, PathBuf};

use crate::cache::Cache;
use crate::error::Result;
use crate::lock;

/// Operations common to every storage backend, independent of transport
/// shape.
pub trait Storage {
    /// The name this storage is registered under (matches the index's
    /// per-storage data table).
    fn name(&self) -> &str;

    /// Duplicate the object at `from_storage_path` to `to_storage_path`
    /// within this same storage, server-side where the backend supports
    /// it rather than round-tripping bytes through the calling process.
    fn copy(&self, from_storage_path: &str, to_storage_path: &str) -> Result<()>;

    /// Remove the object at `storage_path`. Idempotent: deleting a
    /// storage-path that doesn't exist is not an error.
    fn delete(&self, storage_path: &str) -> Result<()>;

    /// Checksum of the object at `storage_path`, as an uppercase hex CRC32
    /// string, computed without loading the whole object into memory.
    fn crc32(&self, storage_path: &str) -> Result<String>;
}

/// A storage whose files live somewhere the calling process can open
/// directly (no intermediate cache download).
pub trait DirectTransport: Storage {
    /// The local filesystem path backing `storage_path`. Creates parent
    /// directories on first use but does not create the file itself.
    fn local_path(&self, storage_path: &str) -> PathBuf;
}

/// A storage reachable only through download/upload, staged through a
/// [`Cache`] entry.
pub trait Sync: Storage {
    /// Download `storage_path` into `cache_path`, creating parent
    /// directories as needed. A missing remote object is an error, not an
    /// empty file.
    fn download(&self, storage_path: &str, cache_path: &Path) -> Result<()>;

    /// Upload the bytes at `cache_path` to `storage_path`, replacing
    /// whatever is already there.
    fn upload(&self, storage_path: &str, cache_path: &Path) -> Result<()>;
}

/// The closed set of storage backends the façade knows how to drive.
/// Adding a backend means adding a variant here, not registering a new
/// trait object — matches the small, fixed backend list `spec.md` §4.4
/// calls for instead of runtime duck-typing.
pub enum StorageBackend {
    Local(local::LocalStorage),
    ObjectStore(object_store::ObjectStoreSync),
}

impl StorageBackend {
    pub fn name(&self) -> &str {
        match self {
            StorageBackend::Local(s) => s.name(),
            StorageBackend::ObjectStore(s) => s.name(),
        }
    }

    pub fn delete(&self, storage_path: &str) -> Result<()> {
        match self {
            StorageBackend::Local(s) => s.delete(storage_path),
            StorageBackend::ObjectStore(s) => s.delete(storage_path),
        }
    }

    pub fn copy(&self, from_storage_path: &str, to_storage_path: &str) -> Result<()> {
        match self {
            StorageBackend::Local(s) => s.copy(from_storage_path, to_storage_path),
            StorageBackend::ObjectStore(s) => s.copy(from_storage_path, to_storage_path),
        }
    }

    /// Resolve `storage_path` to a cache-relative file that's guaranteed
    /// to hold the object's current bytes: for a [`DirectTransport`]
    /// backend this is the backend's own path; for a [`Sync`] backend,
    /// the cached copy's checksum is compared against the backend's
    /// (`spec.md` §4.6 read step 5) and a download is triggered whenever
    /// the cache entry is missing or stale.
    ///
    /// The caller is expected to already hold a read lock on `cache_path`
    /// (the façade's read path does). The download itself runs under a
    /// *nested* write lock taken here, inside that read lock — the same
    /// own-lock-skip upgrade `lock.rs` exists to support — so that several
    /// readers racing on an empty or stale cache never call
    /// `Sync::download` concurrently and torn-write into the same file.
    pub fn resolve(&self, cache: &Cache, index_name: &str, storage_path: &str) -> Result<PathBuf> {
        match self {
            StorageBackend::Local(s) => Ok(s.local_path(storage_path)),
            StorageBackend::ObjectStore(s) => {
                let cache_path = cache.path(index_name, s.name(), storage_path);

                let is_fresh = |path: &Path| -> bool {
                    if !path.exists() {
                        return false;
                    }
                    matches!(
                        (cache.crc32(path), s.crc32(storage_path)),
                        (Ok(local), Ok(remote)) if local == remote
                    )
                };

                if is_fresh(&cache_path) {
                    return Ok(cache_path);
                }

                let _write_guard = lock::write_lock(&cache_path)?;
                // Re-check under the write lock: another reader may have
                // already repopulated the cache while we waited for it.
                if !is_fresh(&cache_path) {
                    if let Some(parent) = cache_path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    s.download(storage_path, &cache_path)?;
                }
                Ok(cache_path)
            }
        }
    }

    /// Publish the bytes at `cache_path` (already written and checksummed
    /// by the caller) to this backend under `storage_path`.
    pub fn publish(&self, storage_path: &str, cache_path: &Path) -> Result<()> {
        match self {
            StorageBackend::Local(_) => Ok(()), // the cache path *is* the backend path
            StorageBackend::ObjectStore(s) => s.upload(storage_path, cache_path),
        }
    }

    pub fn crc32(&self, storage_path: &str) -> Result<String> {
        match self {
            StorageBackend::Local(s) => s.crc32(storage_path),
            StorageBackend::ObjectStore(s) => s.crc32(storage_path),
        }
    }
}
