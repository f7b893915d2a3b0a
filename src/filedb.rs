//! The façade: the one entry point applications call. Ties together a
//! [`Key`]-addressed [`DocumentStoreIndex`] and a set of registered
//! [`StorageBackend`]s through a shared [`Cache`], enforcing the
//! non-negotiable ordering `spec.md` §4.6 calls out — bytes and their
//! checksum land in Storage before the Index is told about them, so a
//! crash between the two steps leaves an orphaned object, never a
//! dangling reference.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use log::info;
use uuid::Uuid;

use crate::cache::Cache;
use crate::error::{FileDbError, Result};
use crate::index::{DocumentStoreIndex, Entry};
use crate::key::{validate_key, Key};
use crate::lock;
use crate::query::Query;
use crate::storage::StorageBackend;
use crate::tools;

pub struct FileDb {
    index_name: String,
    cache: Cache,
    index: Arc<dyn DocumentStoreIndex + Send + Sync>,
    storages: HashMap<String, StorageBackend>,
}

impl FileDb {
    pub fn new(
        index_name: impl Into<String>,
        cache: Cache,
        index: Arc<dyn DocumentStoreIndex + Send + Sync>,
    ) -> Self {
        FileDb {
            index_name: index_name.into(),
            cache,
            index,
            storages: HashMap::new(),
        }
    }

    pub fn register_storage(&mut self, backend: StorageBackend) {
        self.storages.insert(backend.name().to_string(), backend);
    }

    fn storage(&self, storage_name: &str) -> Result<&StorageBackend> {
        self.storages.get(storage_name).ok_or_else(|| {
            FileDbError::InvalidArgument(format!("unregistered storage '{}'", storage_name))
        })
    }

    /// Every entry's lock files live at a path derived the same way
    /// regardless of which backend actually holds the bytes, so readers
    /// and writers across backends contend on the same coordination point.
    fn lock_path(&self, storage_name: &str, storage_path: &str) -> std::path::PathBuf {
        self.cache.path(&self.index_name, storage_name, storage_path)
    }

    /// Store `data` under `key` in `storage_name`, replacing any existing
    /// mapping for that key. Assigns a fresh storage-path; the old
    /// object (if any) is left in place, orphaned, rather than deleted
    /// in-line with the write — matching `spec.md`'s choice to keep
    /// writes single-phase from the caller's perspective.
    pub fn write(&self, storage_name: &str, key: &Key, data: &[u8]) -> Result<()> {
        validate_key(key)?;
        let storage = self.storage(storage_name)?;
        let key_id = self.index.key_id(key)?;

        let storage_path = Uuid::new_v4().to_string();
        let lock_path = self.lock_path(storage_name, &storage_path);
        let _guard = lock::write_lock(&lock_path)?;

        let write_path = match storage {
            StorageBackend::Local(local) => local.local_path(&storage_path),
            StorageBackend::ObjectStore(_) => {
                let path = self.cache.path(&self.index_name, storage_name, &storage_path);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                path
            }
        };

        tools::file_set_contents(&write_path, data, None)
            .map_err(FileDbError::Other)?;

        storage.publish(&storage_path, &write_path)?;
        self.index.upsert(storage_name, key_id, &storage_path)?;

        info!(
            "wrote key-id {} to storage '{}' at path {}",
            key_id, storage_name, storage_path
        );
        Ok(())
    }

    /// Read the bytes stored under `key` in `storage_name`.
    pub fn read(&self, storage_name: &str, key: &Key) -> Result<Vec<u8>> {
        validate_key(key)?;
        let storage = self.storage(storage_name)?;
        let key_id = self.index.key_id(key)?;
        let storage_path = self
            .index
            .storage_path(storage_name, key_id)?
            .ok_or(FileDbError::NotFound)?;

        let lock_path = self.lock_path(storage_name, &storage_path);
        let _guard = lock::read_lock(&lock_path)?;

        let data_path = storage.resolve(&self.cache, &self.index_name, &storage_path)?;
        Ok(fs::read(data_path)?)
    }

    /// Whether `key` has a mapping in `storage_name`, without touching
    /// storage or the cache.
    pub fn exists(&self, storage_name: &str, key: &Key) -> Result<bool> {
        let key_id = self.index.key_id(key)?;
        Ok(self.index.storage_path(storage_name, key_id)?.is_some())
    }

    /// Remove `key`'s entry from `storage_name`. A no-op, not an error, if
    /// the key has no mapping there.
    pub fn delete(&self, storage_name: &str, key: &Key) -> Result<()> {
        let storage = self.storage(storage_name)?;
        let key_id = self.index.key_id(key)?;
        let storage_path = match self.index.storage_path(storage_name, key_id)? {
            Some(path) => path,
            None => return Ok(()),
        };

        let lock_path = self.lock_path(storage_name, &storage_path);
        let _guard = lock::write_lock(&lock_path)?;

        storage.delete(&storage_path)?;
        self.index.delete(storage_name, key_id)?;

        let cache_path = self.cache.path(&self.index_name, storage_name, &storage_path);
        let _ = fs::remove_file(&cache_path);

        Ok(())
    }

    /// Copy the object under `from_key` onto `to_key` within the same
    /// storage, as a fresh, independent storage-path. Copies server-side
    /// through the backend rather than reading bytes through this
    /// process. Copying across different storages or indexes is not
    /// implemented, matching the original's own restriction.
    pub fn copy(&self, storage_name: &str, from_key: &Key, to_key: &Key) -> Result<()> {
        validate_key(to_key)?;
        let storage = self.storage(storage_name)?;
        let from_key_id = self.index.key_id(from_key)?;
        let from_storage_path = self
            .index
            .storage_path(storage_name, from_key_id)?
            .ok_or(FileDbError::NotFound)?;

        let to_storage_path = Uuid::new_v4().to_string();
        let from_lock_path = self.lock_path(storage_name, &from_storage_path);
        let to_lock_path = self.lock_path(storage_name, &to_storage_path);

        let _read_guard = lock::read_lock(&from_lock_path)?;
        let _write_guard = lock::write_lock(&to_lock_path)?;

        storage.copy(&from_storage_path, &to_storage_path)?;

        let to_key_id = self.index.key_id(to_key)?;
        self.index.upsert(storage_name, to_key_id, &to_storage_path)?;
        Ok(())
    }

    /// Copy the object under `from_key` onto `to_key`, then remove
    /// `from_key`'s original mapping.
    pub fn move_key(&self, storage_name: &str, from_key: &Key, to_key: &Key) -> Result<()> {
        self.copy(storage_name, from_key, to_key)?;
        self.delete(storage_name, from_key)
    }

    /// Every entry in `storage_name` whose key matches `query`.
    pub fn find(&self, storage_name: &str, query: &Query) -> Result<Vec<Entry>> {
        self.index.find(storage_name, query)
    }

    /// The checksum of the bytes currently stored under `key`, verified
    /// against the backend rather than trusted from the index.
    pub fn crc32(&self, storage_name: &str, key: &Key) -> Result<String> {
        let storage = self.storage(storage_name)?;
        let key_id = self.index.key_id(key)?;
        let storage_path = self
            .index
            .storage_path(storage_name, key_id)?
            .ok_or(FileDbError::NotFound)?;
        storage.crc32(&storage_path)
    }
}
