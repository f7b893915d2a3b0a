//! A [`DirectTransport`] storage backed by a directory on a (possibly
//! network-mounted, but locally addressable) filesystem.
//!
//! Storage-paths are UUIDv4 strings; files are sharded two hex characters
//! deep so no single directory accumulates more entries than common
//! filesystems handle gracefully — the same split the original
//! implementation's `LocalStorage._file_path` uses
//! (`original_source/filedb/storage.py`).

use std::fs;
use std::path::PathBuf;

use super::{DirectTransport, Storage};
use crate::error::Result;
use crate::hash;

#[derive(Debug, Clone)]
pub struct LocalStorage {
    name: String,
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        LocalStorage {
            name: name.into(),
            root: root.into(),
        }
    }

    fn shard(&self, storage_path: &str) -> PathBuf {
        let prefix = if storage_path.len() >= 2 {
            &storage_path[0..2]
        } else {
            storage_path
        };
        self.root.join(prefix).join(storage_path)
    }
}

impl Storage for LocalStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn copy(&self, from_storage_path: &str, to_storage_path: &str) -> Result<()> {
        let to_path = self.shard(to_storage_path);
        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(self.shard(from_storage_path), &to_path)?;
        Ok(())
    }

    fn delete(&self, storage_path: &str) -> Result<()> {
        let path = self.shard(storage_path);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn crc32(&self, storage_path: &str) -> Result<String> {
        hash::crc32(&self.shard(storage_path))
    }
}

impl DirectTransport for LocalStorage {
    fn local_path(&self, storage_path: &str) -> PathBuf {
        let path = self.shard(storage_path);
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn local_path_shards_by_first_two_characters() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new("local", dir.path());
        let path = storage.local_path("4c2e1f9a-aaaa-bbbb-cccc-ddddeeeeffff");
        assert_eq!(
            path,
            dir.path().join("4c").join("4c2e1f9a-aaaa-bbbb-cccc-ddddeeeeffff")
        );
    }

    #[test]
    fn delete_is_idempotent_on_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new("local", dir.path());
        storage.delete("does-not-exist").unwrap();
    }

    #[test]
    fn crc32_reads_the_sharded_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new("local", dir.path());
        let path = storage.local_path("ab-storage-path");
        File::create(&path).unwrap().write_all(b"payload").unwrap();

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(b"payload");
        let expected = format!("{:08X}", hasher.finalize());

        assert_eq!(storage.crc32("ab-storage-path").unwrap(), expected);
    }
}
