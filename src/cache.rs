//! Maps a `(storage_name, storage_path)` pair onto an on-disk cache file,
//! and computes its checksum under a read lock.
//!
//! The cache tree is laid out as
//! `<cache_root>/<index_name>/<storage_name>/<storage_path>/data`, one
//! directory per storage-path so each entry's lock files sit alongside the
//! data they guard without colliding with any other entry's locks.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::hash;
use crate::lock;

/// A cache rooted at a single directory, shared by every storage/index
/// pairing that writes through it.
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
}

impl Cache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Cache { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The on-disk path of the data file for `storage_path` under
    /// `index_name`/`storage_name`. Does not create anything.
    pub fn path(&self, index_name: &str, storage_name: &str, storage_path: &str) -> PathBuf {
        self.root
            .join(index_name)
            .join(storage_name)
            .join(storage_path)
            .join("data")
    }

    /// Compute the CRC32 of a cached file, holding a read lock for the
    /// duration so a concurrent writer can't observe a half-written file.
    pub fn crc32(&self, cache_path: &Path) -> Result<String> {
        let _guard = lock::read_lock(cache_path)?;
        hash::crc32(cache_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_nests_by_index_then_storage_then_storage_path() {
        let cache = Cache::new("/var/cache/filedb");
        let path = cache.path("mongo", "s3-primary", "4c2e.../obj");
        assert_eq!(
            path,
            PathBuf::from("/var/cache/filedb/mongo/s3-primary/4c2e.../obj/data")
        );
    }

    #[test]
    fn crc32_reads_back_written_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path());
        let path = cache.path("mongo", "local", "abc");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"hello cache").unwrap();

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(b"hello cache");
        let expected = format!("{:08X}", hasher.finalize());

        assert_eq!(cache.crc32(&path).unwrap(), expected);
    }
}
