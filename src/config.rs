//! Deployment configuration: where the cache lives and how each storage is
//! reached. Plain `serde`-derived structs loaded from JSON, the same
//! pattern the teacher uses for its datastore/media-pool config sections.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::error::Result;
use crate::filedb::FileDb;
use crate::index::DocumentStoreIndex;
use crate::storage::local::LocalStorage;
use crate::storage::object_store::ObjectStoreSync;
use crate::storage::StorageBackend;

/// The shared cache directory every storage adapter downloads into and
/// reads locks from. The original system takes an unenforced advisory
/// size bound on this directory; filedb keeps the field but, like the
/// original, never evicts on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub root: PathBuf,
    /// Advisory only — nothing in this crate enforces it.
    pub max_bytes: Option<u64>,
}

/// One storage backend's connection settings, tagged by backend kind so
/// `serde` can deserialize heterogeneous storage lists from one config
/// file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    Local { name: String, root: PathBuf },
    S3 {
        name: String,
        bucket: String,
        region: String,
        endpoint: Option<String>,
    },
    Gcs { name: String, bucket: String },
}

impl StorageConfig {
    pub fn name(&self) -> &str {
        match self {
            StorageConfig::Local { name, .. } => name,
            StorageConfig::S3 { name, .. } => name,
            StorageConfig::Gcs { name, .. } => name,
        }
    }

    /// Build the live `StorageBackend` this config entry describes.
    pub fn build(&self) -> Result<StorageBackend> {
        match self {
            StorageConfig::Local { name, root } => Ok(StorageBackend::Local(LocalStorage::new(
                name.clone(),
                root.clone(),
            ))),
            StorageConfig::S3 {
                name,
                bucket,
                region,
                endpoint,
            } => Ok(StorageBackend::ObjectStore(ObjectStoreSync::s3(
                name.clone(),
                bucket,
                region,
                endpoint.as_deref(),
            )?)),
            StorageConfig::Gcs { name, bucket } => Ok(StorageBackend::ObjectStore(
                ObjectStoreSync::gcs(name.clone(), bucket)?,
            )),
        }
    }
}

/// Top-level deployment configuration: the cache plus every registered
/// storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub cache: CacheConfig,
    pub storages: Vec<StorageConfig>,
}

impl Config {
    /// Build a `FileDb` wired up with this config's cache and every
    /// configured storage. The index is supplied by the caller rather
    /// than named in `Config`: `DocumentStoreIndex` is a pluggable
    /// contract with no concrete wire client shipped here, so there's
    /// nothing a config file could name to construct one.
    pub fn build(
        &self,
        index_name: impl Into<String>,
        index: Arc<dyn DocumentStoreIndex + Send + Sync>,
    ) -> Result<FileDb> {
        let cache = Cache::new(self.cache.root.clone());
        let mut db = FileDb::new(index_name, cache, index);
        for storage in &self.storages {
            db.register_storage(storage.build()?);
        }
        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::memory::MemoryIndex;
    use crate::key::Value;

    #[test]
    fn build_wires_a_filedb_that_can_write_and_read() {
        let cache_dir = tempfile::tempdir().unwrap();
        let storage_dir = tempfile::tempdir().unwrap();

        let config = Config {
            cache: CacheConfig {
                root: cache_dir.path().to_path_buf(),
                max_bytes: None,
            },
            storages: vec![StorageConfig::Local {
                name: "local".into(),
                root: storage_dir.path().to_path_buf(),
            }],
        };

        let index = Arc::new(MemoryIndex::new());
        let db = config.build("mongo", index).unwrap();

        let key: crate::key::Key = [("name".to_string(), Value::Str("a".into()))]
            .into_iter()
            .collect();
        db.write("local", &key, b"payload").unwrap();
        assert_eq!(db.read("local", &key).unwrap(), b"payload".to_vec());
    }

    #[test]
    fn storage_config_round_trips_through_json() {
        let config = Config {
            cache: CacheConfig {
                root: PathBuf::from("/var/cache/filedb"),
                max_bytes: Some(10_000_000_000),
            },
            storages: vec![
                StorageConfig::Local {
                    name: "local".into(),
                    root: PathBuf::from("/mnt/filedb"),
                },
                StorageConfig::S3 {
                    name: "s3-primary".into(),
                    bucket: "filedb-objects".into(),
                    region: "us-east-1".into(),
                    endpoint: None,
                },
            ],
        };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.storages.len(), 2);
        assert_eq!(parsed.storages[0].name(), "local");
    }
}
