//! A [`Sync`] storage backend over S3-compatible and Google Cloud Storage
//! buckets, unified through the `object_store` crate's single async API
//! (the same abstraction `openobserve` builds its multi-cloud object
//! layer on). Bridged into the façade's synchronous call surface via
//! [`crate::tools::runtime::block_on`].
//!
//! Checksums are stored as a custom `crc32` object attribute on both
//! backends rather than relying on S3 and GCS's own (differently shaped,
//! not always enabled) native checksum features — a deliberate
//! simplification recorded in `DESIGN.md`.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use object_store::path::Path as ObjectPath;
use object_store::{aws::AmazonS3Builder, gcp::GoogleCloudStorageBuilder, ObjectStore};

use super::{Storage, Sync};
use crate::error::{FileDbError, Result};
use crate::hash;
use crate::tools::runtime::block_on;

const CRC32_ATTRIBUTE: &str = "crc32";

pub struct ObjectStoreSync {
    name: String,
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreSync {
    /// An S3-compatible bucket. `endpoint` may point at a non-AWS
    /// S3-compatible service (MinIO, Ceph RGW); pass `None` to use AWS's
    /// regional default.
    pub fn s3(
        name: impl Into<String>,
        bucket: &str,
        region: &str,
        endpoint: Option<&str>,
    ) -> Result<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(region);
        if let Some(endpoint) = endpoint {
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }
        let store = builder
            .build()
            .map_err(|e| FileDbError::Other(e.into()))?;
        Ok(ObjectStoreSync {
            name: name.into(),
            store: Arc::new(store),
        })
    }

    /// A Google Cloud Storage bucket, using credentials from the
    /// environment (`GOOGLE_APPLICATION_CREDENTIALS` or workload identity).
    pub fn gcs(name: impl Into<String>, bucket: &str) -> Result<Self> {
        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| FileDbError::Other(e.into()))?;
        Ok(ObjectStoreSync {
            name: name.into(),
            store: Arc::new(store),
        })
    }

    fn object_path(storage_path: &str) -> Result<ObjectPath> {
        ObjectPath::parse(storage_path).map_err(|e| FileDbError::Other(e.into()))
    }
}

impl Storage for ObjectStoreSync {
    fn name(&self) -> &str {
        &self.name
    }

    fn copy(&self, from_storage_path: &str, to_storage_path: &str) -> Result<()> {
        let from = Self::object_path(from_storage_path)?;
        let to = Self::object_path(to_storage_path)?;
        let store = self.store.clone();
        block_on(async move {
            store
                .copy(&from, &to)
                .await
                .map_err(|e| FileDbError::Other(e.into()))
        })
    }

    fn delete(&self, storage_path: &str) -> Result<()> {
        let path = Self::object_path(storage_path)?;
        let store = self.store.clone();
        block_on(async move {
            match store.delete(&path).await {
                Ok(()) => Ok(()),
                Err(object_store::Error::NotFound { .. }) => Ok(()),
                Err(err) => Err(FileDbError::Other(err.into())),
            }
        })
    }

    fn crc32(&self, storage_path: &str) -> Result<String> {
        let path = Self::object_path(storage_path)?;
        let store = self.store.clone();
        block_on(async move {
            // Attributes only come back from `get`/`get_opts`, not `head`,
            // so fetch the object's metadata via a full get and drop the
            // payload rather than read it.
            let result = store
                .get(&path)
                .await
                .map_err(|e| match e {
                    object_store::Error::NotFound { .. } => FileDbError::NotFound,
                    err => FileDbError::Other(err.into()),
                })?;
            result
                .attributes
                .get(&object_store::Attribute::Metadata(CRC32_ATTRIBUTE.into()))
                .map(|v| v.to_string())
                .ok_or_else(|| {
                    FileDbError::IntegrityError(format!(
                        "object {} has no {} attribute",
                        storage_path, CRC32_ATTRIBUTE
                    ))
                })
        })
    }
}

impl Sync for ObjectStoreSync {
    fn download(&self, storage_path: &str, cache_path: &Path) -> Result<()> {
        let path = Self::object_path(storage_path)?;
        let store = self.store.clone();
        let bytes: Bytes = block_on(async move {
            let result = store.get(&path).await.map_err(|e| match e {
                object_store::Error::NotFound { .. } => FileDbError::NotFound,
                err => FileDbError::Other(err.into()),
            })?;
            result
                .bytes()
                .await
                .map_err(|e| FileDbError::Other(e.into()))
        })?;

        if let Some(parent) = cache_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(cache_path, &bytes)?;

        // A download that completed but left a cache file whose checksum
        // still doesn't match Storage's is fatal, not a retry case: it
        // means the bytes changed mid-transfer or the transport silently
        // truncated them.
        let expected = self.crc32(storage_path)?;
        let actual = hash::crc32(cache_path)?;
        if actual != expected {
            return Err(FileDbError::IntegrityError(format!(
                "downloaded object {} has checksum {} but storage reports {}",
                storage_path, actual, expected
            )));
        }

        Ok(())
    }

    fn upload(&self, storage_path: &str, cache_path: &Path) -> Result<()> {
        let checksum = hash::crc32(cache_path)?;
        let bytes = std::fs::read(cache_path)?;

        let path = Self::object_path(storage_path)?;
        let store = self.store.clone();
        block_on(async move {
            let options = object_store::PutOptions {
                attributes: [(
                    object_store::Attribute::Metadata(CRC32_ATTRIBUTE.into()),
                    checksum.into(),
                )]
                .into_iter()
                .collect(),
                ..Default::default()
            };
            store
                .put_opts(&path, Bytes::from(bytes).into(), options)
                .await
                .map_err(|e| FileDbError::Other(e.into()))?;
            Ok(())
        })
    }
}
