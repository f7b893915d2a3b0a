//! The `DocumentStoreIndex` contract: exactly the subset of a document
//! database's API the original's Mongo-backed index relies on
//! (`find_one`, `update_one` with upsert, `delete_one`, `find` against a
//! raw filter). The document store's own native query engine is out of
//! scope (`spec.md` §1), so this trait never assumes a particular wire
//! protocol — implementors translate [`Query`] into whatever filter shape
//! their backing store understands.

use crate::error::Result;
use crate::key::Key;
use crate::query::Query;

use super::Entry;

/// Mirrors the original's two-collection layout: a key-id table unique on
/// canonical-key bytes, and one data table per storage name keyed by
/// key-id.
pub trait DocumentStoreIndex {
    /// The key-id for `key`, assigning one if this is the first time the
    /// canonical encoding has been observed. Stable for the lifetime of
    /// the index: the same key always maps to the same key-id, and a
    /// colliding canonical key never creates a second one.
    fn key_id(&self, key: &Key) -> Result<u64>;

    /// The storage-path registered for `key_id` under `storage_name`, if
    /// any.
    fn storage_path(&self, storage_name: &str, key_id: u64) -> Result<Option<String>>;

    /// Register `storage_path` for `key_id` under `storage_name`,
    /// replacing any existing mapping. Called only after the bytes are
    /// already durable in storage (`spec.md`'s publish-order invariant).
    fn upsert(&self, storage_name: &str, key_id: u64, storage_path: &str) -> Result<()>;

    /// Remove the mapping for `key_id` under `storage_name`, if any.
    /// Idempotent.
    fn delete(&self, storage_name: &str, key_id: u64) -> Result<()>;

    /// All entries under `storage_name` whose key matches `query`.
    fn find(&self, storage_name: &str, query: &Query) -> Result<Vec<Entry>>;
}
