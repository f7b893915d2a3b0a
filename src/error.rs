//! Crate-wide error type.
//!
//! `Index`, `Storage`, and `Cache` errors propagate through the façade
//! unwrapped, except `FileLocked` (synthesized by `lock.rs` on a live
//! conflicting holder) and `NotFound` (synthesized by the façade when the
//! index returns nothing).

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum FileDbError {
    #[error("key has no storage-path in this storage namespace")]
    NotFound,

    #[error("key already exists")]
    AlreadyExists,

    #[error("cache file {path} is locked by process {pid} (suspect stale? remove the lock file manually: {lock_path})")]
    FileLocked {
        pid: i32,
        path: PathBuf,
        lock_path: PathBuf,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("integrity check failed: {0}")]
    IntegrityError(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("operation not implemented: {0}")]
    Unimplemented(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FileDbError>;
