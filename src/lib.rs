//! A content-addressed file database: structured, typed keys map to
//! opaque storage-paths, decoupling what callers address a file by from
//! where and how its bytes are actually kept. See [`filedb::FileDb`] for
//! the entry point.

pub mod cache;
pub mod config;
pub mod error;
pub mod filedb;
pub mod hash;
pub mod index;
pub mod key;
pub mod lock;
pub mod query;
pub mod storage;
pub mod tools;

pub use error::{FileDbError, Result};
pub use filedb::FileDb;

/// Install `env_logger` as the `log` backend, reading `RUST_LOG` the usual
/// way. Embedding applications are free to set up their own subscriber
/// instead; this is a convenience for binaries and tests that just want
/// filedb's `debug`/`warn` diagnostics (lock contention, stale-lock
/// recovery, cache refreshes) on stderr.
pub fn init_logging() {
    let _ = env_logger::try_init();
}
