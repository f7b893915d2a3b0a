//! Bridges the façade's synchronous call surface to the `object_store`
//! crate's async API.
//!
//! The design treats every Storage/Index/Cache call as synchronous and
//! blocking (`spec.md` §5): "within one process, operations are
//! synchronous and blocking. There is no cooperative scheduler." The
//! `object_store` backend is the one component with a genuinely async
//! native API, so it gets a small dedicated runtime to block on — the same
//! role the teacher's `crate::tools::runtime::block_in_place` plays when
//! bridging `src/client/pull.rs`'s sync call sites into async chunk
//! downloads.

use once_cell::sync::Lazy;
use tokio::runtime::{Builder, Runtime};

static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build filedb object_store runtime")
});

/// Run a future to completion on the shared background runtime, blocking
/// the calling thread until it resolves.
pub fn block_on<F: std::future::Future>(future: F) -> F::Output {
    RUNTIME.handle().block_on(future)
}
