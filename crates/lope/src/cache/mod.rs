//! Content-addressed artifact cache
//!
//! Stores previously built artifacts keyed by a fingerprint of source bytes,
//! resolved compiler path and compiler flags. The cache is advisory: every
//! failure inside this module degrades to a miss or a skipped store, and the
//! runner never aborts a program run because the cache misbehaved.

use thiserror::Error;

pub use crate::cache::key::CacheKey;
pub use crate::cache::store::{ArtifactKind, CacheStore};

mod key;
mod store;

/// Errors that occur during cache operations
///
/// These are recovered inside the runner and never surface past a tracing
/// note.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no platform cache directory available")]
    NoCacheHome,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
