//! Named, versioned cache stores for offline access.
//!
//! A cache store maps request identity (method + URL) to a response snapshot.
//! The worker keeps one store per deployment, named by its version tag, and
//! purges the others when a new version activates.
//!
//! Backends:
//! - `DiskCacheStorage`: one directory per store, JSON index + body files
//! - `MemoryCacheStorage`: process-local maps

pub mod disk;
pub mod entry;
pub mod error;
pub mod memory;

use async_trait::async_trait;

pub use disk::DiskCacheStorage;
pub use entry::{CachedResponse, EntrySummary};
pub use error::CacheError;
pub use memory::MemoryCacheStorage;

/// Storage holding every named cache store for one origin.
#[async_trait]
pub trait CacheStorage: Send + Sync + 'static {
    /// Open a store, creating it if it does not exist.
    async fn open(&self, name: &str) -> Result<(), CacheError>;

    /// Names of all existing stores.
    async fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Delete a store and everything in it. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, CacheError>;

    /// Look up an entry. A missing store is a miss, not an error.
    async fn match_entry(&self, name: &str, key: &str)
        -> Result<Option<CachedResponse>, CacheError>;

    /// Store an entry, replacing any previous one for the same key.
    async fn put(&self, name: &str, key: &str, response: CachedResponse)
        -> Result<(), CacheError>;

    /// Summaries of the entries of a store, sorted by key.
    async fn entries(&self, name: &str) -> Result<Vec<EntrySummary>, CacheError>;
}

/// Reject store names that cannot be used as a single path component.
pub(crate) fn validate_name(name: &str) -> Result<(), CacheError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        Err(CacheError::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("app-cache-v1").is_ok());
        assert!(validate_name("rnj-cache-v2.1").is_ok());

        assert!(validate_name("").is_err());
        assert!(validate_name(".").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\\b").is_err());
    }
}
