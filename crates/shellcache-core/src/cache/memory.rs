use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{validate_name, CacheError, CacheStorage, CachedResponse, EntrySummary};

type Store = BTreeMap<String, CachedResponse>;

/// Cache storage that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    stores: RwLock<BTreeMap<String, Store>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        validate_name(name)?;
        self.stores
            .write()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.stores.read().await.keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.stores.write().await.remove(name).is_some())
    }

    async fn match_entry(
        &self,
        name: &str,
        key: &str,
    ) -> Result<Option<CachedResponse>, CacheError> {
        let stores = self.stores.read().await;
        Ok(stores.get(name).and_then(|store| store.get(key)).cloned())
    }

    async fn put(
        &self,
        name: &str,
        key: &str,
        response: CachedResponse,
    ) -> Result<(), CacheError> {
        validate_name(name)?;
        self.stores
            .write()
            .await
            .entry(name.to_string())
            .or_default()
            .insert(key.to_string(), response);
        Ok(())
    }

    async fn entries(&self, name: &str) -> Result<Vec<EntrySummary>, CacheError> {
        let stores = self.stores.read().await;
        Ok(stores
            .get(name)
            .map(|store| {
                store
                    .iter()
                    .map(|(key, cached)| cached.summary(key))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Response, ResponseKind};
    use reqwest::Url;

    fn cached(body: &[u8]) -> CachedResponse {
        CachedResponse::from(Response::new(
            Url::parse("https://kedai.example/index.html").expect("url"),
            200,
            ResponseKind::Basic,
            vec![],
            body.to_vec(),
        ))
    }

    #[tokio::test]
    async fn test_put_creates_store_and_replaces_entry() {
        let storage = MemoryCacheStorage::new();
        storage.put("v1", "GET /", cached(b"old")).await.expect("put");
        storage.put("v1", "GET /", cached(b"new")).await.expect("put");

        assert_eq!(storage.keys().await.expect("keys"), vec!["v1".to_string()]);
        let hit = storage.match_entry("v1", "GET /").await.expect("match");
        assert_eq!(hit.map(|c| c.body), Some(b"new".to_vec()));
        assert_eq!(storage.entries("v1").await.expect("entries").len(), 1);
    }

    #[tokio::test]
    async fn test_missing_store_is_a_miss() {
        let storage = MemoryCacheStorage::new();
        assert!(storage.match_entry("nope", "GET /").await.expect("match").is_none());
        assert!(storage.entries("nope").await.expect("entries").is_empty());
        assert!(!storage.delete("nope").await.expect("delete"));
    }

    #[tokio::test]
    async fn test_open_rejects_bad_name() {
        let storage = MemoryCacheStorage::new();
        assert!(matches!(
            storage.open("../escape").await,
            Err(CacheError::InvalidName(_))
        ));
    }
}
