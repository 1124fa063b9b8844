//! Disk-backed cache storage.
//!
//! Each named store is a directory under the storage root:
//!   - `index.json`    — cache key → entry metadata and body file name
//!   - `{uuid}.body`   — response body bytes
//!
//! Index rewrites go through a temp file and a rename, so a reader sees either
//! the old or the new index, never a partial one. Writers hold an advisory
//! lock on `{root}/.lock`, which serializes them across processes sharing the
//! same root, and re-read the index under it.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::ResponseKind;

use super::{validate_name, CacheError, CacheStorage, CachedResponse, EntrySummary};

const INDEX_FILE: &str = "index.json";
const LOCK_FILE: &str = ".lock";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreIndex {
    entries: BTreeMap<String, EntryRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryRecord {
    body: String,
    url: String,
    status: u16,
    kind: ResponseKind,
    #[serde(default)]
    headers: Vec<(String, String)>,
    size: usize,
    cached_at: DateTime<Utc>,
}

impl EntryRecord {
    fn summary(&self, key: &str) -> EntrySummary {
        EntrySummary {
            key: key.to_string(),
            url: self.url.clone(),
            status: self.status,
            size: self.size,
            cached_at: self.cached_at,
        }
    }
}

/// Exclusive lock on the storage root. Released when dropped.
struct RootLock {
    _file: std::fs::File,
}

pub struct DiskCacheStorage {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl DiskCacheStorage {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_dir(&self, name: &str) -> Result<PathBuf, CacheError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// Take the cross-process writer lock, waiting for other holders.
    async fn lock_root(&self) -> Result<RootLock, CacheError> {
        Self::create_dir(&self.root).await?;
        let path = self.root.join(LOCK_FILE);

        let file = tokio::task::spawn_blocking(move || {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&path)
                .map_err(|e| CacheError::io(&path, e))?;
            file.lock_exclusive()
                .map_err(|e| CacheError::io(&path, e))?;
            Ok::<_, CacheError>(file)
        })
        .await
        .map_err(|e| CacheError::Storage(format!("Lock task failed: {}", e)))??;

        Ok(RootLock { _file: file })
    }

    async fn read_index(dir: &Path) -> Result<Option<StoreIndex>, CacheError> {
        let path = dir.join(INDEX_FILE);
        let contents = match fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };
        let index = serde_json::from_slice(&contents)
            .map_err(|source| CacheError::CorruptIndex { path, source })?;
        Ok(Some(index))
    }

    async fn write_index(dir: &Path, index: &StoreIndex) -> Result<(), CacheError> {
        let path = dir.join(INDEX_FILE);
        let temp_path = dir.join(format!("{}.{}.tmp", INDEX_FILE, Uuid::new_v4()));
        let contents = serde_json::to_vec_pretty(index)
            .map_err(|e| CacheError::Storage(format!("Failed to serialize index: {}", e)))?;

        fs::write(&temp_path, contents)
            .await
            .map_err(|e| CacheError::io(&temp_path, e))?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            Self::remove_quietly(&temp_path).await;
            return Err(CacheError::io(&path, e));
        }
        Ok(())
    }

    async fn create_dir(dir: &Path) -> Result<(), CacheError> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| CacheError::io(dir, e))
    }

    /// Remove a file that is no longer referenced; failures are only logged.
    async fn remove_quietly(path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove unreferenced file");
            }
        }
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        let dir = self.store_dir(name)?;
        let _guard = self.write_lock.lock().await;
        let _lock = self.lock_root().await?;

        Self::create_dir(&dir).await?;
        if Self::read_index(&dir).await?.is_none() {
            Self::write_index(&dir, &StoreIndex::default()).await?;
            debug!(cache = name, "Created cache store");
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.root, e)),
        };

        // Every store directory counts, including one whose index was never
        // written, so activation can still purge it.
        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| CacheError::io(&self.root, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| CacheError::io(entry.path(), e))?;
            if !file_type.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let dir = self.store_dir(name)?;
        let _guard = self.write_lock.lock().await;
        let _lock = self.lock_root().await?;

        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(dir, e)),
        }
    }

    async fn match_entry(
        &self,
        name: &str,
        key: &str,
    ) -> Result<Option<CachedResponse>, CacheError> {
        let dir = self.store_dir(name)?;
        let Some(index) = Self::read_index(&dir).await? else {
            return Ok(None);
        };
        let Some(record) = index.entries.get(key) else {
            return Ok(None);
        };

        let body_path = dir.join(&record.body);
        let body = match fs::read(&body_path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Replaced by a concurrent put between reading the index and the body
                debug!(cache = name, key, "Body file vanished, treating as miss");
                return Ok(None);
            }
            Err(e) => return Err(CacheError::io(body_path, e)),
        };

        let url = Url::parse(&record.url).map_err(|e| {
            CacheError::Storage(format!("Invalid URL in index for {}: {}", key, e))
        })?;

        Ok(Some(CachedResponse {
            url,
            status: record.status,
            kind: record.kind,
            headers: record.headers.clone(),
            body,
            cached_at: record.cached_at,
        }))
    }

    async fn put(
        &self,
        name: &str,
        key: &str,
        response: CachedResponse,
    ) -> Result<(), CacheError> {
        let dir = self.store_dir(name)?;
        let _guard = self.write_lock.lock().await;
        let _lock = self.lock_root().await?;

        Self::create_dir(&dir).await?;

        let body_name = format!("{}.body", Uuid::new_v4());
        let body_path = dir.join(&body_name);
        fs::write(&body_path, &response.body)
            .await
            .map_err(|e| CacheError::io(&body_path, e))?;

        let mut index = match Self::read_index(&dir).await {
            Ok(index) => index.unwrap_or_default(),
            Err(e) => {
                Self::remove_quietly(&body_path).await;
                return Err(e);
            }
        };

        let size = response.body.len();
        let record = EntryRecord {
            body: body_name,
            url: response.url.to_string(),
            status: response.status,
            kind: response.kind,
            headers: response.headers,
            size,
            cached_at: response.cached_at,
        };
        let replaced = index.entries.insert(key.to_string(), record);

        if let Err(e) = Self::write_index(&dir, &index).await {
            Self::remove_quietly(&body_path).await;
            return Err(e);
        }

        if let Some(old) = replaced {
            Self::remove_quietly(&dir.join(old.body)).await;
        }

        debug!(cache = name, key, bytes = size, "Stored entry");
        Ok(())
    }

    async fn entries(&self, name: &str) -> Result<Vec<EntrySummary>, CacheError> {
        let dir = self.store_dir(name)?;
        Ok(Self::read_index(&dir)
            .await?
            .map(|index| {
                index
                    .entries
                    .iter()
                    .map(|(key, record)| record.summary(key))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::models::Response;

    fn cached(path: &str, body: &[u8]) -> CachedResponse {
        CachedResponse::from(Response::new(
            Url::parse(&format!("https://kedai.example{}", path)).expect("url"),
            200,
            ResponseKind::Basic,
            vec![("content-type".to_string(), "image/jpeg".to_string())],
            body.to_vec(),
        ))
    }

    fn body_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .expect("read store dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "body"))
            .count()
    }

    fn storage() -> (tempfile::TempDir, DiskCacheStorage) {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = DiskCacheStorage::new(dir.path().join("caches"));
        (dir, storage)
    }

    #[tokio::test]
    async fn test_keys_empty_when_root_missing() {
        let (_dir, storage) = storage();
        assert!(storage.keys().await.expect("keys").is_empty());
    }

    #[tokio::test]
    async fn test_open_put_match() {
        let (_dir, storage) = storage();
        storage.open("app-cache-v1").await.expect("open");
        assert_eq!(storage.keys().await.expect("keys"), vec!["app-cache-v1"]);

        let key = "GET https://kedai.example/assets/home_services_card_bg.jpeg";
        storage
            .put("app-cache-v1", key, cached("/assets/home_services_card_bg.jpeg", b"jpeg"))
            .await
            .expect("put");

        let hit = storage
            .match_entry("app-cache-v1", key)
            .await
            .expect("match")
            .expect("hit");
        assert_eq!(hit.body, b"jpeg".to_vec());
        assert_eq!(hit.status, 200);
        assert_eq!(hit.headers[0].1, "image/jpeg");
        assert_eq!(hit.url.path(), "/assets/home_services_card_bg.jpeg");
    }

    #[tokio::test]
    async fn test_put_replaces_body_file() {
        let (_dir, storage) = storage();
        storage.put("v1", "GET /", cached("/", b"first")).await.expect("put");
        storage.put("v1", "GET /", cached("/", b"second")).await.expect("put");

        let hit = storage.match_entry("v1", "GET /").await.expect("match").expect("hit");
        assert_eq!(hit.body, b"second".to_vec());

        assert_eq!(body_files(&storage.root().join("v1")), 1);
    }

    #[tokio::test]
    async fn test_delete_and_persistence_across_instances() {
        let (dir, storage) = storage();
        storage.put("v1", "GET /a", cached("/a", b"a")).await.expect("put");
        storage.put("v2", "GET /b", cached("/b", b"b")).await.expect("put");

        let reopened = DiskCacheStorage::new(dir.path().join("caches"));
        assert_eq!(reopened.keys().await.expect("keys"), vec!["v1", "v2"]);
        assert!(reopened.delete("v1").await.expect("delete"));
        assert!(!reopened.delete("v1").await.expect("delete again"));
        assert_eq!(reopened.keys().await.expect("keys"), vec!["v2"]);

        let entries = reopened.entries("v2").await.expect("entries");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "GET /b");
        assert_eq!(entries[0].size, 1);
    }

    #[tokio::test]
    async fn test_corrupt_index_is_an_error() {
        let (_dir, storage) = storage();
        storage.open("v1").await.expect("open");
        std::fs::write(storage.root().join("v1").join(INDEX_FILE), "not json").expect("write");

        let result = storage.match_entry("v1", "GET /").await;
        assert!(matches!(result, Err(CacheError::CorruptIndex { .. })));
    }

    #[tokio::test]
    async fn test_rejects_path_like_names() {
        let (_dir, storage) = storage();
        assert!(matches!(
            storage.put("..", "GET /", cached("/", b"x")).await,
            Err(CacheError::InvalidName(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_instances_on_one_root_keep_bodies_apart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("caches");
        let first = Arc::new(DiskCacheStorage::new(root.clone()));
        let second = Arc::new(DiskCacheStorage::new(root));

        for round in 0..50 {
            let a = {
                let storage = Arc::clone(&first);
                tokio::spawn(async move { storage.put("v1", "GET /a", cached("/a", b"AAAA")).await })
            };
            let b = {
                let storage = Arc::clone(&second);
                tokio::spawn(async move { storage.put("v1", "GET /b", cached("/b", b"BBBB")).await })
            };
            a.await.expect("join a").expect("put a");
            b.await.expect("join b").expect("put b");

            let hit_a = second.match_entry("v1", "GET /a").await.expect("match a");
            let hit_b = first.match_entry("v1", "GET /b").await.expect("match b");
            assert_eq!(hit_a.map(|c| c.body), Some(b"AAAA".to_vec()), "round {}", round);
            assert_eq!(hit_b.map(|c| c.body), Some(b"BBBB".to_vec()), "round {}", round);
        }

        assert_eq!(body_files(&first.root().join("v1")), 2);
    }

    #[tokio::test]
    async fn test_store_without_index_is_listed_and_deletable() {
        let (_dir, storage) = storage();
        storage.open("app-cache-v2").await.expect("open");
        let half_written = storage.root().join("app-cache-v1");
        std::fs::create_dir_all(&half_written).expect("mkdir");
        std::fs::write(half_written.join("stray.body"), b"x").expect("write");

        assert_eq!(
            storage.keys().await.expect("keys"),
            vec!["app-cache-v1", "app-cache-v2"]
        );
        assert!(storage.entries("app-cache-v1").await.expect("entries").is_empty());
        assert!(storage.delete("app-cache-v1").await.expect("delete"));
        assert!(!half_written.exists());
        assert_eq!(storage.keys().await.expect("keys"), vec!["app-cache-v2"]);
    }

    #[tokio::test]
    async fn test_failed_put_leaves_no_orphan_body() {
        let (_dir, storage) = storage();
        storage.put("v1", "GET /", cached("/", b"shell")).await.expect("put");
        let store_dir = storage.root().join("v1");
        std::fs::write(store_dir.join(INDEX_FILE), "not json").expect("write");

        let result = storage.put("v1", "GET /logo.png", cached("/logo.png", b"png")).await;
        assert!(matches!(result, Err(CacheError::CorruptIndex { .. })));
        assert_eq!(body_files(&store_dir), 1);
    }
}
