//! The offline cache worker.
//!
//! `CacheWorker` keeps the application shell and previously seen assets
//! available without a connection while keeping navigations fresh when one
//! exists. The host runtime drives it through:
//!
//! - `install()`: open the versioned store and pre-cache the shell manifest
//! - `activate()`: purge every store left behind by other versions
//! - `handle()`: route an intercepted request (see [`routing::route`])
//! - `pass_through()`: the plain network fetch for a request `handle()` left alone
//! - `flush()`: wait for background cache writes to land
//!
//! Cache failures never fail a lifecycle step or a request; the worker logs
//! them and degrades to network-only behavior.

pub mod error;
pub mod lifecycle;
pub mod routing;

use std::sync::Arc;

use futures::future::join_all;
use reqwest::Url;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheStorage, CachedResponse};
use crate::models::{Request, RequestMode, Response};
use crate::net::Fetcher;

pub use error::WorkerError;
pub use lifecycle::WorkerState;
pub use routing::{route, Route};

/// Settings injected into a worker at construction.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Version-tagged name of the current cache store
    pub cache_name: String,
    /// Origin of the controlled pages
    pub origin: Url,
    /// Shell URLs pre-cached on install
    pub precache: Vec<Url>,
}

/// Result of an intercepted request.
#[derive(Debug)]
pub enum Handled {
    /// Not intercepted; the caller performs a normal network fetch,
    /// e.g. with [`CacheWorker::pass_through`]
    PassThrough,
    /// Served from the network
    Network(Response),
    /// Served from the cache store
    Cache(Response),
    /// Neither network nor cache could answer
    Unavailable,
}

impl Handled {
    pub fn response(&self) -> Option<&Response> {
        match self {
            Handled::Network(r) | Handled::Cache(r) => Some(r),
            Handled::PassThrough | Handled::Unavailable => None,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            Handled::Network(r) | Handled::Cache(r) => Some(r),
            Handled::PassThrough | Handled::Unavailable => None,
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            Handled::PassThrough => "pass-through",
            Handled::Network(_) => "network",
            Handled::Cache(_) => "cache",
            Handled::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrecacheFailure {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    pub cache_name: String,
    /// False when the store could not be opened and pre-caching was skipped
    pub store_available: bool,
    pub cached: Vec<String>,
    pub failed: Vec<PrecacheFailure>,
}

#[derive(Debug, Clone, Default)]
pub struct ActivateReport {
    pub current: String,
    pub deleted: Vec<String>,
}

pub struct CacheWorker<F, S> {
    settings: WorkerSettings,
    fetcher: Arc<F>,
    storage: Arc<S>,
    state: Mutex<WorkerState>,
    pending_writes: Mutex<JoinSet<()>>,
}

impl<F: Fetcher, S: CacheStorage> CacheWorker<F, S> {
    pub fn new(settings: WorkerSettings, fetcher: F, storage: Arc<S>) -> Self {
        Self::resume(settings, fetcher, storage, WorkerState::Parsed)
    }

    /// Rebuild a worker in a state an earlier run already reached.
    pub fn resume(
        settings: WorkerSettings,
        fetcher: F,
        storage: Arc<S>,
        state: WorkerState,
    ) -> Self {
        Self {
            settings,
            fetcher: Arc::new(fetcher),
            storage,
            state: Mutex::new(state),
            pending_writes: Mutex::new(JoinSet::new()),
        }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.lock().await
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the current store and pre-cache the shell manifest.
    ///
    /// Each manifest URL is fetched independently; a failure is logged and
    /// reported but never aborts install.
    pub async fn install(&self) -> Result<InstallReport, WorkerError> {
        self.state.lock().await.transition(WorkerState::Installing)?;
        let cache_name = &self.settings.cache_name;
        info!(cache = %cache_name, urls = self.settings.precache.len(), "Installing worker");

        let mut report = InstallReport {
            cache_name: cache_name.clone(),
            ..Default::default()
        };

        match self.storage.open(cache_name).await {
            Ok(()) => {
                debug!(cache = %cache_name, "Opened cache");
                report.store_available = true;

                let results =
                    join_all(self.settings.precache.iter().map(|url| self.precache_one(url))).await;
                for (url, result) in self.settings.precache.iter().zip(results) {
                    match result {
                        Ok(()) => report.cached.push(url.to_string()),
                        Err(reason) => {
                            warn!(url = %url, reason = %reason, "Failed to cache initial asset");
                            report.failed.push(PrecacheFailure {
                                url: url.to_string(),
                                reason,
                            });
                        }
                    }
                }
            }
            Err(e) => {
                error!(cache = %cache_name, error = %e, "Failed to open cache, skipping pre-cache");
            }
        }

        self.state.lock().await.transition(WorkerState::Installed)?;
        info!(
            cache = %cache_name,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "Worker installed"
        );
        Ok(report)
    }

    async fn precache_one(&self, url: &Url) -> Result<(), String> {
        let request = Request::get(url.clone()).with_mode(RequestMode::Cors);
        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| e.to_string())?;

        if !response.is_cacheable() {
            return Err(format!(
                "response not cacheable (status {}, {})",
                response.status,
                response.kind.as_str()
            ));
        }

        self.storage
            .put(
                &self.settings.cache_name,
                &request.cache_key(),
                CachedResponse::from(response),
            )
            .await
            .map_err(|e| e.to_string())
    }

    /// Delete every store except the current one.
    pub async fn activate(&self) -> Result<ActivateReport, WorkerError> {
        self.state.lock().await.transition(WorkerState::Activating)?;
        let current = &self.settings.cache_name;

        let mut report = ActivateReport {
            current: current.clone(),
            deleted: Vec::new(),
        };

        match self.storage.keys().await {
            Ok(names) => {
                let stale: Vec<String> = names.into_iter().filter(|n| n != current).collect();
                let results = join_all(stale.iter().map(|name| self.storage.delete(name))).await;
                for (name, result) in stale.into_iter().zip(results) {
                    match result {
                        Ok(true) => {
                            info!(cache = %name, "Deleted old cache");
                            report.deleted.push(name);
                        }
                        Ok(false) => debug!(cache = %name, "Old cache already gone"),
                        Err(e) => warn!(cache = %name, error = %e, "Failed to delete old cache"),
                    }
                }
            }
            Err(e) => warn!(error = %e, "Failed to enumerate caches, skipping cleanup"),
        }

        self.state.lock().await.transition(WorkerState::Activated)?;
        info!(cache = %current, deleted = report.deleted.len(), "Worker activated");
        Ok(report)
    }

    // =========================================================================
    // Request Interception
    // =========================================================================

    /// Route an intercepted request.
    ///
    /// Returns `Err` only when a cache-first request misses the cache and the
    /// network fetch fails.
    pub async fn handle(&self, request: &Request) -> Result<Handled, WorkerError> {
        let state = self.state().await;
        if state != WorkerState::Activated {
            debug!(request = %request, state = %state, "Worker not in control, passing through");
            return Ok(Handled::PassThrough);
        }

        match route(request) {
            Route::PassThrough => Ok(Handled::PassThrough),
            Route::NetworkFirst => Ok(self.network_first(request).await),
            Route::CacheFirst => self.cache_first(request).await,
        }
    }

    /// Fetch `request` from the network as if no worker were installed.
    /// Nothing is read from or written to the cache.
    pub async fn pass_through(&self, request: &Request) -> Result<Response, WorkerError> {
        debug!(request = %request, "Passing request to the network");
        Ok(self.fetcher.fetch(request).await?)
    }

    async fn network_first(&self, request: &Request) -> Handled {
        match self.fetcher.fetch(request).await {
            Ok(response) if response.is_cacheable() => {
                self.write_through(request, response.duplicate()).await;
                return Handled::Network(response);
            }
            Ok(response) => {
                debug!(
                    url = %request.url,
                    status = response.status,
                    kind = response.kind.as_str(),
                    "Navigation response not cacheable, falling back to cache"
                );
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Navigation fetch failed, falling back to cache");
            }
        }

        match self.lookup(request).await {
            Some(cached) => Handled::Cache(cached.into_response()),
            None => Handled::Unavailable,
        }
    }

    async fn cache_first(&self, request: &Request) -> Result<Handled, WorkerError> {
        if let Some(cached) = self.lookup(request).await {
            debug!(url = %request.url, "Cache hit");
            return Ok(Handled::Cache(cached.into_response()));
        }

        let response = self.fetcher.fetch(request).await?;
        if response.is_cacheable() {
            self.write_through(request, response.duplicate()).await;
        } else {
            debug!(
                url = %request.url,
                status = response.status,
                kind = response.kind.as_str(),
                "Response not cacheable, returning as-is"
            );
        }
        Ok(Handled::Network(response))
    }

    async fn lookup(&self, request: &Request) -> Option<CachedResponse> {
        match self
            .storage
            .match_entry(&self.settings.cache_name, &request.cache_key())
            .await
        {
            Ok(found) => found,
            Err(e) => {
                warn!(url = %request.url, error = %e, "Cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Store `copy` in the background; the caller keeps the original.
    async fn write_through(&self, request: &Request, copy: Response) {
        let storage = Arc::clone(&self.storage);
        let cache_name = self.settings.cache_name.clone();
        let key = request.cache_key();

        let mut pending = self.pending_writes.lock().await;
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            if let Err(e) = storage
                .put(&cache_name, &key, CachedResponse::from(copy))
                .await
            {
                warn!(cache = %cache_name, key = %key, error = %e, "Failed to write response to cache");
            }
        });
    }

    /// Wait for all background cache writes started so far.
    /// Returns the number of writes awaited.
    pub async fn flush(&self) -> usize {
        let mut pending = std::mem::take(&mut *self.pending_writes.lock().await);
        let mut completed = 0;
        while let Some(result) = pending.join_next().await {
            match result {
                Ok(()) => completed += 1,
                Err(e) => error!(error = %e, "Cache write task failed"),
            }
        }
        completed
    }
}

// ============================================================================
// Tests
// ============================================================================
