//! Offline cache worker for the marketplace storefront.
//!
//! Keeps the storefront's application shell and previously seen assets
//! available without a connection: navigations go network-first with a cache
//! fallback, other GETs go cache-first, and each deployment gets its own
//! version-tagged cache store that replaces the previous one on activation.
//!
//! - [`worker`]: lifecycle (install/activate) and request routing
//! - [`cache`]: named cache stores on disk or in memory
//! - [`net`]: the network fetcher seam and its reqwest implementation
//! - [`config`], [`registration`]: host runtime configuration and state

pub mod cache;
pub mod config;
pub mod models;
pub mod net;
pub mod registration;
pub mod utils;
pub mod worker;

pub use cache::{CacheError, CacheStorage, CachedResponse, DiskCacheStorage, MemoryCacheStorage};
pub use config::Config;
pub use models::{Request, RequestMode, Response, ResponseKind};
pub use net::{FetchError, Fetcher, HttpFetcher, OfflineFetcher};
pub use registration::{Registration, RegistrationData};
pub use worker::{CacheWorker, Handled, WorkerError, WorkerSettings, WorkerState};

pub use reqwest::{Method, Url};
