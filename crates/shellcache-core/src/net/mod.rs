//! Network access for the offline worker.
//!
//! The worker never talks to the network directly; it goes through the
//! `Fetcher` trait so a host runtime can plug in the real HTTP client
//! (`HttpFetcher`) or `OfflineFetcher` when no connection is available.

pub mod client;
pub mod error;

use async_trait::async_trait;

use crate::models::{Request, Response};

pub use client::HttpFetcher;
pub use error::FetchError;

/// Performs the network half of a fetch.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// A fetcher with no network: every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

#[async_trait]
impl Fetcher for OfflineFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        Err(FetchError::Offline(FetchError::truncate_url(request.url.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    #[tokio::test]
    async fn test_offline_fetcher_always_fails() {
        let req = Request::get(Url::parse("https://kedai.example/").expect("url"));
        let err = OfflineFetcher.fetch(&req).await.expect_err("offline");
        assert_eq!(err.to_string(), "Offline: https://kedai.example/");
    }
}
