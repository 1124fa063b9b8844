//! HTTP fetcher backed by reqwest.
//!
//! `HttpFetcher` performs the real network fetch for the worker and labels
//! each response the way a browser would for the controlled page: same-origin
//! responses are `basic`, cross-origin `no-cors` responses are `opaque`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use crate::models::{Request, RequestMode, Response, ResponseKind};

use super::{FetchError, Fetcher};

/// Fetcher for live network requests.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    origin: Url,
}

impl HttpFetcher {
    /// Create a fetcher for pages served from `origin`
    pub fn with_timeout(origin: Url, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, origin })
    }

    /// Response type for a response to `request` that ended at `final_url`.
    fn classify(&self, request: &Request, final_url: &Url) -> ResponseKind {
        let same_origin = request.is_same_origin(&self.origin)
            && final_url.origin() == self.origin.origin();
        if same_origin {
            ResponseKind::Basic
        } else if request.mode == RequestMode::NoCors {
            ResponseKind::Opaque
        } else {
            ResponseKind::Cors
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        if request.mode == RequestMode::SameOrigin && !request.is_same_origin(&self.origin) {
            return Err(FetchError::invalid_request(
                request.url.as_str(),
                "same-origin request to a foreign origin",
            ));
        }

        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .send()
            .await?;

        let final_url = response.url().clone();
        let kind = self.classify(request, &final_url);
        if kind == ResponseKind::Opaque {
            debug!(url = %request.url, "Cross-origin no-cors response, returning opaque");
            return Ok(Response::opaque(final_url));
        }

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(url = %request.url, status, kind = kind.as_str(), bytes = body.len(), "Fetched");
        Ok(Response::new(final_url, status, kind, headers, body))
    }
}
