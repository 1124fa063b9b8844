use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::models::{Response, ResponseKind};
use crate::utils::format_age;

/// A response snapshot held by a cache store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub url: Url,
    pub status: u16,
    pub kind: ResponseKind,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub cached_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Turn the snapshot back into a response for the page.
    pub fn into_response(self) -> Response {
        Response::new(self.url, self.status, self.kind, self.headers, self.body)
    }

    pub fn summary(&self, key: &str) -> EntrySummary {
        EntrySummary {
            key: key.to_string(),
            url: self.url.to_string(),
            status: self.status,
            size: self.size(),
            cached_at: self.cached_at,
        }
    }
}

impl From<Response> for CachedResponse {
    fn from(response: Response) -> Self {
        let url = response.url.clone();
        let status = response.status;
        let kind = response.kind;
        let headers = response.headers.clone();
        Self {
            url,
            status,
            kind,
            headers,
            body: response.into_body(),
            cached_at: Utc::now(),
        }
    }
}

/// Listing row for a cached entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrySummary {
    pub key: String,
    pub url: String,
    pub status: u16,
    pub size: usize,
    pub cached_at: DateTime<Utc>,
}

impl EntrySummary {
    pub fn age_display(&self) -> String {
        format_age((Utc::now() - self.cached_at).num_minutes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn response(body: &[u8]) -> Response {
        Response::new(
            Url::parse("https://kedai.example/manifest.json").expect("url"),
            200,
            ResponseKind::Basic,
            vec![("content-type".to_string(), "application/json".to_string())],
            body.to_vec(),
        )
    }

    #[test]
    fn test_snapshot_round_trip_keeps_response_fields() {
        let cached = CachedResponse::from(response(b"{}"));
        assert_eq!(cached.size(), 2);

        let back = cached.into_response();
        assert_eq!(back.status, 200);
        assert_eq!(back.kind, ResponseKind::Basic);
        assert_eq!(back.header("Content-Type"), Some("application/json"));
        assert_eq!(back.into_body(), b"{}".to_vec());
    }

    #[test]
    fn test_summary_age_display() {
        let mut cached = CachedResponse::from(response(b""));
        assert_eq!(cached.summary("GET /").age_display(), "just now");
        cached.cached_at = Utc::now() - Duration::minutes(90);
        assert_eq!(cached.summary("GET /").age_display(), "2h ago");
    }

    #[test]
    fn test_summary() {
        let cached = CachedResponse::from(response(b"abc"));
        let summary = cached.summary("GET https://kedai.example/manifest.json");
        assert_eq!(summary.size, 3);
        assert_eq!(summary.status, 200);
        assert_eq!(summary.url, "https://kedai.example/manifest.json");
    }
}
