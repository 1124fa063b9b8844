use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Response type as seen by the requesting page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response, fully readable
    Basic,
    /// Cross-origin response that passed CORS
    Cors,
    /// Cross-origin no-cors response; status and body are hidden
    Opaque,
    /// Network error
    Error,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Basic => "basic",
            ResponseKind::Cors => "cors",
            ResponseKind::Opaque => "opaque",
            ResponseKind::Error => "error",
        }
    }
}

/// A fetch result.
///
/// A response body can be consumed once. `Response` is not `Clone`: a
/// response that is both returned to the page and written to a
/// cache store must be copied with [`Response::duplicate`] before either
/// consumer takes it.
#[derive(Debug)]
pub struct Response {
    pub url: Url,
    pub status: u16,
    pub kind: ResponseKind,
    pub headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    pub fn new(
        url: Url,
        status: u16,
        kind: ResponseKind,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            url,
            status,
            kind,
            headers,
            body,
        }
    }

    /// An opaque response: status 0, no headers, no body.
    pub fn opaque(url: Url) -> Self {
        Self::new(url, 0, ResponseKind::Opaque, Vec::new(), Vec::new())
    }

    /// An independent copy with its own body.
    pub fn duplicate(&self) -> Self {
        Self {
            url: self.url.clone(),
            status: self.status,
            kind: self.kind,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Whether this response may be written to a cache store: a plain 200 on
    /// a same-origin response. Opaque and CORS responses are never stored.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.kind == ResponseKind::Basic
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
