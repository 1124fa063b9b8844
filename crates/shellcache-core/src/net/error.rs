use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Offline: {0}")]
    Offline(String),
}

/// Maximum length for URLs embedded in error messages
const MAX_URL_LENGTH: usize = 200;

impl FetchError {
    /// Truncate a URL to avoid logging huge query strings
    pub(crate) fn truncate_url(url: &str) -> String {
        if url.len() <= MAX_URL_LENGTH {
            url.to_string()
        } else {
            let cut: String = url.chars().take(MAX_URL_LENGTH).collect();
            format!("{}... (truncated, {} total bytes)", cut, url.len())
        }
    }

    pub fn invalid_request(url: &str, reason: &str) -> Self {
        FetchError::InvalidRequest(format!("{}: {}", Self::truncate_url(url), reason))
    }
}
