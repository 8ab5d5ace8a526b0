use creatorlink_common::Platform;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The code exchange was rejected or returned a non-token payload.
    #[error("{platform} code exchange failed: {detail}")]
    AuthExchange { platform: Platform, detail: String },

    /// A provider payload did not match its documented shape.
    #[error("{platform} returned a malformed payload: {detail}")]
    InvalidResponse { platform: Platform, detail: String },

    /// Token refresh failed. For rotating-token platforms this can leave the
    /// account unrecoverable without a re-link, so it is always surfaced.
    #[error("{platform} token refresh failed: {detail}")]
    Refresh { platform: Platform, detail: String },

    /// Non-2xx response on a profile or post read.
    #[error("{platform} API error (status {status}): {detail}")]
    Api {
        platform: Platform,
        status: u16,
        detail: String,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}
