//! Error types for the client.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while talking to the API.
///
/// Every variant that relates to a request carries the URL so the failure can
/// be reproduced without the server interaction.
#[derive(Error, Debug)]
pub enum Error {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status} {reason} ({url})")]
    Transport {
        url: String,
        status: u16,
        reason: String,
    },

    /// No response at all (DNS, TLS, timeout, ...).
    #[error("network error: {source} ({url})")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Body was not JSON, or was JSON in none of the known envelope shapes.
    #[error("unrecognized response format: {reason} ({url})")]
    ResponseFormat { url: String, reason: String },

    /// The response header carried a `message` entry.
    #[error("API error: {key}: {value} ({url})")]
    Api {
        url: String,
        key: String,
        value: String,
    },

    /// No chunkable parameter could bring the URL under the length limit.
    #[error("request parameters exceed the API's maximum URL length of {max_length} ({url})")]
    ChunkLimit { url: String, max_length: usize },

    /// A dimension or setting that the target database does not know.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed alias document or alias pattern.
    #[error("alias table error: {0}")]
    AliasTable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn format(url: &str, reason: impl Into<String>) -> Self {
        Error::ResponseFormat {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// True for the kinds the API produces when asked for metadata that does not exist.
    pub fn is_empty_probe(&self) -> bool {
        matches!(self, Error::ResponseFormat { .. } | Error::Api { .. })
    }
}
