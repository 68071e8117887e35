use reqwest::StatusCode;
use thiserror::Error;

/// Failures talking to a worker node's management API.
#[derive(Debug, Error)]
pub enum NodeClientError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{path} returned {status}: {body}")]
    UnexpectedStatus {
        path: String,
        status: StatusCode,
        body: String,
    },

    #[error("{0} not found on node")]
    NotFound(String),

    #[error("failed to decode response from {path}: {message}")]
    Decode { path: String, message: String },

    #[error("authentication failed (session: {session}; legacy: {legacy})")]
    Authentication { session: String, legacy: String },

    #[error("node {node_id} still rejects credentials after re-authentication")]
    AuthenticationExhausted { node_id: String },
}
