//! Crate-level error types.
//!
//! [`TickwatchError`] unifies every error source (configuration, HTTP,
//! WebSocket, JSON, exchange-reported failures) behind a single enum so
//! callers can match on the variant they care about while still using the
//! `?` operator for easy propagation.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TickwatchError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum TickwatchError {
    /// A configuration value or file could not be read or validated.
    #[error("configuration error: {0}")]
    Config(String),

    /// An HTTP request to an exchange REST API failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A WebSocket operation (connect, send, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A payload parsed as JSON but did not have the expected shape.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The exchange accepted the request but reported an error.
    #[error("exchange error: {0}")]
    Exchange(String),

    /// The adapter does not support the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}
