//! Error types for the DATAR client.

/// Top-level error type for the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failures talking to the backend.
///
/// Any non-2xx response is a failure; its body is never inspected.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Invalid response body from {endpoint}: {reason}")]
    InvalidBody { endpoint: String, reason: String },

    #[error("Invalid base URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Lookups against the loaded catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Agent {id} not found")]
    AgentNotFound { id: String },

    #[error("Experience {id} not found")]
    ExperienceNotFound { id: String },
}

/// Rejected chat operations. None of these change the transcript.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("No agent selected")]
    NoActiveAgent,

    #[error("A message is already being sent")]
    Busy,
}

/// Result type alias for the client.
pub type Result<T> = std::result::Result<T, Error>;
