//! Error types for every stage of the bridge.
//!
//! Each component returns its own error enum. None of these carry text meant for
//! end users; [`crate::flow::FlowError::user_message`] does that translation at the
//! outer boundary.

/// Network-level failure on any signed request to Commons.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request signing failed: {0}")]
    Signing(String),
}

/// The source catalog was unreachable or returned something unusable.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream request to {url} failed: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("upstream returned status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("malformed upstream body from {url}: {source}")]
    Malformed {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A required configuration value was absent when a step needed it.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(&'static str),
}

/// Failures of the OAuth1 handshake.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The authorization server answered without a usable token pair.
    #[error("authorization server did not return a token pair: {0}")]
    Init(String),

    /// The handshake was entered out of order (no temporary pair in session).
    #[error("handshake state missing: {0}")]
    State(&'static str),

    #[error("authorization transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Exceptional failures of the upload protocol.
///
/// A rejected upload is not an error; see [`crate::upload::UploadResult::Failure`].
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("edit token missing from response: {0}")]
    Token(String),

    #[error("upload transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("malformed upload response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Commons refused the structured-data edit. Only ever logged.
    #[error("structured data rejected: {code}: {info}")]
    StructuredData { code: String, info: String },
}

/// A session could not be used.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session expired")]
    Expired,

    #[error("unknown session")]
    Unknown,
}
