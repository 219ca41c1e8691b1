use reqwest::StatusCode;
use thiserror::Error;

/// Result alias used throughout the probe pipeline
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Probe error types
///
/// Every variant ends up as the `ZBX_NOTSUPPORTED` sentinel on stdout; the
/// variant only decides what is written to the log.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Connection, TLS or timeout failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-403 HTTP error status from the target
    #[error("upstream error ({status}): {body}")]
    Upstream { status: StatusCode, body: String },

    /// Malformed exposition text or JSON
    #[error("parse error: {0}")]
    Parse(String),

    /// Requested metric, path or annotation is absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed `-m` / `-v` argument
    #[error("bad query syntax: {0}")]
    BadQuerySyntax(String),

    /// Query type the probe cannot answer
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Missing or invalid local configuration (env file, certificates, token)
    #[error("configuration error: {0}")]
    Config(String),
}

impl ProbeError {
    /// Stable short name, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network_error",
            Self::Upstream { .. } => "upstream_error",
            Self::Parse(_) => "parse_error",
            Self::NotFound(_) => "not_found",
            Self::BadQuerySyntax(_) => "bad_query_syntax",
            Self::NotSupported(_) => "not_supported",
            Self::Config(_) => "config_error",
        }
    }
}

impl From<serde_json::Error> for ProbeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(format!("JSON error: {}", err))
    }
}
