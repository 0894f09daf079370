//! Error types for k8s-nameserver.

use thiserror::Error;

/// Errors that can occur in the nameserver.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Hosts file is not valid JSON.
    #[error("invalid DNS config: {0}")]
    Json(#[from] serde_json::Error),

    /// Hostname cannot be converted to a fully-qualified domain name.
    #[error("invalid DNS config: cannot convert {0:?} to FQDN")]
    InvalidFqdn(String),

    /// Address literal cannot be parsed.
    #[error("invalid DNS config: cannot convert {0:?} to IP address")]
    InvalidAddress(String),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// Filesystem watch error
    #[error("config watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Invalid server settings
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The config change channel closed while the nameserver was running.
    #[error("config watcher finished unexpectedly")]
    WatcherClosed,
}

impl DnsError {
    /// True for errors caused by the contents of the hosts file rather than
    /// by reading it.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DnsError::Json(_) | DnsError::InvalidFqdn(_) | DnsError::InvalidAddress(_)
        )
    }
}

/// A failed query that still produced a response worth sending.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct QueryError {
    /// Wire-format response to send back to the client anyway.
    pub response: Vec<u8>,

    /// What went wrong while answering.
    #[source]
    pub source: DnsError,
}

impl QueryError {
    /// Wrap an error together with its best-effort response.
    pub fn new(response: Vec<u8>, source: impl Into<DnsError>) -> Self {
        Self {
            response,
            source: source.into(),
        }
    }
}
