use thiserror::Error;

/// Failure of a single call to one backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("connection to {address} refused: {reason}")]
    ConnectionRefused { address: String, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned status {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("call cancelled")]
    Cancelled,
}

impl BackendError {
    /// Cancellation is caller-initiated and never counts as a backend fault.
    pub fn is_backend_fault(&self) -> bool {
        !matches!(self, BackendError::Cancelled)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("unknown site: {0}")]
    UnknownSite(String),

    #[error("{operation} requires a target site")]
    MissingTarget { operation: &'static str },

    #[error("backend for {domain} failed: {source}")]
    Backend {
        domain: String,
        #[source]
        source: BackendError,
    },

    #[error("request cancelled")]
    Cancelled,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate site domain: {0}")]
    DuplicateDomain(String),

    #[error("site with address {0} has an empty domain")]
    EmptyDomain(String),
}
