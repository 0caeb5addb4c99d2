//! Error types surfaced by the sharding core.

use thiserror::Error;

/// Failures the locator, assigner and change log can produce.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no row matches the query")]
    NotFound,

    #[error("no storage available to host bucket '{0}' without a colocation violation")]
    NoAvailableStorage(String),

    #[error("ambiguous routing: {0} buckets survived filtering but multiple=false")]
    AmbiguousRouting(usize),

    #[error("schema sync: unmapped property type '{0}'")]
    InvalidType(String),

    #[error("{0}")]
    Backend(#[from] BackendError),
}

/// Opaque error from a storage backend, boxed so any driver implementation
/// can plug in its own error type without the core depending on it.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BackendError(pub Box<dyn std::error::Error + Send + Sync>);

impl BackendError {
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
