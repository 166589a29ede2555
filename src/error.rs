//! Error taxonomy shared by the signer and the request pipeline.

use thiserror::Error;

/// Errors raised by this crate.
///
/// `Validation` errors are fatal to the request and map to a 400 response
/// before any external call is made. `Upstream` errors are logged and, where
/// the handler contract allows, the invocation continues with partial data.
/// `Config` errors only happen at cold-start, before the runtime starts
/// polling for events.
#[derive(Debug, Error)]
pub enum Error {
    /// The request payload is oversized or malformed, or a signer input is
    /// missing.
    #[error("invalid input: {0}")]
    Validation(String),
    /// An external service (embedding, completion, vector store, template or
    /// parameter retrieval) failed.
    #[error("upstream service error: {0}")]
    Upstream(String),
    /// Required configuration is missing or unparsable.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wraps an upstream service failure, keeping its display form.
    pub fn upstream(err: impl std::fmt::Display) -> Self {
        Error::Upstream(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
