//! Top-level error types for the backend.

use thiserror::Error;

use crate::backend::Operation;
use crate::client::ClientError;
use crate::store::StoreError;
use crate::template::{EvalError, TemplateError};
use crate::validate::ValidationError;

/// Error type encompassing every backend failure.
///
/// Returned as `Err` from request handling only for infrastructure trouble
/// (storage, routing). Input and external-service failures travel inside a
/// [`Response`](crate::backend::Response) as its cause.
#[derive(Debug, Error)]
pub enum BackendError {
    /// No admin configuration has been written yet.
    #[error("backend not configured")]
    NotConfigured,

    /// The update payload was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The stored username template no longer compiles.
    #[error("username_template error: {0}")]
    Template(#[from] TemplateError),

    /// Rendering a username failed.
    #[error("failed to render username: {0}")]
    Render(#[from] EvalError),

    /// The record was deleted or repointed while a call against it was in
    /// flight.
    #[error("configuration changed during the operation")]
    ConfigurationChanged,

    /// Error from the storage collaborator.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Error from the Artifactory client.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// No handler is registered for the path.
    #[error("unsupported path: {path}")]
    UnsupportedPath { path: String },

    /// The path exists but does not accept the operation.
    #[error("unsupported operation {operation} on {path}")]
    UnsupportedOperation { operation: Operation, path: String },
}

impl BackendError {
    /// Whether this error signals infrastructure failure rather than bad
    /// input or an unreachable service.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
