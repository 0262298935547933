//! # Artiforge Core
//!
//! Configuration and credential core of the Artifactory secrets backend.
//!
//! This crate provides:
//! - A username template engine with a fixed function registry
//! - Schema validation and partial merging of the admin configuration
//! - A single-record config store over a pluggable storage view
//! - The `config/admin` request handler, which verifies credentials against
//!   Artifactory after every update
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use artiforge_core::{Backend, HttpArtifactoryClient, MemoryStorage, Operation, Request};
//!
//! let backend = Backend::new(Arc::new(HttpArtifactoryClient::with_default_timeout()?));
//! let storage = Arc::new(MemoryStorage::new());
//!
//! let response = backend
//!     .handle_request(Request::new(Operation::Read, "config/admin", storage))
//!     .await?;
//! assert_eq!(response.error_message(), Some("backend not configured"));
//! ```

pub mod backend;
pub mod client;
pub mod config;
pub mod config_store;
pub mod error;
pub mod store;
pub mod template;
pub mod validate;

// Re-export commonly used types at crate root
pub use backend::{
    Backend,
    Operation,
    Request,
    Response,
    CONFIG_ADMIN_PATH,
};

pub use client::{
    ArtifactoryClient,
    ClientError,
    ConnectionParams,
};

#[cfg(feature = "http-client")]
pub use client::HttpArtifactoryClient;

pub use config::{
    AdminConfiguration,
    CachedRootCert,
    ConfigDelta,
    ConfigView,
};

pub use config_store::{
    ConfigStore,
    CONFIG_ADMIN_KEY,
};

pub use error::BackendError;

pub use store::{
    FileStorage,
    MemoryStorage,
    Secret,
    Storage,
    StorageEntry,
    StoreError,
};

pub use template::{
    EvalError,
    TemplateContext,
    TemplateError,
    UsernameTemplate,
    DEFAULT_USERNAME_TEMPLATE,
};

pub use validate::{
    validate_update,
    ValidationError,
};
