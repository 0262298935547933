//! Request routing for the `config/admin` path.
//!
//! [`Backend::handle_request`] is the operation-level contract. Bad input and
//! external-service failures come back as an `Ok(Response)` carrying an error
//! message in `data["error"]`; only storage failures and routing mistakes are
//! returned as `Err`.
//!
//! Updates persist first and verify second. If the version check fails the
//! record stays written and the response carries both the operator-facing
//! message and the client's own error as its [`Response::cause`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::client::ArtifactoryClient;
use crate::config::CachedRootCert;
use crate::config_store::ConfigStore;
use crate::error::BackendError;
use crate::store::Storage;
use crate::template::TemplateContext;
use crate::validate::validate_update;

/// Request path of the admin configuration.
pub const CONFIG_ADMIN_PATH: &str = "config/admin";

/// Key under which a response-level error message is reported.
pub const ERROR_KEY: &str = "error";

/// Operation kinds dispatched by the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Update,
    Delete,
    List,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::List => "list",
        };
        f.write_str(name)
    }
}

/// An inbound operation against a path, with its payload and storage view.
#[derive(Clone)]
pub struct Request {
    pub operation: Operation,
    pub path: String,
    pub data: Map<String, Value>,
    pub storage: Arc<dyn Storage>,
}

impl Request {
    /// A request with an empty payload.
    pub fn new(operation: Operation, path: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        Self {
            operation,
            path: path.into(),
            data: Map::new(),
            storage,
        }
    }

    /// Attach a payload.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Payload may hold the access token.
        f.debug_struct("Request")
            .field("operation", &self.operation)
            .field("path", &self.path)
            .field("fields", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The structured result of a handled operation.
#[derive(Debug, Default)]
pub struct Response {
    pub data: Map<String, Value>,
    pub warnings: Vec<String>,
    cause: Option<BackendError>,
}

impl Response {
    /// An empty, successful response.
    pub fn new() -> Self {
        Self::default()
    }

    /// A successful response carrying `data`.
    pub fn with_data(data: Map<String, Value>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// A response-level error with only a message.
    pub fn error(message: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert(ERROR_KEY.to_string(), Value::String(message.into()));
        Self::with_data(data)
    }

    /// A response-level error that also keeps the typed error behind it.
    pub fn error_with_cause(message: impl Into<String>, cause: BackendError) -> Self {
        let mut response = Self::error(message);
        response.cause = Some(cause);
        response
    }

    pub fn is_error(&self) -> bool {
        self.data.contains_key(ERROR_KEY)
    }

    /// The response-level error message, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.data.get(ERROR_KEY).and_then(Value::as_str)
    }

    /// The typed error behind a response-level error, if any.
    pub fn cause(&self) -> Option<&BackendError> {
        self.cause.as_ref()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

impl From<BackendError> for Response {
    fn from(err: BackendError) -> Self {
        Self::error_with_cause(err.to_string(), err)
    }
}

/// Handles operations on the admin configuration path.
#[derive(Clone)]
pub struct Backend {
    client: Arc<dyn ArtifactoryClient>,
}

impl Backend {
    /// Create a backend that verifies credentials through `client`.
    pub fn new(client: Arc<dyn ArtifactoryClient>) -> Self {
        Self { client }
    }

    /// Route a request to its handler.
    #[instrument(
        skip(self, request),
        fields(operation = %request.operation, path = %request.path)
    )]
    pub async fn handle_request(&self, request: Request) -> Result<Response, BackendError> {
        let path = request.path.trim_matches('/');
        if path != CONFIG_ADMIN_PATH {
            return Err(BackendError::UnsupportedPath {
                path: request.path.clone(),
            });
        }

        let store = ConfigStore::new(request.storage.clone());
        match request.operation {
            Operation::Read => self.handle_read(&store).await,
            Operation::Update => self.handle_update(&store, &request.data).await,
            Operation::Delete => handle_delete(&store).await,
            Operation::List => Err(BackendError::UnsupportedOperation {
                operation: request.operation,
                path: path.to_string(),
            }),
        }
    }

    async fn handle_read<S: Storage>(
        &self,
        store: &ConfigStore<S>,
    ) -> Result<Response, BackendError> {
        let Some(config) = store.get().await? else {
            debug!("read before configuration");
            return Ok(BackendError::NotConfigured.into());
        };

        let mut view = config.view();
        let mut warnings = Vec::new();
        match self.client.get_version(&config.connection()).await {
            Ok(version) => view.version = Some(version),
            Err(e) => {
                warn!(error = %e, "version check failed during read");
                warnings.push(format!("Unable to get Artifactory Version: {}", e));
            }
        }

        let mut response = Response::with_data(view.into_data()?);
        response.warnings = warnings;
        Ok(response)
    }

    async fn handle_update<S: Storage>(
        &self,
        store: &ConfigStore<S>,
        payload: &Map<String, Value>,
    ) -> Result<Response, BackendError> {
        let existing = store.get().await?;
        let delta = match validate_update(payload, existing.as_ref()) {
            Ok(delta) => delta,
            Err(e) => {
                info!(error = %e, "rejected configuration update");
                return Ok(BackendError::Validation(e).into());
            }
        };

        // Merge onto the snapshot the delta was validated against.
        let config = store.put(existing, delta).await?;

        // The record is already persisted; a failed check is reported, not undone.
        let conn = config.connection();
        let version = match self.client.get_version(&conn).await {
            Ok(version) => version,
            Err(e) => {
                warn!(
                    error = %e,
                    url = %config.artifactory_url,
                    "version check failed after update"
                );
                return Ok(Response::error_with_cause(
                    format!("Unable to get Artifactory Version: {}", e),
                    BackendError::Client(e),
                ));
            }
        };
        info!(%version, "verified Artifactory credentials");

        let mut response = Response::new();
        if config.use_expiring_tokens && config.root_cert.is_none() {
            match self.client.get_root_certificate(&conn).await {
                Ok(pem) => {
                    let cert = CachedRootCert::new(pem);
                    if store.set_root_cert(cert, &conn).await?.is_none() {
                        warn!("configuration changed while fetching root certificate");
                        response.add_warning(
                            "Artifactory root certificate discarded: \
                             configuration changed while it was fetched",
                        );
                    }
                }
                Err(e) => {
                    warn!(error = %e, "root certificate fetch failed");
                    response.add_warning(format!(
                        "Unable to get Artifactory root certificate: {}",
                        e
                    ));
                }
            }
        }
        Ok(response)
    }

    /// Fetch the service root certificate and cache it with the record,
    /// replacing any cached one.
    ///
    /// Fails with [`BackendError::ConfigurationChanged`] if the record was
    /// deleted or repointed while the certificate was in flight.
    pub async fn refresh_root_certificate<S: Storage>(
        &self,
        storage: S,
    ) -> Result<CachedRootCert, BackendError> {
        let store = ConfigStore::new(storage);
        let conn = store.require().await?.connection();
        let pem = self.client.get_root_certificate(&conn).await?;
        let cert = CachedRootCert::new(pem);
        if store.set_root_cert(cert.clone(), &conn).await?.is_none() {
            return Err(BackendError::ConfigurationChanged);
        }
        info!(sha256 = %cert.sha256(), "refreshed Artifactory root certificate");
        Ok(cert)
    }

    /// Render a username from the stored template.
    pub async fn generate_username<S: Storage>(
        &self,
        storage: S,
        context: &TemplateContext,
    ) -> Result<String, BackendError> {
        let config = ConfigStore::new(storage).require().await?;
        let template = config.compiled_username_template()?;
        let username = template.render(context)?;
        debug!(%username, "generated username");
        Ok(username)
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}

async fn handle_delete<S: Storage>(store: &ConfigStore<S>) -> Result<Response, BackendError> {
    store.delete().await?;
    Ok(Response::new())
}
