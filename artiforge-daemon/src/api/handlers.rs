//! JSON-RPC API handlers for the daemon.

use anyhow::{Context, Result};
use artiforge_core::{
    Backend, BackendError, FileStorage, HttpArtifactoryClient, Operation, Request, Storage,
};
use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::{ErrorCode, ErrorObject};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::types::RpcResponse;
use crate::config::DaemonConfig;

/// State shared across RPC handlers.
#[derive(Clone)]
pub struct ApiState {
    /// Request handler for the backend paths
    pub backend: Backend,
    /// Storage view handed to every request
    pub storage: Arc<dyn Storage>,
}

impl ApiState {
    /// Create API state backed by file storage and the HTTP client.
    pub fn new(config: &DaemonConfig) -> Result<Self> {
        let storage_dir = config.storage_dir();
        let storage = FileStorage::new(&storage_dir)
            .with_context(|| format!("Failed to open storage at {:?}", storage_dir))?;
        let client = HttpArtifactoryClient::new(config.client_timeout())
            .context("Failed to build Artifactory client")?;

        Ok(Self::with_parts(Backend::new(Arc::new(client)), Arc::new(storage)))
    }

    /// Create API state from existing parts (useful for tests).
    pub fn with_parts(backend: Backend, storage: Arc<dyn Storage>) -> Self {
        Self { backend, storage }
    }
}

/// JSON-RPC API trait definition.
#[rpc(server)]
pub trait ArtiforgeApi {
    /// Read the value at a path.
    ///
    /// # Parameters
    ///
    /// - `path`: Request path (e.g., "config/admin")
    #[method(name = "read")]
    async fn read(&self, path: String) -> RpcResult<RpcResponse>;

    /// Write fields to a path. Fields not named keep their stored values.
    ///
    /// # Parameters
    ///
    /// - `path`: Request path
    /// - `data`: Field name to value
    #[method(name = "write")]
    async fn write(&self, path: String, data: Map<String, Value>) -> RpcResult<RpcResponse>;

    /// Delete the value at a path.
    #[method(name = "delete")]
    async fn delete(&self, path: String) -> RpcResult<RpcResponse>;
}

/// Implementation of the Artiforge API.
pub struct ArtiforgeApiImpl {
    state: ApiState,
}

impl ArtiforgeApiImpl {
    /// Create a new API implementation with the given state.
    pub fn new(state: ApiState) -> Self {
        Self { state }
    }

    async fn dispatch(
        &self,
        operation: Operation,
        path: String,
        data: Map<String, Value>,
    ) -> RpcResult<RpcResponse> {
        let request = Request::new(operation, path, self.state.storage.clone()).with_data(data);
        let response = self
            .state
            .backend
            .handle_request(request)
            .await
            .map_err(backend_error)?;

        if let Some(message) = response.error_message() {
            debug!("RPC: {} returned error response: {}", operation, message);
        }
        Ok(response.into())
    }
}

#[async_trait::async_trait]
impl ArtiforgeApiServer for ArtiforgeApiImpl {
    async fn read(&self, path: String) -> RpcResult<RpcResponse> {
        debug!("RPC: read({})", path);
        self.dispatch(Operation::Read, path, Map::new()).await
    }

    async fn write(&self, path: String, data: Map<String, Value>) -> RpcResult<RpcResponse> {
        // Field names only; values may hold the access token.
        info!("RPC: write({}, fields: {:?})", path, data.keys().collect::<Vec<_>>());
        self.dispatch(Operation::Update, path, data).await
    }

    async fn delete(&self, path: String) -> RpcResult<RpcResponse> {
        info!("RPC: delete({})", path);
        self.dispatch(Operation::Delete, path, Map::new()).await
    }
}

fn backend_error(err: BackendError) -> ErrorObject<'static> {
    let code = match err {
        BackendError::UnsupportedPath { .. } | BackendError::UnsupportedOperation { .. } => {
            ErrorCode::InvalidParams
        }
        _ if err.is_internal() => {
            error!("Backend storage failure: {}", err);
            ErrorCode::InternalError
        }
        _ => {
            warn!("Backend call failed: {}", err);
            ErrorCode::InternalError
        }
    };
    ErrorObject::owned(code.code(), err.to_string(), None::<()>)
}
