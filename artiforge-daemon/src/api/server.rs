//! JSON-RPC server implementation with Unix socket support.

use super::handlers::{ApiState, ArtiforgeApiImpl, ArtiforgeApiServer};
use anyhow::{Context, Result};
use jsonrpsee::core::RpcResult;
use jsonrpsee::types::{ErrorCode, ErrorObject};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to a running RPC server
pub struct ServerHandle {
    socket_path: PathBuf,
    shutdown: Arc<Mutex<Option<tokio::sync::mpsc::Sender<()>>>>,
    join_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

/// Start the JSON-RPC server on a Unix socket.
///
/// # Parameters
///
/// - `socket_path`: Path to the Unix socket file
/// - `state`: API state shared across handlers
///
/// # Returns
///
/// A handle to the running server that can be used to stop it.
pub async fn start_server(socket_path: &Path, state: ApiState) -> Result<ServerHandle> {
    // Remove existing socket if present
    if socket_path.exists() {
        warn!("Removing existing socket at {:?}", socket_path);
        std::fs::remove_file(socket_path)
            .with_context(|| format!("Failed to remove existing socket at {:?}", socket_path))?;
    }

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create socket directory {:?}", parent))?;
    }

    info!("Starting JSON-RPC server on {:?}", socket_path);

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind Unix socket at {:?}", socket_path))?;

    let api = Arc::new(ArtiforgeApiImpl::new(state));

    let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(1);

    let server_task: JoinHandle<()> = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = rx.recv() => {
                    debug!("Server shutdown signal received");
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let api = api.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, api).await {
                                    warn!("Connection handler error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }
    });

    info!("JSON-RPC server started and listening");

    Ok(ServerHandle {
        socket_path: socket_path.to_path_buf(),
        shutdown: Arc::new(Mutex::new(Some(tx))),
        join_handle: Arc::new(Mutex::new(Some(server_task))),
    })
}

/// Handle a single connection
async fn handle_connection(mut stream: UnixStream, api: Arc<ArtiforgeApiImpl>) -> Result<()> {
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;

        if n == 0 {
            break;
        }

        // Lines are not logged: a write request carries the access token.
        debug!("Received request ({} bytes)", n);

        let response = match serde_json::from_str::<Value>(&line) {
            Ok(request) => process_request(request, &api).await,
            Err(e) => json!({
                "jsonrpc": "2.0",
                "error": {
                    "code": ErrorCode::ParseError.code(),
                    "message": format!("Parse error: {}", e)
                },
                "id": null
            }),
        };

        writer.write_all(response.to_string().as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Process a JSON-RPC request
async fn process_request(request: Value, api: &ArtiforgeApiImpl) -> Value {
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let Some(method) = request.get("method").and_then(Value::as_str) else {
        return json!({
            "jsonrpc": "2.0",
            "error": {
                "code": ErrorCode::InvalidRequest.code(),
                "message": "Invalid Request: missing method"
            },
            "id": id
        });
    };

    let params = request
        .get("params")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let result = match method {
        "read" => match path_param(&params) {
            Some(path) => encode(api.read(path).await),
            None => Err(invalid_params()),
        },
        "write" => match (path_param(&params), data_param(&params)) {
            (Some(path), Some(data)) => encode(api.write(path, data).await),
            _ => Err(invalid_params()),
        },
        "delete" => match path_param(&params) {
            Some(path) => encode(api.delete(path).await),
            None => Err(invalid_params()),
        },
        _ => Err(ErrorObject::owned(
            ErrorCode::MethodNotFound.code(),
            "Method not found",
            None::<()>,
        )),
    };

    match result {
        Ok(value) => json!({
            "jsonrpc": "2.0",
            "result": value,
            "id": id
        }),
        Err(error) => json!({
            "jsonrpc": "2.0",
            "error": {
                "code": error.code(),
                "message": error.message()
            },
            "id": id
        }),
    }
}

fn path_param(params: &[Value]) -> Option<String> {
    params.first().and_then(Value::as_str).map(str::to_string)
}

/// The payload of a `write`; a missing or null second param is an empty write.
fn data_param(params: &[Value]) -> Option<Map<String, Value>> {
    match params.get(1) {
        None | Some(Value::Null) => Some(Map::new()),
        Some(Value::Object(map)) => Some(map.clone()),
        Some(_) => None,
    }
}

fn encode<T: serde::Serialize>(result: RpcResult<T>) -> RpcResult<Value> {
    let value = result?;
    serde_json::to_value(value).map_err(|e| {
        ErrorObject::owned(ErrorCode::InternalError.code(), e.to_string(), None::<()>)
    })
}

fn invalid_params() -> ErrorObject<'static> {
    ErrorObject::owned(ErrorCode::InvalidParams.code(), "Invalid params", None::<()>)
}

impl ServerHandle {
    /// Stop the server and remove its socket file. Safe to call repeatedly.
    pub async fn stop(&self) -> Result<()> {
        if let Some(tx) = self.shutdown.lock().await.take() {
            let _ = tx.send(()).await;
        }

        if let Some(handle) = self.join_handle.lock().await.take() {
            // If the task panicked, surface the error
            handle.await?;
        }

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).with_context(|| {
                format!("Failed to remove socket file {:?}", self.socket_path)
            })?;
            info!("Socket file removed");
        }

        Ok(())
    }

    /// Path of the socket this server listens on.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}
