//! Shared helpers for daemon integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use artiforge_core::{ArtifactoryClient, Backend, ClientError, ConnectionParams, FileStorage};
use artiforge_daemon::api::{start_server, ApiState, ServerHandle};
use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::{sleep, Duration};

/// Accepts `test-access-token` and rejects everything else, like a server
/// answering 401.
pub struct MockArtifactory;

#[async_trait]
impl ArtifactoryClient for MockArtifactory {
    async fn get_version(&self, conn: &ConnectionParams) -> Result<String, ClientError> {
        if conn.access_token.expose() == "test-access-token" {
            Ok("7.77.5".to_string())
        } else {
            Err(ClientError::Version {
                message: "HTTP status client error (401 Unauthorized)".to_string(),
            })
        }
    }

    async fn get_root_certificate(&self, _conn: &ConnectionParams) -> Result<String, ClientError> {
        Ok("-----BEGIN CERTIFICATE-----".to_string())
    }
}

/// Detect whether the sandbox allows binding Unix sockets. Skip tests if not.
pub fn can_bind_unix_socket() -> bool {
    let path = std::env::temp_dir().join("artiforge-socket-permission-check.sock");
    let _ = std::fs::remove_file(&path);
    let result = std::os::unix::net::UnixListener::bind(&path);
    let ok = result.is_ok();
    let _ = std::fs::remove_file(&path);
    ok
}

/// API state over file storage in `dir`.
pub fn test_state(dir: &Path) -> ApiState {
    let storage = FileStorage::new(dir.join("storage")).unwrap();
    ApiState::with_parts(Backend::new(Arc::new(MockArtifactory)), Arc::new(storage))
}

/// Start a server in a fresh temp directory.
/// Returns the temp directory (which must be kept alive), socket path, and server handle.
pub async fn setup_test_server() -> (TempDir, PathBuf, ServerHandle) {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");

    let handle = start_server(&socket_path, test_state(temp_dir.path()))
        .await
        .unwrap();

    // Give the server time to start accepting connections
    sleep(Duration::from_millis(100)).await;

    (temp_dir, socket_path, handle)
}

/// Send one raw line over a fresh connection and return the parsed reply.
pub async fn send_raw_request(
    socket_path: &Path,
    request: &str,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut stream = UnixStream::connect(socket_path).await?;
    stream.write_all(request.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.flush().await?;

    let (reader, _writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut response_str = String::new();
    reader.read_line(&mut response_str).await?;

    Ok(serde_json::from_str(&response_str)?)
}

/// Call `method` and return the full JSON-RPC reply.
pub async fn call(socket_path: &Path, method: &str, params: Value) -> Value {
    let request = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1,
    });
    send_raw_request(socket_path, &request.to_string())
        .await
        .expect("RPC round trip")
}
