//! API request/response types for the daemon JSON-RPC interface.

use artiforge_core::Response;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result of a `read`, `write`, or `delete` call.
///
/// A response-level error (for example `backend not configured`) is carried
/// in `data.error`; the call itself still succeeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Response payload, keyed by field name.
    #[serde(default)]
    pub data: Map<String, Value>,

    /// Non-fatal notices, such as a failed version check.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl RpcResponse {
    /// The response-level error message, if any.
    pub fn error(&self) -> Option<&str> {
        self.data.get("error").and_then(Value::as_str)
    }
}

impl From<Response> for RpcResponse {
    fn from(response: Response) -> Self {
        Self {
            data: response.data,
            warnings: response.warnings,
        }
    }
}
