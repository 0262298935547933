//! JSON-RPC API for daemon IPC.
//!
//! This module provides a JSON-RPC interface that forwards `read`, `write`,
//! and `delete` requests to the backend.

pub mod handlers;
pub mod server;
pub mod types;

pub use handlers::{ApiState, ArtiforgeApiImpl, ArtiforgeApiServer};
pub use server::{start_server, ServerHandle};
pub use types::RpcResponse;
