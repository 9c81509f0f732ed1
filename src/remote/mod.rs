//! Remote tool endpoint: a JSON request/response protocol over WebSocket.
//!
//! Requests carry `{"protocol": "2.0", "method", "params", "id"}`; responses
//! echo the `id` with either `result` or `error: {code, message}`.

pub mod client;
mod connection;
pub mod envelope;
pub mod schema;

pub use client::{ConnectionState, RemoteToolClient, RemoteToolOptions};
pub use envelope::{RequestEnvelope, ResponseEnvelope, RpcError, PROTOCOL_VERSION};
pub use schema::RemoteToolSchema;
