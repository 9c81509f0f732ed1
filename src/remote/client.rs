//! Client for a remote tool server over a persistent WebSocket.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use super::connection::{connect_socket, run_connection, ConnectionShared, Outbound};
use super::envelope::{RequestEnvelope, ResponseEnvelope};
use super::schema::{parse_tool_list, RemoteToolSchema};
use crate::config::DEFAULT_KEEPALIVE_SECS;
use crate::error::{HandoffError, Result};
use crate::tools::{DynamicTool, DynamicToolProvider, ToolArguments};

/// Connection settings for [`RemoteToolClient`].
#[derive(Clone, Builder)]
pub struct RemoteToolOptions {
    /// `ws://` or `wss://` endpoint.
    #[builder(into)]
    pub url: String,
    /// Sent as `Authorization: Bearer <key>` on the handshake.
    #[builder(into)]
    pub api_key: Option<String>,
    #[builder(default = Duration::from_secs(DEFAULT_KEEPALIVE_SECS))]
    pub keepalive_interval: Duration,
    /// Default deadline for [`RemoteToolClient::send_request`]. None waits forever.
    pub request_timeout: Option<Duration>,
}

impl fmt::Debug for RemoteToolOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteToolOptions")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("keepalive_interval", &self.keepalive_interval)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

struct ActiveConnection {
    shared: Arc<ConnectionShared>,
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ActiveConnection {
    async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(error) = self.task.await {
            warn!(error = %error, "tool server connection task failed");
        }
    }
}

/// A persistent connection to a remote tool server.
///
/// Requests may be issued concurrently from many tasks; each one is matched
/// to its response by id. When the connection is down the next request
/// reconnects once before sending.
pub struct RemoteToolClient {
    options: RemoteToolOptions,
    active: Mutex<Option<ActiveConnection>>,
    connect_lock: tokio::sync::Mutex<()>,
    next_id: AtomicU64,
}

impl RemoteToolClient {
    pub fn new(options: RemoteToolOptions) -> Self {
        Self {
            options,
            active: Mutex::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Client with default options for `url` and no API key.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self::new(RemoteToolOptions::builder().url(url).build())
    }

    pub fn options(&self) -> &RemoteToolOptions {
        &self.options
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveConnection>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> ConnectionState {
        match self.active().as_ref() {
            Some(conn) if conn.shared.is_connected() => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }

    /// Requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.active()
            .as_ref()
            .map_or(0, |conn| conn.shared.pending_len())
    }

    /// Open the connection, replacing any existing one.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.connect_lock.lock().await;
        self.open().await
    }

    /// Callers must hold `connect_lock`.
    async fn open(&self) -> Result<()> {
        let previous = self.active().take();
        if let Some(previous) = previous {
            previous.shutdown().await;
        }

        let socket = connect_socket(&self.options.url, self.options.api_key.as_deref()).await?;

        let shared = Arc::new(ConnectionShared::default());
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_connection(
            socket,
            shared.clone(),
            outbound_rx,
            shutdown_rx,
            self.options.keepalive_interval,
        ));

        *self.active() = Some(ActiveConnection {
            shared,
            outbound_tx,
            shutdown_tx,
            task,
        });
        info!(url = %self.options.url, "connected to tool server");
        Ok(())
    }

    async fn ensure_connected(&self) -> Result<()> {
        if self.state() == ConnectionState::Connected {
            return Ok(());
        }
        let _guard = self.connect_lock.lock().await;
        // Another caller may have reconnected while we waited.
        if self.state() == ConnectionState::Connected {
            return Ok(());
        }
        info!(url = %self.options.url, "reconnecting to tool server");
        self.open().await
    }

    fn handle(&self) -> Result<(Arc<ConnectionShared>, mpsc::UnboundedSender<Outbound>)> {
        self.active()
            .as_ref()
            .map(|conn| (conn.shared.clone(), conn.outbound_tx.clone()))
            .ok_or_else(|| HandoffError::RequestFailed("not connected".into()))
    }

    /// Send a request and wait for its `result` (`Null` when absent).
    ///
    /// Uses the configured default timeout, if any. A remote error object is
    /// returned as [`HandoffError::Remote`].
    pub async fn send_request(&self, method: &str, params: Value) -> Result<Value> {
        self.dispatch(method, params, self.options.request_timeout).await
    }

    /// Like [`send_request`](Self::send_request) with an explicit deadline
    /// covering reconnect, send and response.
    pub async fn send_request_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        self.dispatch(method, params, Some(timeout)).await
    }

    async fn dispatch(&self, method: &str, params: Value, timeout: Option<Duration>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let round_trip = self.round_trip(id, method, params);

        let response = match timeout {
            Some(limit) => match time::timeout(limit, round_trip).await {
                Ok(response) => response,
                Err(_) => {
                    if let Ok((shared, _)) = self.handle() {
                        shared.remove(id);
                    }
                    warn!(id, method, timeout_ms = limit.as_millis() as u64, "tool server request timed out");
                    return Err(HandoffError::Timeout(limit.as_millis() as u64));
                }
            },
            None => round_trip.await,
        }?;

        Ok(response.into_result()?.unwrap_or(Value::Null))
    }

    async fn round_trip(&self, id: u64, method: &str, params: Value) -> Result<ResponseEnvelope> {
        self.ensure_connected().await?;
        let (shared, outbound_tx) = self.handle()?;

        let payload = serde_json::to_string(&RequestEnvelope::new(id, method, params))?;
        let response_rx = shared.register(id)?;
        debug!(id, method, "sending tool server request");

        let (ack_tx, ack_rx) = oneshot::channel();
        let sent = match outbound_tx.send(Outbound {
            payload,
            ack: ack_tx,
        }) {
            Ok(()) => ack_rx.await.unwrap_or_else(|_| {
                Err(HandoffError::RequestFailed("connection closed before send".into()))
            }),
            Err(_) => Err(HandoffError::RequestFailed("connection closed before send".into())),
        };
        if let Err(error) = sent {
            shared.remove(id);
            shared.close("send failed");
            return Err(error);
        }

        response_rx.await.unwrap_or_else(|_| {
            Err(HandoffError::RequestFailed("connection closed before response".into()))
        })
    }

    /// Ask the server for its tool declarations.
    pub async fn get_available_tools(&self) -> Result<Vec<RemoteToolSchema>> {
        let result = self.send_request("get_tools", json!({})).await?;
        parse_tool_list(result)
    }

    /// Run a tool remotely and return its result, `{}` when the server sends none.
    pub async fn execute_tool(&self, tool_name: &str, params: Value) -> Result<Value> {
        let result = self
            .send_request(
                "execute_tool",
                json!({ "tool": tool_name, "parameters": params }),
            )
            .await?;
        Ok(match result {
            Value::Null => json!({}),
            other => other,
        })
    }

    /// Close the connection and fail outstanding requests. Safe when never connected.
    pub async fn close(&self) -> Result<()> {
        let _guard = self.connect_lock.lock().await;
        let active = self.active().take();
        if let Some(active) = active {
            active.shutdown().await;
            info!(url = %self.options.url, "closed tool server connection");
        }
        Ok(())
    }
}

impl fmt::Debug for RemoteToolClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteToolClient")
            .field("options", &self.options)
            .field("state", &self.state())
            .finish()
    }
}

#[async_trait]
impl DynamicToolProvider for RemoteToolClient {
    async fn connect(&self) -> Result<()> {
        RemoteToolClient::connect(self).await
    }

    async fn list_tools(&self) -> Result<Vec<DynamicTool>> {
        Ok(self
            .get_available_tools()
            .await?
            .into_iter()
            .map(RemoteToolSchema::into_dynamic_tool)
            .collect())
    }

    async fn execute_tool(&self, name: &str, args: &ToolArguments) -> Result<Value> {
        RemoteToolClient::execute_tool(self, name, args.raw().clone()).await
    }

    async fn close(&self) -> Result<()> {
        RemoteToolClient::close(self).await
    }
}

impl Drop for RemoteToolClient {
    fn drop(&mut self) {
        let active = self
            .active
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(active) = active {
            active.shared.close("client dropped");
            let _ = active.shutdown_tx.send(true);
            active.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::connection::BrokenSocket;
    use futures::{SinkExt, StreamExt};
    use std::sync::atomic::AtomicUsize;
    use tokio_tungstenite::tungstenite::Message;

    /// Server answering every request with `{"ok": true}`; counts handshakes.
    async fn answering_server() -> (String, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let accepts = Arc::new(AtomicUsize::new(0));
        let counter = accepts.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let counter = counter.clone();
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    counter.fetch_add(1, Ordering::SeqCst);
                    while let Some(Ok(Message::Text(text))) = ws.next().await {
                        let request: Value = serde_json::from_str(&text).unwrap();
                        let reply = json!({ "id": request["id"], "result": { "ok": true } });
                        if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        (url, accepts)
    }

    #[test]
    fn options_default_keepalive_and_redact_key() {
        let options = RemoteToolOptions::builder()
            .url("ws://localhost:1")
            .api_key("secret")
            .build();
        assert_eq!(options.keepalive_interval, Duration::from_secs(30));
        assert_eq!(options.request_timeout, None);
        assert!(!format!("{options:?}").contains("secret"));
    }

    #[tokio::test]
    async fn close_without_connect_is_ok() {
        let client = RemoteToolClient::from_url("ws://127.0.0.1:1");
        assert_eq!(client.state(), ConnectionState::Disconnected);
        client.close().await.unwrap();
        client.close().await.unwrap();
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn unreachable_server_is_connection_failed() {
        let client = RemoteToolClient::from_url("ws://127.0.0.1:1");
        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, HandoffError::ConnectionFailed(_)));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn invalid_url_is_connection_failed() {
        let client = RemoteToolClient::from_url("not a url");
        let err = client.send_request("get_tools", json!({})).await.unwrap_err();
        assert!(matches!(err, HandoffError::ConnectionFailed(_)));
    }

    #[tokio::test]
    async fn send_failure_disconnects_and_next_request_reconnects_once() {
        let (url, accepts) = answering_server().await;
        let client = RemoteToolClient::from_url(url);
        client.connect().await.unwrap();

        // Swap the live socket for one whose writes fail.
        let shared = Arc::new(ConnectionShared::default());
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_connection(
            BrokenSocket,
            shared.clone(),
            outbound_rx,
            shutdown_rx,
            Duration::from_secs(60),
        ));
        let live = client.active().replace(ActiveConnection {
            shared,
            outbound_tx,
            shutdown_tx,
            task,
        });
        if let Some(live) = live {
            live.shutdown().await;
        }

        let err = client.send_request("get_tools", json!({})).await.unwrap_err();
        assert!(matches!(err, HandoffError::RequestFailed(msg) if msg.starts_with("Send failed")));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.pending_requests(), 0);

        let result = client.send_request("get_tools", json!({})).await.unwrap();
        assert_eq!(result, json!({ "ok": true }));
        assert_eq!(accepts.load(Ordering::SeqCst), 2);
    }
}
