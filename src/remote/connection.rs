//! The task that owns the tool server socket.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot, watch},
    time::{self, MissedTickBehavior},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, trace, warn};

use serde_json::Value;

use super::envelope::{correlation_id, ResponseEnvelope};
use crate::error::{HandoffError, Result};

pub(crate) type ToolSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

type Waiter = oneshot::Sender<Result<ResponseEnvelope>>;

/// A frame queued for the connection task, acked once written.
pub(crate) struct Outbound {
    pub payload: String,
    pub ack: oneshot::Sender<Result<()>>,
}

#[derive(Default)]
struct PendingTable {
    closed: bool,
    waiters: HashMap<u64, Waiter>,
}

/// State shared between callers and the connection task.
///
/// Registration and teardown go through one lock, so a waiter is either
/// registered before the table closes (and failed by it) or rejected.
#[derive(Default)]
pub(crate) struct ConnectionShared {
    table: Mutex<PendingTable>,
}

impl ConnectionShared {
    fn table(&self) -> MutexGuard<'_, PendingTable> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_connected(&self) -> bool {
        !self.table().closed
    }

    pub fn pending_len(&self) -> usize {
        self.table().waiters.len()
    }

    pub fn register(&self, id: u64) -> Result<oneshot::Receiver<Result<ResponseEnvelope>>> {
        let mut table = self.table();
        if table.closed {
            return Err(HandoffError::RequestFailed("connection is closed".into()));
        }
        let (tx, rx) = oneshot::channel();
        table.waiters.insert(id, tx);
        Ok(rx)
    }

    pub fn remove(&self, id: u64) {
        self.table().waiters.remove(&id);
    }

    /// Hand `outcome` to the request waiting on `id`, if any.
    fn settle(&self, id: u64, outcome: Result<ResponseEnvelope>) -> bool {
        let waiter = self.table().waiters.remove(&id);
        match waiter {
            Some(tx) => {
                // The caller may have timed out in the meantime.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Mark the connection closed and fail every outstanding request.
    pub fn close(&self, reason: &str) {
        let waiters = {
            let mut table = self.table();
            table.closed = true;
            std::mem::take(&mut table.waiters)
        };
        if !waiters.is_empty() {
            debug!(count = waiters.len(), reason, "failing pending requests");
        }
        for (_, tx) in waiters {
            let _ = tx.send(Err(HandoffError::RequestFailed(reason.to_string())));
        }
    }
}

/// Open a socket to `url`, authenticating with a bearer token when given.
pub(crate) async fn connect_socket(url: &str, api_key: Option<&str>) -> Result<ToolSocket> {
    let mut request = url.into_client_request().map_err(|error| {
        HandoffError::ConnectionFailed(format!("Invalid tool server URL '{url}': {error}"))
    })?;
    if let Some(key) = api_key {
        let auth_value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|error| {
            HandoffError::Configuration(format!("Invalid tool server auth header: {error}"))
        })?;
        request.headers_mut().insert("Authorization", auth_value);
    }

    connect_async(request)
        .await
        .map(|(socket, _)| socket)
        .map_err(map_connect_error)
}

fn map_connect_error(error: WsError) -> HandoffError {
    match error {
        WsError::Http(response) => HandoffError::ConnectionFailed(format!(
            "Tool server handshake failed with status {}",
            response.status().as_u16()
        )),
        other => HandoffError::ConnectionFailed(other.to_string()),
    }
}

/// Drive one connection until shutdown, socket failure, or all senders drop.
///
/// Keepalive pings, outbound writes and inbound routing share this one
/// `select!`, so nothing else ever reads from the socket.
pub(crate) async fn run_connection<S>(
    mut socket: S,
    shared: std::sync::Arc<ConnectionShared>,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    mut shutdown_rx: watch::Receiver<bool>,
    keepalive_interval: Duration,
) where
    S: Sink<Message, Error = WsError> + Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    let mut heartbeat = time::interval(keepalive_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;

    let reason = loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    let _ = socket.send(Message::Close(None)).await;
                    break "connection closed";
                }
            }
            outbound = outbound_rx.recv() => {
                let Some(Outbound { payload, ack }) = outbound else {
                    let _ = socket.send(Message::Close(None)).await;
                    break "client dropped";
                };
                match socket.send(Message::Text(payload.into())).await {
                    Ok(()) => {
                        let _ = ack.send(Ok(()));
                    }
                    Err(error) => {
                        warn!(error = %error, "tool server send failed");
                        let _ = ack.send(Err(HandoffError::RequestFailed(format!(
                            "Send failed: {error}"
                        ))));
                        break "send failed";
                    }
                }
            }
            _ = heartbeat.tick() => {
                if let Err(error) = socket.send(Message::Ping(Default::default())).await {
                    warn!(error = %error, "tool server keepalive failed");
                    break "keepalive failed";
                }
                trace!("keepalive ping sent");
            }
            frame = socket.next() => {
                match frame {
                    Some(Ok(message)) => {
                        if let Err(error) = handle_server_message(&mut socket, &shared, message).await {
                            debug!(error = %error, "tool server connection ended");
                            break "connection lost";
                        }
                    }
                    Some(Err(error)) => {
                        warn!(error = %error, "tool server receive failed");
                        break "connection lost";
                    }
                    None => break "connection lost",
                }
            }
        }
    };

    shared.close(reason);
}

async fn handle_server_message<S>(
    socket: &mut S,
    shared: &ConnectionShared,
    message: Message,
) -> std::result::Result<(), WsError>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    match message {
        Message::Text(text) => route_response(shared, text.as_ref()),
        Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => route_response(shared, &text),
            Err(_) => warn!("ignoring non-UTF-8 binary frame"),
        },
        Message::Ping(payload) => socket.send(Message::Pong(payload)).await?,
        Message::Pong(_) => trace!("keepalive pong received"),
        Message::Close(_) => return Err(WsError::ConnectionClosed),
        Message::Frame(_) => {}
    }
    Ok(())
}

/// Route one text frame to its waiter.
///
/// A frame whose id matches a waiter always settles it, with
/// `RequestFailed` when the rest of the frame is unreadable.
fn route_response(shared: &ConnectionShared, payload: &str) {
    let frame = match serde_json::from_str::<Value>(payload) {
        Ok(frame) => frame,
        Err(error) => {
            warn!(error = %error, "ignoring non-JSON tool server frame");
            return;
        }
    };
    let Some(id) = frame.get("id").and_then(correlation_id) else {
        warn!(payload, "ignoring tool server frame without an id");
        return;
    };
    let outcome = serde_json::from_value::<ResponseEnvelope>(frame).map_err(|error| {
        warn!(id, error = %error, "malformed tool server response");
        HandoffError::RequestFailed(format!("malformed response: {error}"))
    });
    if !shared.settle(id, outcome) {
        warn!(id, "no pending request for response");
    }
}

/// A socket whose writes fail and which never yields a frame.
#[cfg(test)]
pub(crate) struct BrokenSocket;

#[cfg(test)]
impl Stream for BrokenSocket {
    type Item = std::result::Result<Message, WsError>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        std::task::Poll::Pending
    }
}

#[cfg(test)]
impl Sink<Message> for BrokenSocket {
    type Error = WsError;

    fn poll_ready(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), WsError>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn start_send(self: std::pin::Pin<&mut Self>, _item: Message) -> std::result::Result<(), WsError> {
        Err(WsError::Io(std::io::ErrorKind::BrokenPipe.into()))
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), WsError>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn poll_close(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), WsError>> {
        std::task::Poll::Ready(Ok(()))
    }
}
