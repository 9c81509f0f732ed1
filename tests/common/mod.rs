//! Shared test helpers: a scripted WebSocket tool server.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{Request, Response},
        Message,
    },
};

/// What the server does with one request.
pub enum Reply {
    /// Write these frames immediately, in order.
    Frames(Vec<Message>),
    /// Write these frames after a delay, without blocking other requests.
    Delayed(Duration, Vec<Message>),
    /// Drop the connection without answering.
    Disconnect,
}

impl Reply {
    pub fn result(request: &Value, result: Value) -> Self {
        Self::Frames(vec![result_frame(&request["id"], result)])
    }

    pub fn silent() -> Self {
        Self::Frames(Vec::new())
    }
}

pub fn result_frame(id: &Value, result: Value) -> Message {
    Message::Text(json!({ "id": id, "result": result }).to_string().into())
}

pub fn error_frame(id: &Value, code: i64, message: &str) -> Message {
    Message::Text(
        json!({ "id": id, "error": { "code": code, "message": message } })
            .to_string()
            .into(),
    )
}

type Handler = Arc<dyn Fn(&Value) -> Reply + Send + Sync>;

#[derive(Default)]
struct ServerState {
    accepts: AtomicUsize,
    pings: AtomicUsize,
    auth_headers: Mutex<Vec<Option<String>>>,
    requests: Mutex<Vec<Value>>,
}

/// Local tool server that answers each request through a handler.
pub struct ToolServer {
    pub url: String,
    state: Arc<ServerState>,
    task: JoinHandle<()>,
}

impl ToolServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&Value) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener
            .local_addr()
            .expect("local addr should be available");
        let state = Arc::new(ServerState::default());
        let handler: Handler = Arc::new(handler);

        let task = tokio::spawn({
            let state = Arc::clone(&state);
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(serve(stream, Arc::clone(&state), Arc::clone(&handler)));
                }
            }
        });

        Self {
            url: format!("ws://{address}"),
            state,
            task,
        }
    }

    /// Server that lists `weather` and echoes `execute_tool` parameters.
    pub async fn echo() -> Self {
        Self::start(|request| match request["method"].as_str() {
            Some("get_tools") => Reply::result(
                request,
                json!([{
                    "name": "weather",
                    "description": "Current weather for a city",
                    "parameters": {
                        "type": "object",
                        "properties": { "city": { "type": "string" } },
                        "required": ["city"]
                    }
                }]),
            ),
            Some("execute_tool") => Reply::result(
                request,
                json!({ "echo": request["params"]["parameters"].clone() }),
            ),
            _ => Reply::Frames(vec![error_frame(&request["id"], -32601, "Method not found")]),
        })
        .await
    }

    /// Completed WebSocket handshakes.
    pub fn accepts(&self) -> usize {
        self.state.accepts.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.state.pings.load(Ordering::SeqCst)
    }

    pub fn auth_headers(&self) -> Vec<Option<String>> {
        self.state
            .auth_headers
            .lock()
            .expect("auth lock should not poison")
            .clone()
    }

    pub fn requests(&self) -> Vec<Value> {
        self.state
            .requests
            .lock()
            .expect("requests lock should not poison")
            .clone()
    }
}

impl Drop for ToolServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(stream: TcpStream, state: Arc<ServerState>, handler: Handler) {
    let auth_state = Arc::clone(&state);
    let ws = accept_hdr_async(stream, move |req: &Request, response: Response| {
        let auth = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        auth_state
            .auth_headers
            .lock()
            .expect("auth lock should not poison")
            .push(auth);
        Ok(response)
    })
    .await;
    let Ok(ws) = ws else { return };
    state.accepts.fetch_add(1, Ordering::SeqCst);

    let (mut sink, mut frames) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = frames.next().await {
        match message {
            Message::Text(text) => {
                let request: Value =
                    serde_json::from_str(&text).expect("client should send JSON");
                state
                    .requests
                    .lock()
                    .expect("requests lock should not poison")
                    .push(request.clone());
                match handler(&request) {
                    Reply::Frames(replies) => {
                        for reply in replies {
                            let _ = tx.send(reply);
                        }
                    }
                    Reply::Delayed(delay, replies) => {
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            for reply in replies {
                                let _ = tx.send(reply);
                            }
                        });
                    }
                    Reply::Disconnect => break,
                }
            }
            Message::Ping(_) => {
                state.pings.fetch_add(1, Ordering::SeqCst);
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    writer.abort();
}
