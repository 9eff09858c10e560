//! Test utilities for the synchronization engine
//!
//! Provides [`ScriptedServer`], an in-process WebSocket server that
//! stands in for the evaluation service: it records every frame the
//! client sends, optionally echoes each mutation id back as an empty
//! evaluation, and lets a test inject arbitrary frames or kill the
//! live socket to exercise reconnection.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::{Json, Router};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use evalsync_core::protocol::{Request, Response};

use crate::error::Result;

/// A frame received from the client, as the service would see it.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    /// The empty `{}` frame sent first after every connect
    Handshake,
    /// An input mutation
    Mutation(Request),
}

enum Outbound {
    Frame(String),
    /// Drop the socket without a close frame, as a dying server would.
    Drop,
}

struct ServerState {
    frames: mpsc::UnboundedSender<ClientFrame>,
    /// Sender into the currently live socket, if any. A reconnect
    /// installs a fresh sender; stale ones are harmless because their
    /// receiver is gone.
    outbound: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
    auto_reply: bool,
}

/// An in-process scripted evaluation service for integration tests.
/// Shuts down when dropped.
pub struct ScriptedServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    frames: mpsc::UnboundedReceiver<ClientFrame>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ScriptedServer {
    /// Start a server that replies on its own: a baseline evaluation
    /// (id 0) for each handshake and an empty evaluation echoing the
    /// id for each mutation.
    pub async fn start() -> Result<Self> {
        Self::start_inner(true).await
    }

    /// Start a server that only records frames; the test injects
    /// every response itself.
    pub async fn start_silent() -> Result<Self> {
        Self::start_inner(false).await
    }

    async fn start_inner(auto_reply: bool) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let state = Arc::new(ServerState {
            frames: frame_tx,
            outbound: Mutex::new(None),
            auto_reply,
        });

        let router = Router::new()
            .route("/ws/{scenario}", any(ws_handler))
            .route("/directories", get(directories_handler))
            .route("/users/{scenario}", get(users_handler))
            .with_state(Arc::clone(&state));

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give the server a moment to start
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        Ok(Self {
            addr,
            state,
            frames: frame_rx,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Host string (`127.0.0.1:port`) to open sessions against.
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    /// The next frame the client sent, in arrival order.
    pub async fn next_frame(&mut self) -> Option<ClientFrame> {
        self.frames.recv().await
    }

    /// Non-blocking variant of [`next_frame`](Self::next_frame).
    pub fn try_next_frame(&mut self) -> Option<ClientFrame> {
        self.frames.try_recv().ok()
    }

    /// Inject an evaluation frame into the live socket.
    pub fn inject(&self, response: &Response) {
        if let Ok(text) = serde_json::to_string(response) {
            self.inject_raw(&text);
        }
    }

    /// Inject raw text (possibly malformed on purpose) into the live
    /// socket. Silently a no-op when no socket is connected.
    pub fn inject_raw(&self, text: &str) {
        if let Some(tx) = self.state.outbound.lock().as_ref() {
            let _ = tx.send(Outbound::Frame(text.to_string()));
        }
    }

    /// Kill the live socket without a close handshake, as an abruptly
    /// dying server would, so the client observes a transport loss.
    pub fn drop_connection(&self) {
        if let Some(tx) = self.state.outbound.lock().take() {
            let _ = tx.send(Outbound::Drop);
        }
    }

    /// Explicit shutdown; also happens on drop.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<ServerState>) {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    *state.outbound.lock() = Some(out_tx.clone());
    debug!("scripted server: socket connected");

    loop {
        tokio::select! {
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let Some(frame) = classify(text.as_str()) else {
                        continue;
                    };
                    if state.auto_reply {
                        let reply = match &frame {
                            ClientFrame::Handshake => Response::default(),
                            ClientFrame::Mutation(req) => Response {
                                id: req.id,
                                ..Default::default()
                            },
                        };
                        if let Ok(text) = serde_json::to_string(&reply) {
                            let _ = out_tx.send(Outbound::Frame(text));
                        }
                    }
                    let _ = state.frames.send(frame);
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
            out = out_rx.recv() => match out {
                Some(Outbound::Frame(text)) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Drop) | None => break,
            },
        }
    }
    debug!("scripted server: socket gone");
}

/// Canned catalog data mirroring the shape of the real service's
/// `GET /directories` and `GET /users/{scenario}` endpoints.
async fn directories_handler() -> Json<Vec<&'static str>> {
    Json(vec!["conditional", "static"])
}

async fn users_handler(Path(scenario): Path<String>) -> impl IntoResponse {
    if scenario != "conditional" && scenario != "static" {
        return (StatusCode::NOT_FOUND, "unknown scenario").into_response();
    }
    Json(serde_json::json!({
        "alice": {"groups": ["dev", "ops"]},
        "bob": {"groups": ["dev"]},
    }))
    .into_response()
}

fn classify(text: &str) -> Option<ClientFrame> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    match value.as_object() {
        Some(map) if map.is_empty() => Some(ClientFrame::Handshake),
        Some(_) => serde_json::from_value(value).ok().map(ClientFrame::Mutation),
        None => None,
    }
}
