//! Connection lifecycle management
//!
//! One [`ConnectionManager`] owns one background task that holds at
//! most one live WebSocket transport to the context's endpoint. The
//! task dials, sends the empty handshake frame before anything else,
//! pumps caller frames out and service frames in, and on transport
//! loss waits a fixed delay before dialing again. An explicit
//! [`close`](ConnectionManager::close) is terminal: it cancels any
//! pending reconnect and the task exits.

use std::fmt;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use evalsync_core::protocol::{Request, Response};

/// Default delay before a reconnect attempt
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

type Transport = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection status as seen by subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

enum Command {
    Send(String),
    Close,
}

/// Handle to the connection task.
///
/// Exactly one transport is ever open per manager instance. Opening a
/// new context requires closing this manager and constructing a new
/// one; managers are never shared across sessions.
pub struct ConnectionManager {
    cmd_tx: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<ConnectionStatus>,
    task: JoinHandle<()>,
}

impl ConnectionManager {
    /// Establishes a transport to `endpoint`. Parsed inbound frames
    /// are delivered on `responses`; the connection task keeps
    /// reconnecting after `reconnect_delay` until [`close`] is called.
    ///
    /// [`close`]: Self::close
    pub fn open(
        endpoint: Url,
        responses: mpsc::UnboundedSender<Response>,
        reconnect_delay: Duration,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);

        let task = tokio::spawn(run(endpoint, responses, cmd_rx, status_tx, reconnect_delay));

        Self {
            cmd_tx,
            status_rx,
            task,
        }
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// A watch receiver that observes every status transition.
    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Transmits `request` if and only if the transport is connected.
    /// Otherwise the frame is dropped with a warning; no error is
    /// raised to the caller.
    pub fn send(&self, request: &Request) {
        if self.status() != ConnectionStatus::Connected {
            warn!(id = request.id, "cannot send request: transport is not connected");
            return;
        }
        match serde_json::to_string(request) {
            Ok(text) => {
                let _ = self.cmd_tx.send(Command::Send(text));
            }
            Err(err) => warn!(%err, id = request.id, "failed to encode request"),
        }
    }

    /// Terminal teardown: closes the transport, cancels any pending
    /// reconnect, and waits for the connection task to exit.
    pub async fn close(self) {
        let _ = self.cmd_tx.send(Command::Close);
        let _ = self.task.await;
    }
}

async fn run(
    endpoint: Url,
    responses: mpsc::UnboundedSender<Response>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    status_tx: watch::Sender<ConnectionStatus>,
    reconnect_delay: Duration,
) {
    loop {
        let _ = status_tx.send(ConnectionStatus::Connecting);

        match connect_async(endpoint.as_str()).await {
            Ok((mut transport, _)) => {
                debug!(endpoint = %endpoint, "transport open");
                let _ = status_tx.send(ConnectionStatus::Connected);

                // The handshake goes out before any caller frame;
                // commands are only drained once it is on the wire.
                let handshake = "{}";
                match transport.send(Message::text(handshake)).await {
                    Ok(()) => {
                        if drive(&mut transport, &responses, &mut commands).await
                            == Driven::Closed
                        {
                            let _ = transport.close(None).await;
                            let _ = status_tx.send(ConnectionStatus::Disconnected);
                            return;
                        }
                    }
                    Err(err) => warn!(%err, "handshake failed"),
                }
            }
            Err(err) => warn!(%err, endpoint = %endpoint, "failed to open transport"),
        }

        let _ = status_tx.send(ConnectionStatus::Disconnected);

        // One pending reconnect timer at most; a Close during the wait
        // cancels it and ends the task.
        let delay = tokio::time::sleep(reconnect_delay);
        tokio::pin!(delay);
        loop {
            tokio::select! {
                _ = &mut delay => break,
                cmd = commands.recv() => match cmd {
                    Some(Command::Send(_)) => {
                        warn!("dropping frame: transport is not connected");
                    }
                    Some(Command::Close) | None => return,
                },
            }
        }
    }
}

#[derive(PartialEq)]
enum Driven {
    /// Transport lost; reconnect.
    Lost,
    /// Caller closed the manager; terminal.
    Closed,
}

async fn drive(
    transport: &mut Transport,
    responses: &mpsc::UnboundedSender<Response>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Driven {
    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(Command::Send(text)) => {
                    if let Err(err) = transport.send(Message::text(text)).await {
                        warn!(%err, "send failed");
                        return Driven::Lost;
                    }
                }
                Some(Command::Close) | None => return Driven::Closed,
            },
            frame = transport.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<Response>(text.as_str()) {
                        Ok(response) => {
                            debug!(id = response.id, "received evaluation");
                            if responses.send(response).is_err() {
                                // Receiver gone; the session is being torn down.
                                return Driven::Closed;
                            }
                        }
                        // A malformed frame is not a connection fault:
                        // drop it and keep reading.
                        Err(err) => warn!(%err, "dropping malformed frame"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("transport closed by peer");
                    return Driven::Lost;
                }
                Some(Ok(_)) => {} // ping/pong/binary: nothing to do
                Some(Err(err)) => {
                    warn!(%err, "transport error");
                    return Driven::Lost;
                }
            },
        }
    }
}
