//! Per-context sessions: input debouncing, correlation, event stream
//!
//! A [`Session`] owns everything with per-session lifetime: the
//! connection manager, the [`Correlator`], the live input snapshot,
//! the last-sent snapshot, and the single pending debounce deadline.
//! All of it lives inside one event-loop task, so disposing the
//! session tears the whole pipeline down at once - there is no timer
//! handle that can outlive the loop and fire into a superseded
//! session.
//!
//! Switching context is a full disposal of the old session followed by
//! construction of a new one; nothing (counters, snapshots, timers) is
//! reused across that boundary.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use evalsync_core::protocol::{Request, Response};
use evalsync_core::Correlator;

use crate::connection::{ConnectionManager, ConnectionStatus, DEFAULT_RECONNECT_DELAY};
use crate::context::Context;
use crate::error::Result;

/// Default quiet window for input debouncing
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(250);

/// Tunables for a session. The defaults match the service's intended
/// interactive feel; tests shrink them.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long the inputs must stay quiet before a mutation is sent
    pub quiet_window: Duration,
    /// Fixed delay between losing the transport and redialing
    pub reconnect_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            quiet_window: DEFAULT_QUIET_WINDOW,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// What a session publishes to its subscriber.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Connection status transition
    Status(ConnectionStatus),
    /// A correlator-accepted evaluation; stale responses never appear
    /// here
    Evaluation(Response),
}

enum SessionCommand {
    SetInput(String, String),
    SetInputs(BTreeMap<String, String>),
    Dispose,
}

/// Handle to one live synchronization session.
///
/// Input mutations are fire-and-forget; the session coalesces a burst
/// of edits into a single request once the inputs stay quiet for the
/// configured window, assigns it the next monotonic id, and sends it
/// if the transport is connected.
pub struct Session {
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    task: JoinHandle<()>,
}

impl Session {
    /// Opens a session for `context` against `host` and returns the
    /// handle plus the event stream. The id counter starts at 0.
    pub fn open(
        context: &Context,
        host: &str,
        config: SessionConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>)> {
        let endpoint = context.socket_url(host)?;

        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let connection = ConnectionManager::open(endpoint, response_tx, config.reconnect_delay);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run(
            connection,
            response_rx,
            cmd_rx,
            event_tx,
            config.quiet_window,
        ));

        Ok((Self { cmd_tx, task }, event_rx))
    }

    /// Sets one input value. Triggers a debounced mutation if the
    /// snapshot now differs from the last one sent.
    pub fn set_input(&self, name: impl Into<String>, value: impl Into<String>) {
        let _ = self
            .cmd_tx
            .send(SessionCommand::SetInput(name.into(), value.into()));
    }

    /// Replaces the whole input snapshot.
    pub fn set_inputs(&self, inputs: BTreeMap<String, String>) {
        let _ = self.cmd_tx.send(SessionCommand::SetInputs(inputs));
    }

    /// Disposes the session: cancels any pending debounce deadline,
    /// closes the transport (cancelling a pending reconnect), and
    /// waits for the event loop to exit.
    pub async fn dispose(self) {
        let _ = self.cmd_tx.send(SessionCommand::Dispose);
        let _ = self.task.await;
    }
}

async fn run(
    connection: ConnectionManager,
    mut responses: mpsc::UnboundedReceiver<Response>,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    events: mpsc::UnboundedSender<SessionEvent>,
    quiet_window: Duration,
) {
    let mut correlator = Correlator::new();
    let mut inputs: BTreeMap<String, String> = BTreeMap::new();
    let mut last_sent: BTreeMap<String, String> = BTreeMap::new();

    let mut status_rx = connection.status_watch();
    let mut status_open = true;
    let _ = events.send(SessionEvent::Status(*status_rx.borrow_and_update()));

    // The single debounce deadline. Re-arming replaces it; loop exit
    // drops it, which is what cancels a pending send on disposal.
    let deadline = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(deadline);
    let mut armed = false;

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(SessionCommand::SetInput(name, value)) => {
                    inputs.insert(name, value);
                    if inputs != last_sent {
                        deadline.as_mut().reset(Instant::now() + quiet_window);
                        armed = true;
                    } else {
                        // The burst reverted to the last-sent snapshot;
                        // letting the deadline fire would resend it.
                        armed = false;
                    }
                }
                Some(SessionCommand::SetInputs(snapshot)) => {
                    inputs = snapshot;
                    if inputs != last_sent {
                        deadline.as_mut().reset(Instant::now() + quiet_window);
                        armed = true;
                    } else {
                        armed = false;
                    }
                }
                Some(SessionCommand::Dispose) | None => break,
            },

            response = responses.recv() => match response {
                Some(response) => {
                    if correlator.accept(&response) {
                        if events.send(SessionEvent::Evaluation(response)).is_err() {
                            // Subscriber gone; nothing left to sync for.
                            break;
                        }
                    } else {
                        debug!(
                            id = response.id,
                            last_applied = correlator.last_applied(),
                            "discarding stale response"
                        );
                    }
                }
                None => {
                    warn!("connection task ended unexpectedly");
                    break;
                }
            },

            changed = status_rx.changed(), if status_open => match changed {
                Ok(()) => {
                    let status = *status_rx.borrow_and_update();
                    let _ = events.send(SessionEvent::Status(status));
                }
                Err(_) => status_open = false,
            },

            _ = deadline.as_mut(), if armed => {
                armed = false;
                let id = correlator.next_id();
                let request = Request::new(id, inputs.clone());
                debug!(id, inputs = inputs.len(), "sending debounced mutation");
                connection.send(&request);
                // Optimistic update at send time, so the same delta is
                // not re-queued while the reply is in flight.
                last_sent = inputs.clone();
            }
        }
    }

    connection.close().await;
}
