//! Integration tests for the live session engine
//!
//! Every test drives the real engine (connection task, debouncer,
//! correlator) against an in-process scripted evaluation server.

use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio::time::timeout;

use evalsync_client::testing::{ClientFrame, ScriptedServer};
use evalsync_client::{ConnectionStatus, Context, Session, SessionConfig, SessionEvent};
use evalsync_core::{Diagnostic, Request, Response};

const WAIT: Duration = Duration::from_secs(2);

fn fast_config() -> SessionConfig {
    SessionConfig {
        quiet_window: Duration::from_millis(40),
        reconnect_delay: Duration::from_millis(50),
    }
}

async fn recv_frame(server: &mut ScriptedServer) -> ClientFrame {
    timeout(WAIT, server.next_frame())
        .await
        .expect("timed out waiting for a client frame")
        .expect("server frame channel closed")
}

async fn recv_event(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("session event channel closed")
}

async fn wait_connected(events: &mut mpsc::UnboundedReceiver<SessionEvent>) {
    loop {
        if let SessionEvent::Status(ConnectionStatus::Connected) = recv_event(events).await {
            return;
        }
    }
}

/// Wait until the session reports the transport as lost. Rapid status
/// transitions can coalesce, so either Disconnected or a renewed
/// Connecting counts.
async fn wait_degraded(events: &mut mpsc::UnboundedReceiver<SessionEvent>) {
    loop {
        if let SessionEvent::Status(
            ConnectionStatus::Disconnected | ConnectionStatus::Connecting,
        ) = recv_event(events).await
        {
            return;
        }
    }
}

async fn next_evaluation(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Response {
    loop {
        if let SessionEvent::Evaluation(response) = recv_event(events).await {
            return response;
        }
    }
}

fn marked(id: u64, marker: &str) -> Response {
    Response {
        id,
        diagnostics: vec![Diagnostic::warning(marker)],
        parameters: Vec::new(),
    }
}

fn mutation(frame: ClientFrame) -> Request {
    match frame {
        ClientFrame::Mutation(req) => req,
        other => panic!("expected a mutation, got {other:?}"),
    }
}

#[tokio::test]
async fn handshake_precedes_any_mutation() {
    let mut server = ScriptedServer::start_silent().await.unwrap();
    let (session, mut events) =
        Session::open(&Context::new("conditional"), &server.host(), fast_config()).unwrap();
    wait_connected(&mut events).await;

    session.set_input("region", "us");

    assert_eq!(recv_frame(&mut server).await, ClientFrame::Handshake);
    let req = mutation(recv_frame(&mut server).await);
    assert_eq!(req.id, 0);

    session.dispose().await;
}

#[tokio::test]
async fn debounce_coalesces_a_burst_into_one_request() {
    let mut server = ScriptedServer::start_silent().await.unwrap();
    let (session, mut events) =
        Session::open(&Context::new("conditional"), &server.host(), fast_config()).unwrap();
    wait_connected(&mut events).await;
    assert_eq!(recv_frame(&mut server).await, ClientFrame::Handshake);

    // Three edits inside one quiet window; only the last snapshot may
    // go out, carrying the first id of the session.
    session.set_input("region", "u");
    session.set_input("region", "us");
    session.set_input("region", "us-east");

    let req = mutation(recv_frame(&mut server).await);
    assert_eq!(req.id, 0);
    assert_eq!(req.inputs["region"], "us-east");

    // The window has elapsed and nothing else changed: no second send.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(server.try_next_frame(), None);

    session.dispose().await;
}

#[tokio::test]
async fn consecutive_requests_carry_strictly_increasing_ids() {
    let mut server = ScriptedServer::start_silent().await.unwrap();
    let (session, mut events) =
        Session::open(&Context::new("conditional"), &server.host(), fast_config()).unwrap();
    wait_connected(&mut events).await;
    assert_eq!(recv_frame(&mut server).await, ClientFrame::Handshake);

    session.set_input("region", "us");
    assert_eq!(mutation(recv_frame(&mut server).await).id, 0);

    session.set_input("region", "eu");
    assert_eq!(mutation(recv_frame(&mut server).await).id, 1);

    session.set_input("cpu", "4");
    assert_eq!(mutation(recv_frame(&mut server).await).id, 2);

    session.dispose().await;
}

#[tokio::test]
async fn unchanged_snapshot_does_not_resend() {
    let mut server = ScriptedServer::start_silent().await.unwrap();
    let (session, mut events) =
        Session::open(&Context::new("conditional"), &server.host(), fast_config()).unwrap();
    wait_connected(&mut events).await;
    assert_eq!(recv_frame(&mut server).await, ClientFrame::Handshake);

    session.set_input("region", "us");
    assert_eq!(mutation(recv_frame(&mut server).await).id, 0);

    // Same value again: snapshot equals the last-sent one, so the
    // debouncer must not re-arm.
    session.set_input("region", "us");
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(server.try_next_frame(), None);

    session.dispose().await;
}

#[tokio::test]
async fn burst_reverting_to_last_sent_sends_nothing() {
    let mut server = ScriptedServer::start_silent().await.unwrap();
    let (session, mut events) =
        Session::open(&Context::new("conditional"), &server.host(), fast_config()).unwrap();
    wait_connected(&mut events).await;
    assert_eq!(recv_frame(&mut server).await, ClientFrame::Handshake);

    session.set_input("region", "us");
    assert_eq!(mutation(recv_frame(&mut server).await).id, 0);

    // Edit away and back within one quiet window: the snapshot ends
    // equal to the last-sent one, so the armed deadline must be
    // disarmed instead of resending it and burning an id.
    session.set_input("region", "eu");
    session.set_input("region", "us");
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(server.try_next_frame(), None);

    // The counter must not have advanced past the revert.
    session.set_input("region", "ap");
    assert_eq!(mutation(recv_frame(&mut server).await).id, 1);

    session.dispose().await;
}

#[tokio::test]
async fn stale_responses_are_discarded() {
    let mut server = ScriptedServer::start_silent().await.unwrap();
    let (session, mut events) =
        Session::open(&Context::new("conditional"), &server.host(), fast_config()).unwrap();
    wait_connected(&mut events).await;
    assert_eq!(recv_frame(&mut server).await, ClientFrame::Handshake);

    server.inject(&marked(2, "fresh"));
    assert_eq!(next_evaluation(&mut events).await.id, 2);

    // Out-of-order delivery: id 1 after id 2. It must vanish without
    // reaching the subscriber, so the next visible evaluation is id 3.
    server.inject(&marked(1, "stale"));
    server.inject(&marked(3, "fresher"));
    let applied = next_evaluation(&mut events).await;
    assert_eq!(applied.id, 3);
    assert_eq!(applied.diagnostics[0].summary, "fresher");

    session.dispose().await;
}

#[tokio::test]
async fn duplicate_of_an_older_id_never_reverts_state() {
    // The worked example: apply id 1, apply id 2, then a duplicate
    // id 1 arrives late and must not revert the displayed state.
    let mut server = ScriptedServer::start_silent().await.unwrap();
    let (session, mut events) =
        Session::open(&Context::new("conditional"), &server.host(), fast_config()).unwrap();
    wait_connected(&mut events).await;
    assert_eq!(recv_frame(&mut server).await, ClientFrame::Handshake);

    server.inject(&marked(1, "us"));
    assert_eq!(next_evaluation(&mut events).await.id, 1);
    server.inject(&marked(2, "eu"));
    assert_eq!(next_evaluation(&mut events).await.id, 2);

    server.inject(&marked(1, "us"));
    server.inject(&marked(3, "ap"));
    let applied = next_evaluation(&mut events).await;
    assert_eq!(applied.id, 3);
    assert_eq!(applied.diagnostics[0].summary, "ap");

    session.dispose().await;
}

#[tokio::test]
async fn malformed_frame_is_dropped_and_connection_survives() {
    let mut server = ScriptedServer::start_silent().await.unwrap();
    let (session, mut events) =
        Session::open(&Context::new("conditional"), &server.host(), fast_config()).unwrap();
    wait_connected(&mut events).await;
    assert_eq!(recv_frame(&mut server).await, ClientFrame::Handshake);

    server.inject_raw("this is not json");
    server.inject(&marked(0, "after-garbage"));

    // The garbage frame must neither surface nor kill the transport.
    let applied = next_evaluation(&mut events).await;
    assert_eq!(applied.diagnostics[0].summary, "after-garbage");

    session.dispose().await;
}

#[tokio::test]
async fn disposal_cancels_a_pending_debounce() {
    let mut server = ScriptedServer::start_silent().await.unwrap();
    let (session, mut events) = Session::open(
        &Context::new("conditional"),
        &server.host(),
        SessionConfig {
            quiet_window: Duration::from_millis(100),
            ..fast_config()
        },
    )
    .unwrap();
    wait_connected(&mut events).await;
    assert_eq!(recv_frame(&mut server).await, ClientFrame::Handshake);

    // Edit, then dispose before the quiet window elapses: the armed
    // timer belongs to the disposed session and must never fire.
    session.set_input("region", "us");
    session.dispose().await;

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(server.try_next_frame(), None);
}

#[tokio::test]
async fn context_switch_starts_a_fresh_session() {
    let mut server = ScriptedServer::start_silent().await.unwrap();

    let (old, mut old_events) =
        Session::open(&Context::new("conditional"), &server.host(), fast_config()).unwrap();
    wait_connected(&mut old_events).await;
    assert_eq!(recv_frame(&mut server).await, ClientFrame::Handshake);

    old.set_input("region", "us");
    assert_eq!(mutation(recv_frame(&mut server).await).id, 0);
    old.set_input("region", "eu");
    assert_eq!(mutation(recv_frame(&mut server).await).id, 1);

    // Switching context: dispose the old session entirely, then build
    // a new one. Its counter must restart at 0.
    old.dispose().await;

    let (new, mut new_events) =
        Session::open(&Context::new("static"), &server.host(), fast_config()).unwrap();
    wait_connected(&mut new_events).await;
    assert_eq!(recv_frame(&mut server).await, ClientFrame::Handshake);

    new.set_input("region", "ap");
    assert_eq!(mutation(recv_frame(&mut server).await).id, 0);

    new.dispose().await;
}

#[tokio::test]
async fn transport_loss_reconnects_and_handshakes_again() {
    let mut server = ScriptedServer::start_silent().await.unwrap();
    let (session, mut events) =
        Session::open(&Context::new("conditional"), &server.host(), fast_config()).unwrap();
    wait_connected(&mut events).await;
    assert_eq!(recv_frame(&mut server).await, ClientFrame::Handshake);

    server.drop_connection();

    // Status must degrade, then recover on its own.
    wait_degraded(&mut events).await;
    wait_connected(&mut events).await;

    // The new transport handshakes before anything else.
    assert_eq!(recv_frame(&mut server).await, ClientFrame::Handshake);

    // And the session still works end to end.
    session.set_input("region", "us");
    assert_eq!(mutation(recv_frame(&mut server).await).id, 0);

    session.dispose().await;
}

#[tokio::test]
async fn edit_while_disconnected_is_dropped_not_queued() {
    let mut server = ScriptedServer::start_silent().await.unwrap();
    let (session, mut events) = Session::open(
        &Context::new("conditional"),
        &server.host(),
        SessionConfig {
            quiet_window: Duration::from_millis(20),
            reconnect_delay: Duration::from_millis(400),
        },
    )
    .unwrap();
    wait_connected(&mut events).await;
    assert_eq!(recv_frame(&mut server).await, ClientFrame::Handshake);

    server.drop_connection();
    wait_degraded(&mut events).await;

    // The debounce fires while disconnected; the frame is dropped with
    // a warning rather than queued for the next transport.
    session.set_input("region", "us");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.try_next_frame(), None);

    session.dispose().await;
}

#[tokio::test]
async fn auto_replying_server_round_trips_baseline_and_mutations() {
    let mut server = ScriptedServer::start().await.unwrap();
    let (session, mut events) =
        Session::open(&Context::new("conditional"), &server.host(), fast_config()).unwrap();
    wait_connected(&mut events).await;

    // Baseline evaluation for the handshake, id 0, always accepted.
    assert_eq!(recv_frame(&mut server).await, ClientFrame::Handshake);
    assert_eq!(next_evaluation(&mut events).await.id, 0);

    session.set_input("region", "us");
    let req = mutation(recv_frame(&mut server).await);
    assert_eq!(req.id, 0);
    assert_eq!(next_evaluation(&mut events).await.id, 0);

    session.set_input("region", "eu");
    let req = mutation(recv_frame(&mut server).await);
    assert_eq!(req.id, 1);
    assert_eq!(next_evaluation(&mut events).await.id, 1);

    session.dispose().await;
}
