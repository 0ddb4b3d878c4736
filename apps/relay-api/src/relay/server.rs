//! WebSocket upgrade handler and per-connection event loop.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time;

use crate::AppState;

use super::events::{
    ActionName, ClientFrame, IdentifyPayload, ServerFrame, OP_DISPATCH, OP_HEARTBEAT, OP_IDENTIFY,
};
use super::handler::{self, HEARTBEAT_INTERVAL_MS};
use super::session::RelaySession;

/// Close codes (4000-range for application-level).
const CLOSE_UNKNOWN_ERROR: u16 = 4000;
const CLOSE_UNKNOWN_OPCODE: u16 = 4001;
const CLOSE_NOT_AUTHENTICATED: u16 = 4003;
const CLOSE_AUTH_FAILED: u16 = 4004;
const CLOSE_SESSION_TIMEOUT: u16 = 4009;

/// Timeout for receiving IDENTIFY after connection (seconds).
const IDENTIFY_TIMEOUT_SECS: u64 = 10;

pub fn router() -> Router<AppState> {
    Router::new().route("/relay", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Step 1: wait for IDENTIFY within the handshake timeout.
    let identify_result = time::timeout(Duration::from_secs(IDENTIFY_TIMEOUT_SECS), async {
        while let Some(msg) = ws_rx.next().await {
            let msg = match msg {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!(?e, "ws read error during identify");
                    return Err("read error");
                }
            };

            let text = match msg {
                Message::Text(t) => t,
                Message::Close(_) => return Err("client closed"),
                Message::Ping(_) | Message::Pong(_) => continue,
                _ => continue,
            };

            let frame: ClientFrame = match serde_json::from_str(&text) {
                Ok(f) => f,
                Err(_) => return Err("invalid json"),
            };

            if frame.op != OP_IDENTIFY {
                return Err("expected identify");
            }

            let payload: IdentifyPayload =
                serde_json::from_value(frame.d).map_err(|_| "invalid identify payload")?;
            return Ok(payload);
        }
        Err("connection closed before identify")
    })
    .await;

    let payload = match identify_result {
        Ok(Ok(p)) => p,
        Ok(Err(reason)) => {
            tracing::debug!(%reason, "relay handshake failed");
            let _ = send_close(&mut ws_tx, CLOSE_NOT_AUTHENTICATED, reason).await;
            return;
        }
        Err(_timeout) => {
            let _ = send_close(&mut ws_tx, CLOSE_SESSION_TIMEOUT, "Handshake timeout").await;
            return;
        }
    };

    let (mut session, ready) = match handler::handle_identify(&state, payload).await {
        Ok(result) => result,
        Err(reason) => {
            tracing::debug!(%reason, "identify failed");
            let _ = send_close(&mut ws_tx, CLOSE_AUTH_FAILED, reason).await;
            return;
        }
    };

    tracing::info!(
        connection_id = %session.connection_id,
        user_id = %session.user_id,
        "relay connection established"
    );

    // Register the outbound channel before entering the loop; the connection
    // is in no room yet, so nothing can be queued ahead of READY.
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    state.registry.register(&session.connection_id, outbound_tx);

    let ready_json = serde_json::to_string(&ready).unwrap();
    if ws_tx.send(Message::Text(ready_json.into())).await.is_err() {
        state.registry.unregister(&session.connection_id);
        return;
    }

    run_session(&state, &mut session, ws_tx, ws_rx, outbound_rx).await;

    // Exactly-once cleanup for every exit path of the loop.
    handler::handle_disconnect(&state, &session);

    tracing::info!(
        connection_id = %session.connection_id,
        user_id = %session.user_id,
        "relay connection closed"
    );
}

/// Main loop: read client frames, flush room broadcasts, enforce heartbeat.
async fn run_session(
    state: &AppState,
    session: &mut RelaySession,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut ws_rx: SplitStream<WebSocket>,
    mut outbound_rx: mpsc::UnboundedReceiver<ServerFrame>,
) {
    // Client must heartbeat within 1.5× the advertised interval.
    let heartbeat_deadline = Duration::from_millis(HEARTBEAT_INTERVAL_MS * 3 / 2);
    let mut heartbeat_timer = time::interval(heartbeat_deadline);
    heartbeat_timer.tick().await; // First tick fires immediately; skip it.
    let mut got_heartbeat = true;

    loop {
        tokio::select! {
            // Client sends us a frame.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let frame: ClientFrame = match serde_json::from_str(&text) {
                            Ok(f) => f,
                            Err(_) => {
                                let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_ERROR, "Invalid JSON").await;
                                break;
                            }
                        };

                        match frame.op {
                            OP_HEARTBEAT => {
                                got_heartbeat = true;
                                let ack = serde_json::to_string(&ServerFrame::heartbeat_ack()).unwrap();
                                if ws_tx.send(Message::Text(ack.into())).await.is_err() {
                                    break;
                                }
                            }
                            OP_IDENTIFY => {
                                let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_ERROR, "Already identified").await;
                                break;
                            }
                            OP_DISPATCH => {
                                handle_action(state, session, frame).await;
                            }
                            _ => {
                                let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_OPCODE, "Unknown opcode").await;
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %session.connection_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // Frame queued for this connection (broadcast, history, error).
            frame = outbound_rx.recv() => {
                match frame {
                    Some(frame) => {
                        let json = serde_json::to_string(&frame).unwrap();
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    // Sender side dropped — the registry no longer knows us.
                    None => break,
                }
            }

            // Heartbeat deadline check.
            _ = heartbeat_timer.tick() => {
                if !got_heartbeat {
                    tracing::debug!(
                        connection_id = %session.connection_id,
                        "heartbeat timeout — closing connection"
                    );
                    let _ = send_close(&mut ws_tx, CLOSE_SESSION_TIMEOUT, "Heartbeat timeout").await;
                    break;
                }
                got_heartbeat = false;
            }
        }
    }
}

/// Dispatch an op=0 action frame to the protocol handler.
async fn handle_action(state: &AppState, session: &mut RelaySession, frame: ClientFrame) {
    let Some(action) = frame.t else {
        state.registry.send_to(
            &session.connection_id,
            ServerFrame::error("INVALID_FRAME", "Dispatch frame without an action name"),
        );
        return;
    };

    match action.as_str() {
        ActionName::JOIN_SESSION => match serde_json::from_value(frame.d) {
            Ok(payload) => handler::handle_join(state, session, payload).await,
            Err(_) => reject_payload(state, session, &action),
        },
        ActionName::LEAVE_SESSION => match serde_json::from_value(frame.d) {
            Ok(payload) => handler::handle_leave(state, session, payload).await,
            Err(_) => reject_payload(state, session, &action),
        },
        ActionName::SEND_MESSAGE => match serde_json::from_value(frame.d) {
            Ok(payload) => handler::handle_send(state, session, payload).await,
            Err(_) => reject_payload(state, session, &action),
        },
        ActionName::DELETE_MESSAGE => match serde_json::from_value(frame.d) {
            Ok(payload) => handler::handle_delete(state, session, payload).await,
            Err(_) => reject_payload(state, session, &action),
        },
        _ => {
            state.registry.send_to(
                &session.connection_id,
                ServerFrame::error("UNKNOWN_ACTION", "Unrecognized action name"),
            );
        }
    }
}

fn reject_payload(state: &AppState, session: &RelaySession, action: &str) {
    state.registry.send_to(
        &session.connection_id,
        ServerFrame::error("INVALID_PAYLOAD", &format!("Malformed {action} payload")),
    );
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
