//! Inbound event orchestration: IDENTIFY plus the session actions
//! (join, leave, send, delete) and disconnect cleanup.

use serde_json::json;

use crate::auth::tickets;
use crate::store::StoreError;
use crate::AppState;

use super::events::{
    DeleteMessagePayload, EventName, IdentifyPayload, JoinSessionPayload, LeaveSessionPayload,
    SendMessagePayload, ServerFrame,
};
use super::session::RelaySession;

/// Heartbeat interval sent to clients in the READY payload (ms).
pub const HEARTBEAT_INTERVAL_MS: u64 = 30_000;

/// Maximum accepted message length, in bytes.
const MAX_CONTENT_LEN: usize = 4000;

/// Process an IDENTIFY frame. Returns a (`RelaySession`, READY frame) on
/// success; the caller closes the socket on failure.
pub async fn handle_identify(
    state: &AppState,
    payload: IdentifyPayload,
) -> Result<(RelaySession, ServerFrame), &'static str> {
    // Consume the WS ticket (single-use).
    let ticket_data = tickets::consume_ws_ticket(state.kv.as_ref(), &payload.ticket)
        .await
        .map_err(|_| "Ticket lookup failed")?
        .ok_or("Invalid or expired ticket")?;

    let connection_id = sanare_common::id::prefixed_ulid(sanare_common::id::prefix::CONNECTION);

    let ready = ServerFrame::dispatch(
        EventName::READY,
        json!({
            "connection_id": connection_id,
            "user": {
                "id": ticket_data.user_id,
                "display_name": ticket_data.display_name,
            },
            "heartbeat_interval": HEARTBEAT_INTERVAL_MS,
        }),
    );

    let session = RelaySession::new(
        connection_id,
        ticket_data.user_id,
        ticket_data.display_name,
    );

    Ok((session, ready))
}

/// JOIN_SESSION: add to the room, tell the others, replay history to the
/// joiner only.
pub async fn handle_join(state: &AppState, session: &mut RelaySession, payload: JoinSessionPayload) {
    state
        .registry
        .join(&session.connection_id, &payload.session_id);
    session.note_join(payload.session_id.clone());

    let joined = ServerFrame::dispatch(
        EventName::USER_JOINED,
        json!({
            "session_id": payload.session_id,
            "user_id": session.user_id,
            "display_name": session.display_name,
        }),
    );
    state
        .broadcast
        .broadcast_to_room(&payload.session_id, &joined, Some(&session.connection_id));

    // One-shot history replay, ascending creation order, soft-deleted rows
    // included and flagged.
    match state.store.list_messages(&payload.session_id).await {
        Ok(messages) => {
            let history = ServerFrame::dispatch(
                EventName::PREVIOUS_MESSAGES,
                json!({
                    "session_id": payload.session_id,
                    "messages": messages,
                }),
            );
            state.registry.send_to(&session.connection_id, history);
        }
        Err(err) => {
            tracing::warn!(
                %err,
                session_id = %payload.session_id,
                connection_id = %session.connection_id,
                "history replay failed"
            );
            state.registry.send_to(
                &session.connection_id,
                ServerFrame::error("HISTORY_UNAVAILABLE", "Could not load session history"),
            );
        }
    }
}

/// LEAVE_SESSION: silent no-op when not a member.
pub async fn handle_leave(
    state: &AppState,
    session: &mut RelaySession,
    payload: LeaveSessionPayload,
) {
    if !session.note_leave(&payload.session_id) {
        return;
    }
    state
        .registry
        .leave(&session.connection_id, &payload.session_id);

    let left = ServerFrame::dispatch(
        EventName::USER_LEFT,
        json!({
            "session_id": payload.session_id,
            "user_id": session.user_id,
        }),
    );
    state
        .broadcast
        .broadcast_to_room(&payload.session_id, &left, None);
}

/// SEND_MESSAGE: persist first; broadcast to the whole room (sender
/// included) only once the store accepted the row.
pub async fn handle_send(state: &AppState, session: &RelaySession, payload: SendMessagePayload) {
    if !session.is_member(&payload.session_id) {
        state.registry.send_to(
            &session.connection_id,
            ServerFrame::error("NOT_IN_SESSION", "Join the session before sending"),
        );
        return;
    }

    let content = payload.content.trim();
    if content.is_empty() || content.len() > MAX_CONTENT_LEN {
        state.registry.send_to(
            &session.connection_id,
            ServerFrame::error("INVALID_CONTENT", "Message must be 1-4000 characters"),
        );
        return;
    }

    match state
        .store
        .create_message(
            &payload.session_id,
            &session.user_id,
            &session.display_name,
            content,
        )
        .await
    {
        Ok(message) => {
            let frame = ServerFrame::dispatch(
                EventName::MESSAGE_CREATE,
                serde_json::to_value(&message).unwrap_or_default(),
            );
            state
                .broadcast
                .broadcast_to_room(&payload.session_id, &frame, None);
        }
        Err(err) => {
            tracing::warn!(
                %err,
                session_id = %payload.session_id,
                user_id = %session.user_id,
                "message persistence failed"
            );
            // Only the sender learns about the failure; bystanders see nothing.
            state.registry.send_to(
                &session.connection_id,
                ServerFrame::error("MESSAGE_NOT_SAVED", "Message could not be saved"),
            );
        }
    }
}

/// DELETE_MESSAGE: soft-delete in the store, then notify the whole room.
/// Failures are logged and reported to the actor only.
pub async fn handle_delete(state: &AppState, session: &RelaySession, payload: DeleteMessagePayload) {
    match state
        .store
        .soft_delete(payload.message_id, &session.user_id)
        .await
    {
        Ok(()) => {
            let frame = ServerFrame::dispatch(
                EventName::MESSAGE_DELETE,
                json!({
                    "session_id": payload.session_id,
                    "message_id": payload.message_id,
                }),
            );
            state
                .broadcast
                .broadcast_to_room(&payload.session_id, &frame, None);
        }
        Err(StoreError::NotFound) => {
            tracing::warn!(
                message_id = payload.message_id,
                user_id = %session.user_id,
                "delete of unknown message"
            );
            state.registry.send_to(
                &session.connection_id,
                ServerFrame::error("MESSAGE_NOT_FOUND", "Message does not exist"),
            );
        }
        Err(err) => {
            tracing::warn!(
                %err,
                message_id = payload.message_id,
                user_id = %session.user_id,
                "message delete failed"
            );
            state.registry.send_to(
                &session.connection_id,
                ServerFrame::error("DELETE_FAILED", "Message could not be deleted"),
            );
        }
    }
}

/// Transport disconnect: release all bookkeeping, then tell each room.
pub fn handle_disconnect(state: &AppState, session: &RelaySession) {
    let rooms = state.registry.unregister(&session.connection_id);

    for room_id in rooms {
        let left = ServerFrame::dispatch(
            EventName::USER_LEFT,
            json!({
                "session_id": room_id,
                "user_id": session.user_id,
            }),
        );
        state.broadcast.broadcast_to_room(&room_id, &left, None);
    }
}
