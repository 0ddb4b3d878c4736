//! Relay opcodes, event names, and wire-format frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

pub const OP_DISPATCH: u8 = 0;
pub const OP_HEARTBEAT: u8 = 1;
pub const OP_IDENTIFY: u8 = 2;
pub const OP_HEARTBEAT_ACK: u8 = 6;

// ---------------------------------------------------------------------------
// Server → Client frame
// ---------------------------------------------------------------------------

/// A frame sent from the relay to a client over WebSocket.
#[derive(Debug, Clone, Serialize)]
pub struct ServerFrame {
    pub op: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    pub d: Value,
}

impl ServerFrame {
    /// Build a DISPATCH frame (op=0).
    pub fn dispatch(event_name: &str, data: Value) -> Self {
        Self {
            op: OP_DISPATCH,
            t: Some(event_name.to_string()),
            d: data,
        }
    }

    /// Build an ERROR dispatch addressed to the acting connection only.
    pub fn error(code: &str, message: &str) -> Self {
        Self::dispatch(
            EventName::ERROR,
            serde_json::json!({ "code": code, "message": message }),
        )
    }

    /// Build a HEARTBEAT_ACK frame (op=6).
    pub fn heartbeat_ack() -> Self {
        Self {
            op: OP_HEARTBEAT_ACK,
            t: None,
            d: serde_json::json!({}),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server frame
// ---------------------------------------------------------------------------

/// A frame received from a client over WebSocket.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub op: u8,
    #[serde(default)]
    pub t: Option<String>,
    #[serde(default)]
    pub d: Value,
}

// ---------------------------------------------------------------------------
// Inbound payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct IdentifyPayload {
    pub ticket: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinSessionPayload {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LeaveSessionPayload {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessagePayload {
    pub session_id: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMessagePayload {
    pub session_id: String,
    pub message_id: i64,
}

// ---------------------------------------------------------------------------
// Event and action names
// ---------------------------------------------------------------------------

/// Client action names carried in `t` of an op=0 frame.
pub struct ActionName;

impl ActionName {
    pub const JOIN_SESSION: &'static str = "JOIN_SESSION";
    pub const LEAVE_SESSION: &'static str = "LEAVE_SESSION";
    pub const SEND_MESSAGE: &'static str = "SEND_MESSAGE";
    pub const DELETE_MESSAGE: &'static str = "DELETE_MESSAGE";
}

/// Event names dispatched to clients.
pub struct EventName;

impl EventName {
    pub const READY: &'static str = "READY";
    pub const USER_JOINED: &'static str = "USER_JOINED";
    pub const USER_LEFT: &'static str = "USER_LEFT";
    pub const PREVIOUS_MESSAGES: &'static str = "PREVIOUS_MESSAGES";
    pub const MESSAGE_CREATE: &'static str = "MESSAGE_CREATE";
    pub const MESSAGE_DELETE: &'static str = "MESSAGE_DELETE";
    pub const ERROR: &'static str = "ERROR";
}
