//! RPC message types exchanged between client and server.
//!
//! The RPC surface has three operations (`Connect`, `Push`, `Disconnect`).
//! `Connect` and `Disconnect` always get a response; `Push` gets a `PushAck`
//! only when the caller asked for acknowledged delivery.

use serde::{Deserialize, Serialize};

use crate::protocol::events::{Event, SessionId};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Current protocol version byte.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Total size of the frame header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Header flag: the sender of a `Push` wants a `PushAck`.
pub const FLAG_ACK_REQUESTED: u8 = 1 << 0;

// ── Message type codes ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    ConnectRequest = 0x01,
    ConnectResponse = 0x02,
    Push = 0x03,
    PushAck = 0x04,
    DisconnectRequest = 0x05,
    DisconnectResponse = 0x06,
}

impl MessageType {
    /// Returns the response type a server owes for this request type, if any.
    ///
    /// `Push` only gets a response when [`FLAG_ACK_REQUESTED`] is set.
    pub fn response_type(self) -> Option<MessageType> {
        match self {
            MessageType::ConnectRequest => Some(MessageType::ConnectResponse),
            MessageType::Push => Some(MessageType::PushAck),
            MessageType::DisconnectRequest => Some(MessageType::DisconnectResponse),
            _ => None,
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(MessageType::ConnectRequest),
            0x02 => Ok(MessageType::ConnectResponse),
            0x03 => Ok(MessageType::Push),
            0x04 => Ok(MessageType::PushAck),
            0x05 => Ok(MessageType::DisconnectRequest),
            0x06 => Ok(MessageType::DisconnectResponse),
            _ => Err(()),
        }
    }
}

// ── Request / response payloads ───────────────────────────────────────────────

/// `Connect` request.
///
/// `user_data: None` means the field was absent; `Some(vec![])` is an empty
/// credential.  The two are distinct on the wire and to the authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub user_data: Option<Vec<u8>>,
}

impl ConnectRequest {
    pub fn with_credential(credential: &[u8]) -> Self {
        Self {
            user_data: Some(credential.to_vec()),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_data: None }
    }
}

/// `Connect` response: either a session id or an error string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectResponse {
    SessionId(SessionId),
    Error(String),
}

/// `Disconnect` request.  `session_id: None` means the field was absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisconnectRequest {
    pub session_id: Option<SessionId>,
}

impl DisconnectRequest {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id: Some(session_id),
        }
    }
}

/// `Disconnect` response: `error: None` means success.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisconnectResponse {
    pub error: Option<String>,
}

impl DisconnectResponse {
    pub fn ok() -> Self {
        Self { error: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Acknowledgement for an acknowledged `Push`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PushAck {
    pub error: Option<String>,
}

impl PushAck {
    pub fn ok() -> Self {
        Self { error: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
        }
    }
}

// ── Top-level message enum ────────────────────────────────────────────────────

/// All protocol messages, discriminated by type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RpcMessage {
    ConnectRequest(ConnectRequest),
    ConnectResponse(ConnectResponse),
    Push(Event),
    PushAck(PushAck),
    DisconnectRequest(DisconnectRequest),
    DisconnectResponse(DisconnectResponse),
}

impl RpcMessage {
    /// Returns the [`MessageType`] discriminant for this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            RpcMessage::ConnectRequest(_) => MessageType::ConnectRequest,
            RpcMessage::ConnectResponse(_) => MessageType::ConnectResponse,
            RpcMessage::Push(_) => MessageType::Push,
            RpcMessage::PushAck(_) => MessageType::PushAck,
            RpcMessage::DisconnectRequest(_) => MessageType::DisconnectRequest,
            RpcMessage::DisconnectResponse(_) => MessageType::DisconnectResponse,
        }
    }
}

/// A decoded frame: header fields plus the message.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Correlates a response with its request.
    pub call_id: u64,
    /// Header flag byte (see [`FLAG_ACK_REQUESTED`]).
    pub flags: u8,
    pub message: RpcMessage,
}

impl Frame {
    pub fn new(call_id: u64, message: RpcMessage) -> Self {
        Self {
            call_id,
            flags: 0,
            message,
        }
    }

    /// Builds a `Push` frame, setting the acknowledge flag when requested.
    pub fn push(call_id: u64, event: Event, acknowledge: bool) -> Self {
        Self {
            call_id,
            flags: if acknowledge { FLAG_ACK_REQUESTED } else { 0 },
            message: RpcMessage::Push(event),
        }
    }

    pub fn ack_requested(&self) -> bool {
        self.flags & FLAG_ACK_REQUESTED != 0
    }
}
