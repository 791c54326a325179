//! Transport port: the narrow seam between the session/dispatch core and the
//! concrete wire.
//!
//! # Two sides of one seam
//!
//! - **Client side** – [`ClientTransport`] is what the client proxy calls.
//!   A TCP implementation lives in `netput-client`; an in-process one lives
//!   in `netput-server` for tests and embedding.
//! - **Server side** – every server adapter turns whatever arrives on its
//!   wire into an [`InboundCall`] and sends it to the serving loop.  Replies
//!   travel back on a `oneshot` channel carried inside the call.
//!
//! Because both sides meet at these types, the handshake and dispatch logic is
//! written once and each transport stays a thin adapter.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::protocol::codec::ProtocolError;
use crate::protocol::events::{Event, SessionId};
use crate::protocol::messages::{
    ConnectRequest, ConnectResponse, DisconnectRequest, DisconnectResponse, MessageType, PushAck,
};

// ── Delivery mode ─────────────────────────────────────────────────────────────

/// How `push` waits for the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    /// Resolve after the server has dispatched the envelope.
    #[default]
    Acknowledged,
    /// Resolve once the frame has been handed to the wire.
    FireAndForget,
}

impl std::str::FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "acknowledged" | "ack" => Ok(DeliveryMode::Acknowledged),
            "fire-and-forget" | "fire" => Ok(DeliveryMode::FireAndForget),
            other => Err(format!("unknown delivery mode: {other}")),
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors raised by a transport while carrying a call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport could not reach the server.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The connection or serving loop went away before a reply arrived.
    #[error("transport closed")]
    Closed,

    #[error("timed out waiting for a reply")]
    Timeout,

    /// The reply to a call was of the wrong message type.
    #[error("unexpected {0:?} reply")]
    UnexpectedReply(MessageType),

    /// The server processed an acknowledged push and reported an error.
    #[error("server rejected the call: {0}")]
    Rejected(String),
}

// ── Client side ───────────────────────────────────────────────────────────────

/// The three RPC primitives a client needs.
///
/// Implementations are shared between tasks behind an `Arc`, hence
/// `Send + Sync`.
#[async_trait]
pub trait ClientTransport: Send + Sync {
    /// Sends a `Connect` and waits for the response.
    async fn connect(&self, request: ConnectRequest) -> Result<ConnectResponse, TransportError>;

    /// Sends one event envelope.
    ///
    /// With [`DeliveryMode::Acknowledged`] this resolves after the server has
    /// processed the envelope and maps a server-side dispatch error to
    /// [`TransportError::Rejected`].  With [`DeliveryMode::FireAndForget`] it
    /// resolves once the envelope has been submitted.
    async fn push(&self, event: Event, mode: DeliveryMode) -> Result<(), TransportError>;

    /// Sends a `Disconnect` and waits for the response.
    async fn disconnect(
        &self,
        request: DisconnectRequest,
    ) -> Result<DisconnectResponse, TransportError>;
}

// ── Server side ───────────────────────────────────────────────────────────────

/// Identifies the adapter connection a call arrived on.
///
/// Sessions remember the connection that opened them, so a connection that
/// goes away releases only the sessions it still owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw id.  Use [`ConnectionId::next`] for a fresh one.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// A process-wide unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One call delivered by a server adapter to the serving loop.
#[derive(Debug)]
pub enum InboundCall {
    Connect {
        request: ConnectRequest,
        /// Human-readable peer description (socket address, "local", ...).
        origin: String,
        /// Connection that will own the session if the connect succeeds.
        owner: ConnectionId,
        reply: oneshot::Sender<ConnectResponse>,
    },
    Push {
        event: Event,
        /// `None` for fire-and-forget pushes.
        reply: Option<oneshot::Sender<PushAck>>,
    },
    Disconnect {
        request: DisconnectRequest,
        reply: oneshot::Sender<DisconnectResponse>,
    },
    /// Connection `owner` is gone.  Releases the session only if `owner`
    /// still owns it.
    Release {
        session_id: SessionId,
        owner: ConnectionId,
    },
}

impl InboundCall {
    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            InboundCall::Connect { .. } => "connect",
            InboundCall::Push { .. } => "push",
            InboundCall::Disconnect { .. } => "disconnect",
            InboundCall::Release { .. } => "release",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_mode_defaults_to_acknowledged() {
        assert_eq!(DeliveryMode::default(), DeliveryMode::Acknowledged);
    }

    #[test]
    fn test_delivery_mode_parses_long_and_short_names() {
        assert_eq!("fire-and-forget".parse::<DeliveryMode>(), Ok(DeliveryMode::FireAndForget));
        assert_eq!("ack".parse::<DeliveryMode>(), Ok(DeliveryMode::Acknowledged));
        assert!("sometimes".parse::<DeliveryMode>().is_err());
    }

    #[test]
    fn test_delivery_mode_serializes_kebab_case() {
        let json = serde_json::to_string(&DeliveryMode::FireAndForget).unwrap();
        assert_eq!(json, "\"fire-and-forget\"");
    }

    #[test]
    fn test_inbound_call_label_names_the_operation() {
        let (tx, _rx) = oneshot::channel();
        let call = InboundCall::Disconnect {
            request: DisconnectRequest::default(),
            reply: tx,
        };
        assert_eq!(call.label(), "disconnect");
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();

        assert_ne!(a, b);
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_push_reply_travels_back_through_the_call() {
        // Arrange
        let (tx, rx) = oneshot::channel();
        let call = InboundCall::Push {
            event: Event::new(
                SessionId::from("s"),
                crate::protocol::events::MouseWheelEvent::from_steps(0, 0, 1, 1),
            ),
            reply: Some(tx),
        };

        // Act – the serving loop's side
        if let InboundCall::Push { reply: Some(reply), .. } = call {
            reply.send(PushAck::ok()).unwrap();
        }

        // Assert
        let ack = tokio_test::block_on(rx).unwrap();
        assert!(ack.error.is_none());
    }
}
