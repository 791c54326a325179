//! # netput-core
//!
//! Shared library for netput containing the event model, the binary wire
//! codec, and the transport port used by both the server and the client.
//!
//! It has no dependencies on sockets or OS input APIs.
//!
//! # Architecture overview (for beginners)
//!
//! netput relays input events (key presses, mouse movement, window changes)
//! captured on one machine to handlers on another.  A client first
//! *connects* with a credential and receives a session id; it then *pushes*
//! events tagged with that id; finally it *disconnects*.
//!
//! This crate is the shared foundation.  It defines:
//!
//! - **`protocol`** – The five event kinds, the RPC messages that carry them,
//!   and the codec that turns messages into bytes (16-byte header + payload)
//!   and back.
//!
//! - **`transport`** – The port between the session/dispatch core and a
//!   concrete wire.  Clients talk to a [`ClientTransport`]; server adapters
//!   hand [`InboundCall`]s to the serving loop.

pub mod protocol;
pub mod transport;

pub use protocol::codec::{decode_frame, encode_frame, ProtocolError};
pub use protocol::events::{Event, EventInfo, EventKind, SessionId};
pub use protocol::messages::{Frame, RpcMessage};
pub use transport::{ClientTransport, ConnectionId, DeliveryMode, InboundCall, TransportError};
