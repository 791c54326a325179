//! Protocol module: event model, RPC messages, and the binary codec.

pub mod call_id;
pub mod codec;
pub mod credential;
pub mod events;
pub mod messages;

pub use call_id::CallIdCounter;
pub use codec::{decode_frame, decode_header, encode_frame, FrameHeader, ProtocolError};
pub use credential::{Credential, Usage};
pub use events::*;
pub use messages::*;
