//! netput-client library entry point.
//!
//! # What does netput-client do? (for beginners)
//!
//! The client runs on the machine where input is captured.  It:
//!
//! 1. Opens a TCP connection to a netput server.
//! 2. Presents a credential blob and receives a session id.
//! 3. Sends each keyboard, mouse, and window event as an envelope tagged with
//!    that session id.
//! 4. Disconnects, which ends the session on the server.
//!
//! Capturing the events from the operating system is left to the embedding
//! application; this crate only carries them.

pub mod application;
pub mod infrastructure;

pub use application::proxy::{ClientError, ClientProxy, ErrorCallback};
pub use infrastructure::network::TcpClientTransport;
