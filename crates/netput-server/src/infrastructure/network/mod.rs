//! Server-side transport adapters.
//!
//! Every adapter turns traffic into [`InboundCall`](netput_core::InboundCall)s
//! on the serving loop's queue and stops when the loop broadcasts shutdown.
//!
//! # Sub-modules
//!
//! - **`tcp`** – Framed binary protocol over TCP, one task per connection.
//!   Sessions opened on a connection are released when it closes.
//!
//! - **`local`** – In-process transport implementing
//!   [`ClientTransport`](netput_core::ClientTransport), for tests and for
//!   embedding the server in the same process as its client.

pub mod local;
pub mod tcp;

pub use local::LocalTransport;
