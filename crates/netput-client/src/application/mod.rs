//! Application layer for the client.
//!
//! - **`proxy`** – [`ClientProxy`](proxy::ClientProxy): owns the session id
//!   and turns typed `send_*` calls into pushed envelopes.

pub mod proxy;
