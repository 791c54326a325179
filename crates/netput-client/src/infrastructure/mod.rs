//! Infrastructure layer for the client.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `netput_core`, but MUST NOT be imported by the `application` layer.  The
//! proxy only sees the [`ClientTransport`](netput_core::ClientTransport) trait.

pub mod network;
