//! Infrastructure layer for the server.
//!
//! Contains I/O-facing adapters: network transports, configuration storage,
//! and the stock password authenticator.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain`, and
//! `netput_core`, but MUST NOT be imported by the `application` or `domain`
//! layers.

pub mod auth;
pub mod network;
pub mod storage;
