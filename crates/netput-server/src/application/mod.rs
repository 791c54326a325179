//! Application layer use cases for the server.
//!
//! # What is the "application" layer? (for beginners)
//!
//! Use cases in this layer orchestrate domain state to fulfil one protocol
//! operation.  They depend on traits (the authenticator, the disconnect
//! authorizer, the handler table) rather than concrete implementations and
//! contain no network or file-system access, so each is unit-testable with
//! a plain `SessionRegistry`.
//!
//! # Sub-modules
//!
//! - **`handshake`** – `connect` and `disconnect`: authentication gating and
//!   session allocation.
//!
//! - **`dispatch`** – `push`: routes an event envelope to the one handler
//!   registered for its kind.

pub mod dispatch;
pub mod handshake;
