//! netput-server library entry point.
//!
//! # Layers (for beginners)
//!
//! - **`domain`** – The session registry: which session ids are live.
//! - **`application`** – The two protocol use cases, `handshake`
//!   (connect/disconnect) and `dispatch` (push).  No I/O.
//! - **`infrastructure`** – TCP and in-process adapters, the TOML config
//!   file, and the stock password authenticator.
//! - **`server`** – The serving loop tying them together, plus the
//!   cross-thread shutdown handle.
//!
//! Integration tests in `tests/` and the binary in `main.rs` share this module
//! tree.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod server;

pub use application::dispatch::{DispatchError, DispatchTable, Dispatcher, SessionPolicy};
pub use application::handshake::{Authenticator, DisconnectAuthorizer, Grant, Handshake};
pub use domain::registry::{SessionRecord, SessionRegistry};
pub use infrastructure::auth::PasswordAuthenticator;
pub use infrastructure::network::LocalTransport;
pub use server::{LifecycleState, ServeError, Server, ServerBuilder, ShutdownHandle};
