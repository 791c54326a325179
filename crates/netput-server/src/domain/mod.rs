//! Domain layer: pure server state with no I/O.
//!
//! - **`registry`** – The set of live sessions, keyed by session id.

pub mod registry;
