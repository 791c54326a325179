//! Event dispatch use case: routes each pushed envelope to its per-kind handler.
//!
//! # Dispatch table (for beginners)
//!
//! Applications register at most one handler per event kind, once, at
//! startup:
//!
//! ```rust
//! use netput_server::application::dispatch::DispatchTable;
//!
//! let table = DispatchTable::builder()
//!     .on_keyboard(|session, key| println!("{session}: key {}", key.key_code))
//!     .on_mouse_wheel(|_, wheel| println!("scroll {} {}", wheel.x, wheel.y))
//!     .build();
//! assert_eq!(table.registered_kinds().len(), 2);
//! ```
//!
//! The table is immutable after `build()`, so there is no global mutable
//! registration state.  The [`Dispatcher`] matches exhaustively on the event
//! union and calls exactly one handler with the kind-specific fields.
//!
//! # Contract for handlers
//!
//! Handlers run on the serving loop, one at a time.  A handler that blocks
//! stalls every session, so handlers must hand slow work off elsewhere.

use netput_core::protocol::events::{
    EventInfo, EventKind, KeyboardEvent, MouseButtonEvent, MouseMotionEvent, MouseWheelEvent,
    WindowEvent,
};
use netput_core::{Event, SessionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::domain::registry::SessionRegistry;

/// A handler for one event kind.
pub type Handler<E> = Box<dyn Fn(&SessionId, &E) + Send + Sync>;

/// Error type for dispatch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The envelope names a session that is not live.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// No handler is registered for this kind.
    #[error("no handler for {0} events")]
    Unhandled(EventKind),
}

/// Whether envelopes must belong to a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPolicy {
    /// Reject envelopes whose session id is not in the registry.
    #[default]
    RequireActive,
    /// Dispatch regardless; liveness is left to the handlers.
    Permissive,
}

// ── Dispatch table ────────────────────────────────────────────────────────────

/// Immutable kind → handler table.
#[derive(Default)]
pub struct DispatchTable {
    keyboard: Option<Handler<KeyboardEvent>>,
    mouse_motion: Option<Handler<MouseMotionEvent>>,
    mouse_button: Option<Handler<MouseButtonEvent>>,
    mouse_wheel: Option<Handler<MouseWheelEvent>>,
    window: Option<Handler<WindowEvent>>,
}

impl DispatchTable {
    pub fn builder() -> DispatchTableBuilder {
        DispatchTableBuilder::default()
    }

    /// Returns `true` when a handler is registered for `kind`.
    pub fn handles(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::Keyboard => self.keyboard.is_some(),
            EventKind::MouseMotion => self.mouse_motion.is_some(),
            EventKind::MouseButton => self.mouse_button.is_some(),
            EventKind::MouseWheel => self.mouse_wheel.is_some(),
            EventKind::Window => self.window.is_some(),
        }
    }

    pub fn registered_kinds(&self) -> Vec<EventKind> {
        EventKind::ALL
            .into_iter()
            .filter(|kind| self.handles(*kind))
            .collect()
    }

    /// Calls the handler for `info`, returning `false` if none is registered.
    fn invoke(&self, session_id: &SessionId, info: &EventInfo) -> bool {
        fn call<E>(handler: &Option<Handler<E>>, session_id: &SessionId, event: &E) -> bool {
            match handler {
                Some(h) => {
                    h(session_id, event);
                    true
                }
                None => false,
            }
        }

        match info {
            EventInfo::Keyboard(e) => call(&self.keyboard, session_id, e),
            EventInfo::MouseMotion(e) => call(&self.mouse_motion, session_id, e),
            EventInfo::MouseButton(e) => call(&self.mouse_button, session_id, e),
            EventInfo::MouseWheel(e) => call(&self.mouse_wheel, session_id, e),
            EventInfo::Window(e) => call(&self.window, session_id, e),
        }
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("registered", &self.registered_kinds())
            .finish()
    }
}

/// Builder for [`DispatchTable`].  Registering a kind twice keeps the last handler.
#[derive(Default)]
pub struct DispatchTableBuilder {
    table: DispatchTable,
}

impl DispatchTableBuilder {
    pub fn on_keyboard(
        mut self,
        handler: impl Fn(&SessionId, &KeyboardEvent) + Send + Sync + 'static,
    ) -> Self {
        self.table.keyboard = Some(Box::new(handler));
        self
    }

    pub fn on_mouse_motion(
        mut self,
        handler: impl Fn(&SessionId, &MouseMotionEvent) + Send + Sync + 'static,
    ) -> Self {
        self.table.mouse_motion = Some(Box::new(handler));
        self
    }

    pub fn on_mouse_button(
        mut self,
        handler: impl Fn(&SessionId, &MouseButtonEvent) + Send + Sync + 'static,
    ) -> Self {
        self.table.mouse_button = Some(Box::new(handler));
        self
    }

    pub fn on_mouse_wheel(
        mut self,
        handler: impl Fn(&SessionId, &MouseWheelEvent) + Send + Sync + 'static,
    ) -> Self {
        self.table.mouse_wheel = Some(Box::new(handler));
        self
    }

    pub fn on_window(
        mut self,
        handler: impl Fn(&SessionId, &WindowEvent) + Send + Sync + 'static,
    ) -> Self {
        self.table.window = Some(Box::new(handler));
        self
    }

    pub fn build(self) -> DispatchTable {
        self.table
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Routes envelopes through a [`DispatchTable`] under a [`SessionPolicy`].
#[derive(Debug, Default)]
pub struct Dispatcher {
    table: DispatchTable,
    policy: SessionPolicy,
}

impl Dispatcher {
    pub fn new(table: DispatchTable, policy: SessionPolicy) -> Self {
        Self { table, policy }
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// Dispatches one envelope, returning the kind that was handled.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::UnknownSession`] under
    ///   [`SessionPolicy::RequireActive`] when the session is not live.
    /// - [`DispatchError::Unhandled`] when no handler is registered for the
    ///   envelope's kind.
    pub fn dispatch(
        &self,
        event: &Event,
        registry: &mut SessionRegistry,
    ) -> Result<EventKind, DispatchError> {
        let kind = event.kind();
        let live = registry.contains(&event.session_id);
        if !live && self.policy == SessionPolicy::RequireActive {
            return Err(DispatchError::UnknownSession(event.session_id.clone()));
        }

        if !self.table.invoke(&event.session_id, &event.info) {
            return Err(DispatchError::Unhandled(kind));
        }

        if live {
            registry.record_event(&event.session_id);
        }
        trace!("dispatched {kind} event for session {}", event.session_id);
        Ok(kind)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
