//! SessionRegistry: the set of currently authenticated sessions.
//!
//! # Who touches the registry? (for beginners)
//!
//! ```text
//!   Handshake ──insert/remove──►  SessionRegistry  ◄──contains/record_event── Dispatcher
//! ```
//!
//! - The **handshake** inserts a session after a successful `connect` and
//!   removes it after an authorized `disconnect`.
//! - The **serving loop** releases sessions whose connection went away, but
//!   only while that connection still owns them.  Once a session has been
//!   disconnected and its id handed out again, the old connection has no
//!   claim on it.
//! - The **dispatcher** only reads liveness and bumps a per-session counter.
//!
//! The registry is owned by the serving loop and passed by `&mut` to whoever
//! needs it, so it never needs a lock.

use std::collections::HashMap;
use std::time::Instant;

use netput_core::{ConnectionId, SessionId};
use thiserror::Error;

/// Error type for registry mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A live session already uses this id.
    #[error("session {0} is already registered")]
    DuplicateSession(SessionId),
}

/// Book-keeping kept per live session.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub created_at: Instant,
    /// Where the session came from (peer address, `"local"`, ...).
    pub origin: String,
    /// Connection that opened the session.
    pub owner: ConnectionId,
    /// Number of envelopes dispatched on this session so far.
    pub events_dispatched: u64,
}

/// In-memory map of live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, SessionRecord>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateSession`] if `id` is already live;
    /// the existing record is left untouched.
    pub fn insert(
        &mut self,
        id: SessionId,
        origin: impl Into<String>,
        owner: ConnectionId,
    ) -> Result<(), RegistryError> {
        if self.sessions.contains_key(&id) {
            return Err(RegistryError::DuplicateSession(id));
        }
        self.sessions.insert(
            id,
            SessionRecord {
                created_at: Instant::now(),
                origin: origin.into(),
                owner,
                events_dispatched: 0,
            },
        );
        Ok(())
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn get(&self, id: &SessionId) -> Option<&SessionRecord> {
        self.sessions.get(id)
    }

    /// Removes a session, returning its record if it was live.
    pub fn remove(&mut self, id: &SessionId) -> Option<SessionRecord> {
        self.sessions.remove(id)
    }

    /// Removes a session on behalf of the connection `owner`.
    ///
    /// Returns `None` and leaves the registry untouched when the session is
    /// not live or belongs to another connection.
    pub fn release(&mut self, id: &SessionId, owner: ConnectionId) -> Option<SessionRecord> {
        match self.sessions.get(id) {
            Some(record) if record.owner == owner => self.sessions.remove(id),
            _ => None,
        }
    }

    /// Increments the dispatch counter of a live session.
    ///
    /// Returns `false` when the session is unknown.
    pub fn record_event(&mut self, id: &SessionId) -> bool {
        match self.sessions.get_mut(id) {
            Some(record) => {
                record.events_dispatched += 1;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Returns a sorted snapshot of the live session ids.
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }
}
