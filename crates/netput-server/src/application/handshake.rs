//! Handshake use case: `connect` and `disconnect`.
//!
//! # Connect (for beginners)
//!
//! ```text
//! credential ──► Authenticator ──reject──► ConnectResponse::Error("...")
//!                     │
//!                   accept
//!                     ▼
//!              derive session id ──► registry.insert ──► ConnectResponse::SessionId
//! ```
//!
//! The decision to accept is delegated to an injected [`Authenticator`].
//! Nothing is written to the registry unless the authenticator accepts, and
//! the session is registered *before* the response is produced, so a client
//! that has seen its session id can use it right away.
//!
//! # Disconnect
//!
//! The session must be live, and the injected [`DisconnectAuthorizer`] must
//! agree.  When the authorizer refuses, the session stays registered.

use netput_core::protocol::messages::{
    ConnectRequest, ConnectResponse, DisconnectRequest, DisconnectResponse,
};
use netput_core::{ConnectionId, SessionId};
use tracing::{debug, info, warn};

use crate::domain::registry::SessionRegistry;

/// Returned when an authenticator rejects with an empty message.
pub const ERR_AUTH_REJECTED: &str = "authentication rejected";
/// Returned by [`RejectAll`].
pub const ERR_NO_AUTHENTICATOR: &str = "no authenticator configured";
pub const ERR_EMPTY_SESSION_ID: &str = "authenticator returned an empty session id";
pub const ERR_MISSING_SESSION_ID: &str = "missing session id";
pub const ERR_UNKNOWN_SESSION: &str = "unknown session";
pub const ERR_DISCONNECT_REJECTED: &str = "disconnect rejected";

// ── Collaborator traits ───────────────────────────────────────────────────────

/// How an accepted session gets its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// Generate a fresh random (UUID v4) id.
    Fresh,
    /// Use the id chosen by the authenticator.
    Named(SessionId),
}

/// Decides whether a connect request is accepted.
///
/// `request.user_data` is the raw credential blob: `None` when the field was
/// absent, `Some(&[])` for an empty blob.  Returning `Err(reason)` rejects the
/// connect with `reason` as the error string.
#[cfg_attr(test, mockall::automock)]
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, request: &ConnectRequest) -> Result<Grant, String>;
}

/// Decides whether a live session may disconnect.
#[cfg_attr(test, mockall::automock)]
pub trait DisconnectAuthorizer: Send + Sync {
    fn authorize(&self, session_id: &SessionId) -> bool;
}

/// Closures over the credential bytes work as authenticators.
impl<F> Authenticator for F
where
    F: Fn(Option<&[u8]>) -> Result<Grant, String> + Send + Sync,
{
    fn authenticate(&self, request: &ConnectRequest) -> Result<Grant, String> {
        self(request.user_data.as_deref())
    }
}

/// Closures over the session id work as disconnect authorizers.
impl<F> DisconnectAuthorizer for F
where
    F: Fn(&SessionId) -> bool + Send + Sync,
{
    fn authorize(&self, session_id: &SessionId) -> bool {
        self(session_id)
    }
}

/// Rejects every connect.  Used when no authenticator was configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAll;

impl Authenticator for RejectAll {
    fn authenticate(&self, _request: &ConnectRequest) -> Result<Grant, String> {
        Err(ERR_NO_AUTHENTICATOR.to_string())
    }
}

/// Allows every disconnect of a live session.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl DisconnectAuthorizer for AllowAll {
    fn authorize(&self, _session_id: &SessionId) -> bool {
        true
    }
}

// ── Use case ──────────────────────────────────────────────────────────────────

/// Connect/disconnect logic, independent of any transport.
pub struct Handshake {
    authenticator: Box<dyn Authenticator>,
    authorizer: Box<dyn DisconnectAuthorizer>,
}

impl Handshake {
    pub fn new(
        authenticator: Box<dyn Authenticator>,
        authorizer: Box<dyn DisconnectAuthorizer>,
    ) -> Self {
        Self {
            authenticator,
            authorizer,
        }
    }

    /// Runs the connect handshake.  An accepted session is owned by `owner`.
    ///
    /// Always produces a response; a rejection is a normal outcome, not an
    /// error of the server.
    pub fn connect(
        &self,
        request: &ConnectRequest,
        origin: &str,
        owner: ConnectionId,
        registry: &mut SessionRegistry,
    ) -> ConnectResponse {
        let grant = match self.authenticator.authenticate(request) {
            Ok(grant) => grant,
            Err(reason) => {
                let reason = if reason.is_empty() {
                    ERR_AUTH_REJECTED.to_string()
                } else {
                    reason
                };
                info!("connect from {origin} rejected: {reason}");
                return ConnectResponse::Error(reason);
            }
        };

        let session_id = match grant {
            Grant::Fresh => SessionId::generate(),
            Grant::Named(id) if id.is_empty() => {
                warn!("connect from {origin}: {ERR_EMPTY_SESSION_ID}");
                return ConnectResponse::Error(ERR_EMPTY_SESSION_ID.to_string());
            }
            Grant::Named(id) => id,
        };

        if let Err(e) = registry.insert(session_id.clone(), origin, owner) {
            warn!("connect from {origin} refused: {e}");
            return ConnectResponse::Error(e.to_string());
        }

        info!("session {session_id} opened from {origin}");
        ConnectResponse::SessionId(session_id)
    }

    /// Runs the disconnect handshake.
    pub fn disconnect(
        &self,
        request: &DisconnectRequest,
        registry: &mut SessionRegistry,
    ) -> DisconnectResponse {
        let Some(session_id) = request.session_id.as_ref() else {
            debug!("disconnect without a session id");
            return DisconnectResponse::error(ERR_MISSING_SESSION_ID);
        };

        if !registry.contains(session_id) {
            debug!("disconnect for unknown session {session_id}");
            return DisconnectResponse::error(ERR_UNKNOWN_SESSION);
        }

        if !self.authorizer.authorize(session_id) {
            info!("disconnect of session {session_id} refused by authorizer");
            return DisconnectResponse::error(ERR_DISCONNECT_REJECTED);
        }

        registry.remove(session_id);
        info!("session {session_id} closed");
        DisconnectResponse::ok()
    }
}

impl Default for Handshake {
    /// Rejects every connect and allows every disconnect.
    fn default() -> Self {
        Self::new(Box::new(RejectAll), Box::new(AllowAll))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
