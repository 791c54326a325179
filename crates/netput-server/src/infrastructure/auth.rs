//! Stock password authenticator.
//!
//! Reads the credential blob as the JSON [`Credential`] shape shared with the
//! bundled client and accepts it when the password matches.  Per-usage
//! session ids can be pinned, so a health-check client always receives the
//! same well-known id.

use std::collections::HashMap;

use netput_core::protocol::credential::{Credential, Usage};
use netput_core::protocol::messages::ConnectRequest;
use netput_core::SessionId;
use tracing::debug;

use crate::application::handshake::{Authenticator, Grant};

pub const ERR_MISSING_CREDENTIAL: &str = "missing credential";
pub const ERR_INVALID_PASSWORD: &str = "invalid password";

/// Accepts credentials carrying the configured password.
#[derive(Debug, Clone)]
pub struct PasswordAuthenticator {
    password: String,
    pinned: HashMap<Usage, SessionId>,
}

impl PasswordAuthenticator {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            pinned: HashMap::new(),
        }
    }

    /// Hands out `session_id` to every accepted credential with this usage.
    ///
    /// Only one such session can be live at a time; a second connect with
    /// the same usage is refused until the first disconnects.
    pub fn with_pinned_session(mut self, usage: Usage, session_id: impl Into<SessionId>) -> Self {
        self.pinned.insert(usage, session_id.into());
        self
    }
}

impl Authenticator for PasswordAuthenticator {
    fn authenticate(&self, request: &ConnectRequest) -> Result<Grant, String> {
        let bytes = request
            .user_data
            .as_deref()
            .ok_or_else(|| ERR_MISSING_CREDENTIAL.to_string())?;
        let credential =
            Credential::decode(bytes).map_err(|e| format!("malformed credential: {e}"))?;

        if credential.password != self.password {
            debug!("rejecting {} credential: wrong password", credential.usage.name());
            return Err(ERR_INVALID_PASSWORD.to_string());
        }

        Ok(match self.pinned.get(&credential.usage) {
            Some(id) => Grant::Named(id.clone()),
            None => Grant::Fresh,
        })
    }
}
