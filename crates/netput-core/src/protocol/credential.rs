//! JSON credential blob carried in `ConnectRequest::user_data`.
//!
//! The wire protocol treats `user_data` as opaque bytes.  The stock password
//! authenticator and the bundled client agree on this small JSON shape:
//!
//! ```json
//! { "usage": 0, "password": "secret" }
//! ```
//!
//! `usage` lets one server hand out different session ids for different kinds
//! of client (a health-check "ping" client versus an input-forwarding one).

use serde::{Deserialize, Serialize};

/// What a connecting client intends to do with its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Usage {
    /// Liveness probe; connects and disconnects without sending input.
    #[default]
    Ping,
    /// Forwards input events.
    Input,
}

impl Usage {
    /// Stable lowercase name used in logs and session ids.
    pub fn name(self) -> &'static str {
        match self {
            Usage::Ping => "ping",
            Usage::Input => "input",
        }
    }
}

impl From<Usage> for u8 {
    fn from(usage: Usage) -> u8 {
        match usage {
            Usage::Ping => 0,
            Usage::Input => 1,
        }
    }
}

impl TryFrom<u8> for Usage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            0 => Ok(Usage::Ping),
            1 => Ok(Usage::Input),
            other => Err(format!("unknown usage: {other}")),
        }
    }
}

/// A password credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub usage: Usage,
    pub password: String,
}

impl Credential {
    pub fn new(usage: Usage, password: impl Into<String>) -> Self {
        Self {
            usage,
            password: password.into(),
        }
    }

    /// Serializes the credential to the JSON bytes sent in `user_data`.
    pub fn encode(&self) -> Vec<u8> {
        // Serializing a struct of a u8 and a String cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Parses `user_data` bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
