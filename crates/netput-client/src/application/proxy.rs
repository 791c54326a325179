//! Client proxy: typed `send_*` calls over any [`ClientTransport`].
//!
//! # Usage (for beginners)
//!
//! ```text
//! let proxy = ClientProxy::new(transport, DeliveryMode::Acknowledged);
//! proxy.connect(&credential).await?;          // obtains the session id
//! proxy.send_keyboard(key_event).await?;      // tagged with that id
//! proxy.disconnect().await?;                  // forgets the id
//! ```
//!
//! The proxy owns the session id.  Every `send_*` call builds one envelope,
//! tags it with the current id, and pushes it.  Sending before `connect`
//! fails fast with [`ClientError::NotConnected`].
//!
//! # Delivery modes
//!
//! With [`DeliveryMode::Acknowledged`] a `send_*` call returns the server's
//! verdict.  With [`DeliveryMode::FireAndForget`] it returns once the envelope
//! has been handed to the transport; a transport failure is then reported to
//! the error callback set with [`ClientProxy::on_error`] (or logged when none
//! is set) and never returned from the `send_*` call.

use std::sync::Arc;

use netput_core::protocol::events::{
    EventInfo, KeyboardEvent, MouseButtonEvent, MouseMotionEvent, MouseWheelEvent, WindowEvent,
};
use netput_core::protocol::messages::{ConnectRequest, ConnectResponse, DisconnectRequest};
use netput_core::{ClientTransport, DeliveryMode, Event, SessionId, TransportError};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Errors returned by [`ClientProxy`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// No session has been established.
    #[error("not connected")]
    NotConnected,

    /// `connect` was called while a session is open.
    #[error("already connected as session {0}")]
    AlreadyConnected(SessionId),

    /// The server answered with an error.
    #[error("rejected by server: {0}")]
    Rejected(String),

    #[error(transparent)]
    Transport(TransportError),
}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Rejected(reason) => ClientError::Rejected(reason),
            other => ClientError::Transport(other),
        }
    }
}

/// Receives fire-and-forget failures.
///
/// The error's `Display` form is the plain failure message; callers that
/// only want a string use `error.to_string()`.
pub type ErrorCallback = Arc<dyn Fn(&ClientError) + Send + Sync>;

/// Caller-facing API of a netput client.
pub struct ClientProxy {
    transport: Arc<dyn ClientTransport>,
    mode: DeliveryMode,
    session: RwLock<Option<SessionId>>,
    on_error: Option<ErrorCallback>,
}

impl ClientProxy {
    pub fn new(transport: Arc<dyn ClientTransport>, mode: DeliveryMode) -> Self {
        Self {
            transport,
            mode,
            session: RwLock::new(None),
            on_error: None,
        }
    }

    /// Sets the callback for fire-and-forget failures.
    pub fn on_error(&mut self, callback: impl Fn(&ClientError) + Send + Sync + 'static) {
        self.on_error = Some(Arc::new(callback));
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.mode
    }

    pub async fn session_id(&self) -> Option<SessionId> {
        self.session.read().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.session.read().await.is_some()
    }

    // ── Handshake ─────────────────────────────────────────────────────────────

    /// Opens a session with `credential` as the `user_data` blob.
    ///
    /// An empty slice is sent as an empty blob, not as a missing field.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AlreadyConnected`] if a session is already open.
    /// - [`ClientError::Rejected`] if the server refused the credential.
    /// - [`ClientError::Transport`] if the call did not complete.
    pub async fn connect(&self, credential: &[u8]) -> Result<SessionId, ClientError> {
        self.open(ConnectRequest::with_credential(credential)).await
    }

    /// Opens a session without a `user_data` field.
    pub async fn connect_anonymous(&self) -> Result<SessionId, ClientError> {
        self.open(ConnectRequest::anonymous()).await
    }

    async fn open(&self, request: ConnectRequest) -> Result<SessionId, ClientError> {
        // Held across the call so concurrent connects cannot both succeed.
        let mut session = self.session.write().await;
        if let Some(id) = session.as_ref() {
            return Err(ClientError::AlreadyConnected(id.clone()));
        }

        match self.transport.connect(request).await? {
            ConnectResponse::SessionId(id) => {
                info!("connected as session {id}");
                *session = Some(id.clone());
                Ok(id)
            }
            ConnectResponse::Error(reason) => {
                info!("connect rejected: {reason}");
                Err(ClientError::Rejected(reason))
            }
        }
    }

    /// Closes the current session.
    ///
    /// The session id is forgotten only when the server accepts the
    /// disconnect.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotConnected`] if there is no session.
    /// - [`ClientError::Rejected`] if the server refused.
    /// - [`ClientError::Transport`] if the call did not complete.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        let mut session = self.session.write().await;
        let id = session.clone().ok_or(ClientError::NotConnected)?;

        let response = self.transport.disconnect(DisconnectRequest::new(id.clone())).await?;
        match response.error {
            None => {
                info!("session {id} closed");
                *session = None;
                Ok(())
            }
            Some(reason) => Err(ClientError::Rejected(reason)),
        }
    }

    // ── Typed sends ───────────────────────────────────────────────────────────

    pub async fn send_keyboard(&self, event: KeyboardEvent) -> Result<(), ClientError> {
        self.send(event.into()).await
    }

    pub async fn send_mouse_motion(&self, event: MouseMotionEvent) -> Result<(), ClientError> {
        self.send(event.into()).await
    }

    pub async fn send_mouse_button(&self, event: MouseButtonEvent) -> Result<(), ClientError> {
        self.send(event.into()).await
    }

    pub async fn send_mouse_wheel(&self, event: MouseWheelEvent) -> Result<(), ClientError> {
        self.send(event.into()).await
    }

    /// Sends a wheel event from whole steps; the precise deltas are the same
    /// values cast to `f32`.
    pub async fn send_mouse_wheel_steps(
        &self,
        timestamp: u64,
        window_id: u32,
        x: i32,
        y: i32,
    ) -> Result<(), ClientError> {
        self.send_mouse_wheel(MouseWheelEvent::from_steps(timestamp, window_id, x, y))
            .await
    }

    pub async fn send_window(&self, event: WindowEvent) -> Result<(), ClientError> {
        self.send(event.into()).await
    }

    async fn send(&self, info: EventInfo) -> Result<(), ClientError> {
        let session_id = self.session_id().await.ok_or(ClientError::NotConnected)?;
        let kind = info.kind();
        let event = Event::new(session_id, info);

        match self.mode {
            DeliveryMode::Acknowledged => {
                self.transport.push(event, self.mode).await?;
                Ok(())
            }
            DeliveryMode::FireAndForget => {
                if let Err(e) = self.transport.push(event, self.mode).await {
                    self.report(ClientError::from(e));
                } else {
                    debug!("submitted {kind} event");
                }
                Ok(())
            }
        }
    }

    fn report(&self, error: ClientError) {
        match &self.on_error {
            Some(callback) => callback(&error),
            None => warn!("fire-and-forget push failed: {error}"),
        }
    }
}

impl std::fmt::Debug for ClientProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientProxy")
            .field("mode", &self.mode)
            .field("has_error_callback", &self.on_error.is_some())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
