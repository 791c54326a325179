//! Serving loop and lifecycle.
//!
//! # How a call flows (for beginners)
//!
//! ```text
//!  TCP connection task ─┐
//!  TCP connection task ─┼──► mpsc queue ──► serving loop ──► Handshake / Dispatcher
//!  LocalTransport ──────┘                        ▲
//!                                                │ oneshot
//!                                         ShutdownHandle (any thread)
//! ```
//!
//! Adapters never touch the registry or the handlers.  They turn traffic into
//! [`InboundCall`]s and wait on the reply channel carried inside each call.
//! The serving loop owns the registry and processes calls strictly one at a
//! time, so handlers never run concurrently with each other.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──serve()──► Serving ──shutdown()──► ShuttingDown ──► Stopped
//! ```
//!
//! `Stopped` is terminal: a stopped server cannot be served again.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use netput_core::protocol::messages::{ConnectResponse, PushAck};
use netput_core::InboundCall;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::application::dispatch::{DispatchTable, Dispatcher, SessionPolicy};
use crate::application::handshake::{
    AllowAll, Authenticator, DisconnectAuthorizer, Handshake, RejectAll,
};
use crate::domain::registry::SessionRegistry;
use crate::infrastructure::network::{tcp, LocalTransport};

/// Depth of the queue between the adapters and the serving loop.
const CALL_QUEUE_DEPTH: usize = 256;

/// Error type for building and serving.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The server has already stopped; it cannot be served again.
    #[error("server has already stopped")]
    AlreadyStopped,

    /// `serve` was called while the server was already serving.
    #[error("server is already serving")]
    AlreadyServing,

    /// The TCP listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Runtime or listener setup failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the server is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Serving,
    ShuttingDown,
    Stopped,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Shutdown handle ───────────────────────────────────────────────────────────

struct ShutdownInner {
    signal: Mutex<Option<oneshot::Sender<()>>>,
    state: Mutex<LifecycleState>,
}

/// Stops a server from any thread.
///
/// The signal is a single-use `oneshot` channel: the first `shutdown()` sends
/// it, later calls find it already taken and do nothing.  A signal sent before
/// the loop starts is kept in the channel, so `serve()` then returns right
/// away.
#[derive(Clone)]
pub struct ShutdownHandle {
    inner: Arc<ShutdownInner>,
}

impl ShutdownHandle {
    fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let handle = Self {
            inner: Arc::new(ShutdownInner {
                signal: Mutex::new(Some(tx)),
                state: Mutex::new(LifecycleState::Idle),
            }),
        };
        (handle, rx)
    }

    /// Asks the serving loop to stop.  Safe to call any number of times.
    pub fn shutdown(&self) {
        let Some(signal) = lock(&self.inner.signal).take() else {
            debug!("shutdown already requested");
            return;
        };

        {
            let mut state = lock(&self.inner.state);
            if *state == LifecycleState::Serving {
                *state = LifecycleState::ShuttingDown;
            }
        }

        info!("shutdown requested");
        // Fails only if the loop is already gone.
        let _ = signal.send(());
    }

    /// Current lifecycle state of the server this handle belongs to.
    pub fn state(&self) -> LifecycleState {
        *lock(&self.inner.state)
    }

    fn set_state(&self, state: LifecycleState) {
        *lock(&self.inner.state) = state;
    }
}

impl std::fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("state", &self.state())
            .finish()
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Collects the collaborators and adapters of a [`Server`].
///
/// ```rust
/// use netput_server::application::dispatch::DispatchTable;
/// use netput_server::server::ServerBuilder;
///
/// let builder = ServerBuilder::new()
///     .dispatch_table(DispatchTable::builder().on_keyboard(|_, _| {}).build());
/// let transport = builder.local_transport();
/// let server = builder.build().unwrap();
/// # drop((transport, server));
/// ```
pub struct ServerBuilder {
    authenticator: Option<Box<dyn Authenticator>>,
    authorizer: Box<dyn DisconnectAuthorizer>,
    table: DispatchTable,
    policy: SessionPolicy,
    tcp_addr: Option<SocketAddr>,
    calls_tx: mpsc::Sender<InboundCall>,
    calls_rx: mpsc::Receiver<InboundCall>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        let (calls_tx, calls_rx) = mpsc::channel(CALL_QUEUE_DEPTH);
        Self {
            authenticator: None,
            authorizer: Box::new(AllowAll),
            table: DispatchTable::default(),
            policy: SessionPolicy::default(),
            tcp_addr: None,
            calls_tx,
            calls_rx,
        }
    }

    /// Sets the connect authenticator.  Without one, every connect is
    /// rejected.
    pub fn authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticator = Some(Box::new(authenticator));
        self
    }

    /// Sets the disconnect authorizer.  Defaults to allowing every live
    /// session to disconnect.
    pub fn disconnect_authorizer(mut self, authorizer: impl DisconnectAuthorizer + 'static) -> Self {
        self.authorizer = Box::new(authorizer);
        self
    }

    pub fn dispatch_table(mut self, table: DispatchTable) -> Self {
        self.table = table;
        self
    }

    pub fn session_policy(mut self, policy: SessionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Serves the framed TCP protocol on `addr`.  Port 0 picks a free port;
    /// see [`Server::local_addr`].
    pub fn with_tcp(mut self, addr: SocketAddr) -> Self {
        self.tcp_addr = Some(addr);
        self
    }

    /// An in-process transport feeding the server being built.
    pub fn local_transport(&self) -> LocalTransport {
        LocalTransport::new(self.calls_tx.clone())
    }

    /// Binds the listener (if any) and assembles the server.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Bind`] if the TCP address cannot be bound.
    pub fn build(self) -> Result<Server, ServeError> {
        let listener = match self.tcp_addr {
            Some(addr) => {
                let listener = std::net::TcpListener::bind(addr)
                    .map_err(|source| ServeError::Bind { addr, source })?;
                listener.set_nonblocking(true)?;
                Some(listener)
            }
            None => None,
        };
        let local_addr = listener.as_ref().map(|l| l.local_addr()).transpose()?;

        let authenticator = self.authenticator.unwrap_or_else(|| {
            warn!("no authenticator configured; every connect will be rejected");
            Box::new(RejectAll) as Box<dyn Authenticator>
        });
        let (shutdown, shutdown_rx) = ShutdownHandle::new();

        Ok(Server {
            handshake: Handshake::new(authenticator, self.authorizer),
            dispatcher: Dispatcher::new(self.table, self.policy),
            registry: SessionRegistry::new(),
            calls_tx: self.calls_tx,
            calls_rx: self.calls_rx,
            listener,
            local_addr,
            shutdown,
            shutdown_rx: Some(shutdown_rx),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ── Server ────────────────────────────────────────────────────────────────────

/// The serving loop together with the state it owns.
pub struct Server {
    handshake: Handshake,
    dispatcher: Dispatcher,
    registry: SessionRegistry,
    calls_tx: mpsc::Sender<InboundCall>,
    calls_rx: mpsc::Receiver<InboundCall>,
    listener: Option<std::net::TcpListener>,
    local_addr: Option<SocketAddr>,
    shutdown: ShutdownHandle,
    shutdown_rx: Option<oneshot::Receiver<()>>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// A handle that stops this server from any thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// An in-process transport feeding this server.
    pub fn local_transport(&self) -> LocalTransport {
        LocalTransport::new(self.calls_tx.clone())
    }

    /// The bound TCP address, if the TCP adapter is enabled.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Live sessions.  Not cleared when the server stops.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn state(&self) -> LifecycleState {
        self.shutdown.state()
    }

    /// Blocks the calling thread, running the serving loop on a
    /// single-threaded runtime until [`ShutdownHandle::shutdown`] is called.
    ///
    /// Must not be called from inside a tokio runtime; use [`Server::run`]
    /// there.
    ///
    /// # Errors
    ///
    /// - [`ServeError::AlreadyStopped`] if the server already stopped.
    /// - [`ServeError::AlreadyServing`] if it is serving.
    /// - [`ServeError::Io`] if the runtime cannot be created.
    pub fn serve(&mut self) -> Result<(), ServeError> {
        self.check_startable()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run())
    }

    /// Async form of [`Server::serve`].
    pub async fn run(&mut self) -> Result<(), ServeError> {
        self.check_startable()?;
        let Some(mut shutdown_rx) = self.shutdown_rx.take() else {
            return Err(ServeError::AlreadyStopped);
        };
        self.shutdown.set_state(LifecycleState::Serving);

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut adapters = JoinSet::new();
        if let Some(listener) = self.listener.take() {
            match tokio::net::TcpListener::from_std(listener) {
                Ok(listener) => {
                    if let Some(addr) = self.local_addr {
                        info!("listening on {addr}");
                    }
                    adapters.spawn(tcp::accept_loop(listener, self.calls_tx.clone(), stop_rx));
                }
                Err(e) => {
                    self.shutdown.set_state(LifecycleState::Stopped);
                    return Err(ServeError::Io(e));
                }
            }
        }

        info!("serving");
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => break,
                call = self.calls_rx.recv() => match call {
                    Some(call) => self.handle_call(call),
                    None => break,
                },
            }
        }

        self.shutdown.set_state(LifecycleState::ShuttingDown);
        self.stop(stop_tx, adapters).await;
        self.shutdown.set_state(LifecycleState::Stopped);
        let live = self.registry.ids();
        info!("stopped with {} live session(s)", live.len());
        if !live.is_empty() {
            debug!("sessions live at stop: {live:?}");
        }
        Ok(())
    }

    fn check_startable(&self) -> Result<(), ServeError> {
        match self.state() {
            LifecycleState::Stopped => Err(ServeError::AlreadyStopped),
            LifecycleState::Serving | LifecycleState::ShuttingDown => {
                Err(ServeError::AlreadyServing)
            }
            LifecycleState::Idle => Ok(()),
        }
    }

    /// Stops the adapters and refuses every call still queued.
    async fn stop(&mut self, stop_tx: watch::Sender<bool>, mut adapters: JoinSet<()>) {
        // No receiver is fine: there may be no adapters.
        let _ = stop_tx.send(true);
        self.calls_rx.close();

        // Drain before joining: a connection task may be waiting on the reply
        // of a queued call.  Dropping the call drops its reply sender, so the
        // caller sees the transport as closed.
        let mut refused = 0usize;
        while let Some(call) = self.calls_rx.recv().await {
            match call {
                InboundCall::Release { session_id, owner } => {
                    self.registry.release(&session_id, owner);
                }
                _ => refused += 1,
            }
        }
        if refused > 0 {
            debug!("refused {refused} queued call(s) at shutdown");
        }

        while let Some(result) = adapters.join_next().await {
            if let Err(e) = result {
                warn!("adapter task failed: {e}");
            }
        }
    }

    fn handle_call(&mut self, call: InboundCall) {
        debug!("handling {} call", call.label());

        match call {
            InboundCall::Connect {
                request,
                origin,
                owner,
                reply,
            } => {
                let response = self
                    .handshake
                    .connect(&request, &origin, owner, &mut self.registry);
                // A caller that never sees its session id cannot use it.
                if let Err(ConnectResponse::SessionId(id)) = reply.send(response) {
                    debug!("connect caller for session {id} went away; releasing");
                    self.registry.remove(&id);
                }
            }
            InboundCall::Push { event, reply } => {
                let result = self.dispatcher.dispatch(&event, &mut self.registry);
                match reply {
                    Some(reply) => {
                        let ack = match result {
                            Ok(_) => PushAck::ok(),
                            Err(e) => PushAck::error(e.to_string()),
                        };
                        let _ = reply.send(ack);
                    }
                    None => {
                        if let Err(e) = result {
                            warn!("dropped event from session {}: {e}", event.session_id);
                        }
                    }
                }
            }
            InboundCall::Disconnect { request, reply } => {
                let response = self.handshake.disconnect(&request, &mut self.registry);
                let _ = reply.send(response);
            }
            InboundCall::Release { session_id, owner } => {
                if self.registry.release(&session_id, owner).is_some() {
                    info!("session {session_id} released: {owner} closed");
                } else {
                    debug!("{owner} no longer owns session {session_id}");
                }
            }
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("dispatcher", &self.dispatcher)
            .field("sessions", &self.registry.len())
            .field("local_addr", &self.local_addr)
            .field("state", &self.state())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
