//! TCP server adapter: accept loop and per-connection frame handling.
//!
//! This module is responsible for:
//!
//! 1. Accepting connections on a listener bound by the server builder.
//! 2. Reading a byte stream per connection and cutting it into frames with
//!    [`decode_frame`].
//! 3. Turning each request frame into an [`InboundCall`] for the serving loop
//!    and writing the reply back with the request's call id.
//! 4. Releasing every session opened on a connection when that connection
//!    closes (transport loss).
//! 5. Stopping when the serving loop broadcasts shutdown on the `watch`
//!    channel.
//!
//! # Requests on one connection
//!
//! Frames from one connection are handled in the order they arrive; the
//! reader waits for the serving loop's reply before reading the next frame.
//! Fire-and-forget pushes do not wait.  Different connections run in
//! different tasks and never wait on each other.

use std::collections::HashSet;
use std::net::SocketAddr;

use netput_core::protocol::codec::{decode_frame, decode_header, encode_frame, ProtocolError};
use netput_core::protocol::messages::{
    ConnectResponse, DisconnectResponse, Frame, MessageType, PushAck, RpcMessage,
    FLAG_ACK_REQUESTED, HEADER_SIZE,
};
use netput_core::{ConnectionId, InboundCall, SessionId};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

const READ_CHUNK: usize = 4096;

// ── Accept loop ───────────────────────────────────────────────────────────────

/// Accepts connections until `stop` flips, then waits for every connection
/// task to finish.
pub(crate) async fn accept_loop(
    listener: TcpListener,
    calls: mpsc::Sender<InboundCall>,
    mut stop: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    info!("new connection from {peer}");
                    connections.spawn(handle_connection(stream, peer, calls.clone(), stop.clone()));
                }
                // Transient accept errors (e.g. too many open files) must not
                // take the whole server down.
                Err(e) => error!("accept error: {e}"),
            },
            // Reap finished connection tasks so the set does not grow.
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    debug!("accept loop stopping; waiting for {} connection(s)", connections.len());
    while connections.join_next().await.is_some() {}
}

// ── Per-connection handler ────────────────────────────────────────────────────

/// Wraps [`Connection::run`], logs the outcome, then releases the sessions the
/// connection owned.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    calls: mpsc::Sender<InboundCall>,
    stop: watch::Receiver<bool>,
) {
    let mut conn = Connection {
        id: ConnectionId::next(),
        stream,
        peer,
        calls,
        sessions: HashSet::new(),
    };

    match conn.run(stop).await {
        Ok(()) => info!("connection {peer} closed"),
        Err(e) => warn!("connection {peer} closed with error: {e}"),
    }

    let owner = conn.id;
    for session_id in conn.sessions.drain() {
        debug!("releasing session {session_id} of {peer}");
        // The loop may already be gone during shutdown.
        let _ = conn
            .calls
            .send(InboundCall::Release { session_id, owner })
            .await;
    }
}

/// Why a connection stopped abnormally.
#[derive(Debug, thiserror::Error)]
enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unrecoverable framing error: {0}")]
    Framing(ProtocolError),
    #[error("serving loop is gone")]
    LoopGone,
}

struct Connection {
    id: ConnectionId,
    stream: TcpStream,
    peer: SocketAddr,
    calls: mpsc::Sender<InboundCall>,
    /// Sessions opened over this connection and not yet disconnected.
    sessions: HashSet<SessionId>,
}

impl Connection {
    async fn run(&mut self, mut stop: watch::Receiver<bool>) -> Result<(), ConnectionError> {
        let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            self.drain_frames(&mut buf).await?;

            tokio::select! {
                _ = stop.changed() => return Ok(()),
                read = self.stream.read(&mut chunk) => match read? {
                    0 => return Ok(()),
                    n => buf.extend_from_slice(&chunk[..n]),
                },
            }
        }
    }

    /// Handles every complete frame at the front of `buf`.
    async fn drain_frames(&mut self, buf: &mut Vec<u8>) -> Result<(), ConnectionError> {
        loop {
            match decode_frame(buf) {
                Ok((frame, consumed)) => {
                    buf.drain(..consumed);
                    self.handle_frame(frame).await?;
                }
                Err(ProtocolError::InsufficientData { .. }) => return Ok(()),
                Err(e) => self.handle_malformed(buf, e).await?,
            }
        }
    }

    /// Answers a frame whose header is readable but whose payload is not.
    ///
    /// If even the header is bad the stream cannot be re-synchronised and the
    /// connection is closed.
    async fn handle_malformed(
        &mut self,
        buf: &mut Vec<u8>,
        err: ProtocolError,
    ) -> Result<(), ConnectionError> {
        let header = decode_header(buf).map_err(|_| ConnectionError::Framing(err.clone()))?;
        warn!("malformed {:?} frame from {}: {err}", header.message_type, self.peer);
        buf.drain(..HEADER_SIZE + header.payload_len);

        let reason = format!("malformed request: {err}");
        let reply = match header.message_type {
            MessageType::ConnectRequest => Some(RpcMessage::ConnectResponse(ConnectResponse::Error(reason))),
            MessageType::DisconnectRequest => {
                Some(RpcMessage::DisconnectResponse(DisconnectResponse::error(reason)))
            }
            MessageType::Push if header.flags & FLAG_ACK_REQUESTED != 0 => {
                Some(RpcMessage::PushAck(PushAck::error(reason)))
            }
            _ => None,
        };
        if let Some(message) = reply {
            self.write(Frame::new(header.call_id, message)).await?;
        }
        Ok(())
    }

    async fn handle_frame(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        let call_id = frame.call_id;
        let ack = frame.ack_requested();

        match frame.message {
            RpcMessage::ConnectRequest(request) => {
                let (reply, response) = oneshot::channel();
                self.submit(InboundCall::Connect {
                    request,
                    origin: self.peer.to_string(),
                    owner: self.id,
                    reply,
                })
                .await?;
                let response = response.await.map_err(|_| ConnectionError::LoopGone)?;
                if let ConnectResponse::SessionId(id) = &response {
                    self.sessions.insert(id.clone());
                }
                self.write(Frame::new(call_id, RpcMessage::ConnectResponse(response)))
                    .await
            }
            RpcMessage::Push(event) if ack => {
                let (reply, ack) = oneshot::channel();
                self.submit(InboundCall::Push {
                    event,
                    reply: Some(reply),
                })
                .await?;
                let ack = ack.await.map_err(|_| ConnectionError::LoopGone)?;
                self.write(Frame::new(call_id, RpcMessage::PushAck(ack))).await
            }
            RpcMessage::Push(event) => self.submit(InboundCall::Push { event, reply: None }).await,
            RpcMessage::DisconnectRequest(request) => {
                let session_id = request.session_id.clone();
                let (reply, response) = oneshot::channel();
                self.submit(InboundCall::Disconnect { request, reply }).await?;
                let response = response.await.map_err(|_| ConnectionError::LoopGone)?;
                if let (true, Some(id)) = (response.is_ok(), session_id) {
                    self.sessions.remove(&id);
                }
                self.write(Frame::new(call_id, RpcMessage::DisconnectResponse(response)))
                    .await
            }
            other => {
                warn!(
                    "ignoring unexpected {:?} frame from {}",
                    other.message_type(),
                    self.peer
                );
                Ok(())
            }
        }
    }

    async fn submit(&self, call: InboundCall) -> Result<(), ConnectionError> {
        self.calls.send(call).await.map_err(|_| ConnectionError::LoopGone)
    }

    async fn write(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        match encode_frame(&frame) {
            Ok(bytes) => self.stream.write_all(&bytes).await.map_err(ConnectionError::from),
            Err(e) => {
                // Only over-long strings can fail to encode; the caller sees
                // no reply for this call id.
                error!("failed to encode reply for call {}: {e}", frame.call_id);
                Ok(())
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
