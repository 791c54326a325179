//! TCP client transport.
//!
//! Architecture:
//! - `TcpClientTransport` owns the write half of one TCP connection behind an
//!   async mutex, so concurrent calls never interleave their frames.
//! - A reader task owns the read half.  It decodes each response frame and
//!   wakes the waiting call through the pending table (call id → `oneshot`).
//! - When the connection ends, the reader marks the transport closed and drops
//!   every pending sender, so waiting calls fail with
//!   [`TransportError::Closed`].
//!
//! There are no retries here; the first failure is returned to the caller.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use netput_core::protocol::codec::{decode_frame, decode_header, encode_frame};
use netput_core::protocol::messages::{
    ConnectRequest, ConnectResponse, DisconnectRequest, DisconnectResponse, Frame, RpcMessage,
    HEADER_SIZE,
};
use netput_core::protocol::CallIdCounter;
use netput_core::{ClientTransport, DeliveryMode, Event, TransportError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Default)]
struct Pending {
    /// Set by the reader when the connection ends; no call is registered after.
    closed: bool,
    waiting: HashMap<u64, oneshot::Sender<RpcMessage>>,
}

type SharedPending = Arc<Mutex<Pending>>;

fn lock(pending: &Mutex<Pending>) -> MutexGuard<'_, Pending> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A [`ClientTransport`] speaking the framed netput protocol over TCP.
pub struct TcpClientTransport {
    peer: SocketAddr,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    pending: SharedPending,
    call_ids: CallIdCounter,
    timeout: Option<Duration>,
    reader: JoinHandle<()>,
}

impl TcpClientTransport {
    /// Opens a connection to `addr`.
    ///
    /// `timeout` bounds the TCP connect and every later request/response
    /// round trip.  `None` waits indefinitely.
    ///
    /// # Errors
    ///
    /// - [`TransportError::ConnectFailed`] if the server cannot be reached.
    /// - [`TransportError::Timeout`] if the connect does not finish in time.
    pub async fn connect(addr: SocketAddr, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let connecting = TcpStream::connect(addr);
        let stream = match timeout {
            Some(limit) => tokio::time::timeout(limit, connecting)
                .await
                .map_err(|_| TransportError::Timeout)?,
            None => connecting.await,
        }
        .map_err(|e| TransportError::ConnectFailed(format!("{addr}: {e}")))?;

        stream.set_nodelay(true)?;
        info!("connected to {addr}");

        let (read_half, write_half) = stream.into_split();
        let pending = SharedPending::default();
        let reader = tokio::spawn(read_loop(read_half, addr, Arc::clone(&pending)));

        Ok(Self {
            peer: addr,
            writer: tokio::sync::Mutex::new(write_half),
            pending,
            call_ids: CallIdCounter::new(),
            timeout,
            reader,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// `true` once the reader has seen the connection end.
    pub fn is_closed(&self) -> bool {
        lock(&self.pending).closed
    }

    async fn write(&self, frame: &Frame) -> Result<(), TransportError> {
        let bytes = encode_frame(frame)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await?;
        Ok(())
    }

    /// Sends `frame` and waits for the response carrying its call id.
    async fn call(&self, frame: Frame) -> Result<RpcMessage, TransportError> {
        let call_id = frame.call_id;
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = lock(&self.pending);
            if pending.closed {
                return Err(TransportError::Closed);
            }
            pending.waiting.insert(call_id, tx);
        }

        if let Err(e) = self.write(&frame).await {
            lock(&self.pending).waiting.remove(&call_id);
            return Err(e);
        }

        let reply = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    lock(&self.pending).waiting.remove(&call_id);
                    return Err(TransportError::Timeout);
                }
            },
            None => rx.await,
        };
        reply.map_err(|_| TransportError::Closed)
    }
}

impl Drop for TcpClientTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl std::fmt::Debug for TcpClientTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpClientTransport")
            .field("peer", &self.peer)
            .field("timeout", &self.timeout)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl ClientTransport for TcpClientTransport {
    async fn connect(&self, request: ConnectRequest) -> Result<ConnectResponse, TransportError> {
        let frame = Frame::new(self.call_ids.next(), RpcMessage::ConnectRequest(request));
        match self.call(frame).await? {
            RpcMessage::ConnectResponse(response) => Ok(response),
            other => Err(TransportError::UnexpectedReply(other.message_type())),
        }
    }

    async fn push(&self, event: Event, mode: DeliveryMode) -> Result<(), TransportError> {
        let call_id = self.call_ids.next();
        match mode {
            DeliveryMode::FireAndForget => {
                if self.is_closed() {
                    return Err(TransportError::Closed);
                }
                self.write(&Frame::push(call_id, event, false)).await
            }
            DeliveryMode::Acknowledged => match self.call(Frame::push(call_id, event, true)).await? {
                RpcMessage::PushAck(ack) => match ack.error {
                    None => Ok(()),
                    Some(reason) => Err(TransportError::Rejected(reason)),
                },
                other => Err(TransportError::UnexpectedReply(other.message_type())),
            },
        }
    }

    async fn disconnect(
        &self,
        request: DisconnectRequest,
    ) -> Result<DisconnectResponse, TransportError> {
        let frame = Frame::new(self.call_ids.next(), RpcMessage::DisconnectRequest(request));
        match self.call(frame).await? {
            RpcMessage::DisconnectResponse(response) => Ok(response),
            other => Err(TransportError::UnexpectedReply(other.message_type())),
        }
    }
}

// ── Reader task ───────────────────────────────────────────────────────────────

/// Reads response frames until the connection ends, then fails every call
/// still waiting.
async fn read_loop(mut reader: OwnedReadHalf, peer: SocketAddr, pending: SharedPending) {
    loop {
        let mut frame_buf = vec![0u8; HEADER_SIZE];
        if let Err(e) = reader.read_exact(&mut frame_buf).await {
            if e.kind() != std::io::ErrorKind::UnexpectedEof {
                warn!("read error from {peer}: {e}");
            }
            break;
        }

        let header = match decode_header(&frame_buf) {
            Ok(header) => header,
            Err(e) => {
                warn!("bad frame header from {peer}: {e}");
                break;
            }
        };

        frame_buf.resize(HEADER_SIZE + header.payload_len, 0);
        if let Err(e) = reader.read_exact(&mut frame_buf[HEADER_SIZE..]).await {
            warn!("read payload error from {peer}: {e}");
            break;
        }

        let message = match decode_frame(&frame_buf) {
            Ok((frame, _)) => frame.message,
            Err(e) => {
                // The frame boundary is known, so the stream stays usable.
                // Dropping the waiter fails its call with `Closed`.
                warn!("undecodable reply {} from {peer}: {e}", header.call_id);
                lock(&pending).waiting.remove(&header.call_id);
                continue;
            }
        };

        match lock(&pending).waiting.remove(&header.call_id) {
            Some(waiter) => {
                let _ = waiter.send(message);
            }
            None => debug!("reply {} from {peer} has no waiting call", header.call_id),
        }
    }

    info!("connection to {peer} closed");
    let mut pending = lock(&pending);
    pending.closed = true;
    pending.waiting.clear();
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use netput_core::protocol::events::{InputState, KeyboardEvent};
    use netput_core::protocol::messages::PushAck;
    use netput_core::{ProtocolError, SessionId};
    use tokio::net::TcpListener;

    async fn read_frame(stream: &mut TcpStream) -> Option<Frame> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 512];
        loop {
            match decode_frame(&buf) {
                Ok((frame, _)) => return Some(frame),
                Err(ProtocolError::InsufficientData { .. }) => {}
                Err(e) => panic!("bad frame: {e}"),
            }
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    async fn reply(stream: &mut TcpStream, frame: Frame) {
        stream.write_all(&encode_frame(&frame).unwrap()).await.unwrap();
    }

    fn key_event() -> Event {
        Event::new(
            SessionId::from("s"),
            KeyboardEvent {
                timestamp: 1,
                window_id: 2,
                state: InputState::Pressed,
                repeat: false,
                key_code: 30,
            },
        )
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        // Arrange – grab a free port, then release it
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        // Act
        let result = TcpClientTransport::connect(addr, Some(Duration::from_secs(5))).await;

        // Assert
        assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
    }

    #[tokio::test]
    async fn test_connect_response_is_matched_by_call_id() {
        // Arrange – a fake server that answers one connect
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_frame(&mut stream).await.unwrap();
            assert!(matches!(request.message, RpcMessage::ConnectRequest(_)));
            let response = ConnectResponse::SessionId(SessionId::from("abc"));
            reply(&mut stream, Frame::new(request.call_id, RpcMessage::ConnectResponse(response))).await;
        });
        let transport = TcpClientTransport::connect(addr, None).await.unwrap();

        // Act
        let response = transport.connect(ConnectRequest::anonymous()).await.unwrap();

        // Assert
        assert_eq!(response, ConnectResponse::SessionId(SessionId::from("abc")));
    }

    #[tokio::test]
    async fn test_acknowledged_push_maps_error_ack_to_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_frame(&mut stream).await.unwrap();
            assert!(request.ack_requested());
            reply(&mut stream, Frame::new(request.call_id, RpcMessage::PushAck(PushAck::error("unknown session: s")))).await;
        });
        let transport = TcpClientTransport::connect(addr, None).await.unwrap();

        let result = transport.push(key_event(), DeliveryMode::Acknowledged).await;

        assert!(matches!(result, Err(TransportError::Rejected(r)) if r == "unknown session: s"));
    }

    #[tokio::test]
    async fn test_fire_and_forget_push_does_not_wait_for_reply() {
        // Arrange – a server that reads but never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, seen_rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let frame = read_frame(&mut stream).await.unwrap();
            let _ = seen_tx.send(frame.ack_requested());
            let _ = read_frame(&mut stream).await;
        });
        let transport = TcpClientTransport::connect(addr, Some(Duration::from_secs(5))).await.unwrap();

        // Act
        transport.push(key_event(), DeliveryMode::FireAndForget).await.unwrap();

        // Assert
        assert!(!seen_rx.await.unwrap());
    }

    #[tokio::test]
    async fn test_pending_call_fails_with_closed_when_server_hangs_up() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = read_frame(&mut stream).await;
            // Dropping the stream closes the connection without a reply.
        });
        let transport = TcpClientTransport::connect(addr, None).await.unwrap();

        let result = transport.connect(ConnectRequest::anonymous()).await;

        assert!(matches!(result, Err(TransportError::Closed)));
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_silent_server_yields_timeout() {
        // Arrange – keep the server-side stream open but never answer
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            while read_frame(&mut stream).await.is_some() {}
        });
        let transport = TcpClientTransport::connect(addr, Some(Duration::from_millis(100)))
            .await
            .unwrap();

        // Act
        let result = transport.disconnect(DisconnectRequest::new(SessionId::from("s"))).await;

        // Assert
        assert!(matches!(result, Err(TransportError::Timeout)));
    }

    #[tokio::test]
    async fn test_wrong_reply_type_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_frame(&mut stream).await.unwrap();
            reply(&mut stream, Frame::new(request.call_id, RpcMessage::PushAck(PushAck::ok()))).await;
        });
        let transport = TcpClientTransport::connect(addr, None).await.unwrap();

        let result = transport.connect(ConnectRequest::anonymous()).await;

        assert!(matches!(result, Err(TransportError::UnexpectedReply(_))));
    }
}
