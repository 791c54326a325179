//! In-process transport: hands calls straight to the serving loop's queue.
//!
//! No bytes are encoded; the typed messages travel through `tokio` channels.
//! Obtain one with [`ServerBuilder::local_transport`](crate::server::ServerBuilder::local_transport).

use async_trait::async_trait;
use netput_core::protocol::messages::{
    ConnectRequest, ConnectResponse, DisconnectRequest, DisconnectResponse,
};
use netput_core::{ClientTransport, ConnectionId, DeliveryMode, Event, InboundCall, TransportError};
use tokio::sync::{mpsc, oneshot};

/// Origin string recorded for sessions opened through this transport.
pub const LOCAL_ORIGIN: &str = "local";

/// A [`ClientTransport`] connected directly to a serving loop.
///
/// Each transport counts as one connection; clones share it.  Local
/// connections never close, so their sessions end only by disconnect.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    calls: mpsc::Sender<InboundCall>,
    connection: ConnectionId,
}

impl LocalTransport {
    pub(crate) fn new(calls: mpsc::Sender<InboundCall>) -> Self {
        Self {
            calls,
            connection: ConnectionId::next(),
        }
    }

    /// The connection that owns sessions opened through this transport.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection
    }

    async fn submit(&self, call: InboundCall) -> Result<(), TransportError> {
        self.calls.send(call).await.map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl ClientTransport for LocalTransport {
    async fn connect(&self, request: ConnectRequest) -> Result<ConnectResponse, TransportError> {
        let (reply, response) = oneshot::channel();
        self.submit(InboundCall::Connect {
            request,
            origin: LOCAL_ORIGIN.to_string(),
            owner: self.connection,
            reply,
        })
        .await?;
        response.await.map_err(|_| TransportError::Closed)
    }

    async fn push(&self, event: Event, mode: DeliveryMode) -> Result<(), TransportError> {
        match mode {
            DeliveryMode::FireAndForget => {
                self.submit(InboundCall::Push { event, reply: None }).await
            }
            DeliveryMode::Acknowledged => {
                let (reply, ack) = oneshot::channel();
                self.submit(InboundCall::Push {
                    event,
                    reply: Some(reply),
                })
                .await?;
                match ack.await.map_err(|_| TransportError::Closed)?.error {
                    None => Ok(()),
                    Some(reason) => Err(TransportError::Rejected(reason)),
                }
            }
        }
    }

    async fn disconnect(
        &self,
        request: DisconnectRequest,
    ) -> Result<DisconnectResponse, TransportError> {
        let (reply, response) = oneshot::channel();
        self.submit(InboundCall::Disconnect { request, reply }).await?;
        response.await.map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netput_core::protocol::messages::PushAck;
    use netput_core::protocol::events::MouseWheelEvent;
    use netput_core::SessionId;

    fn wheel_event() -> Event {
        Event::new(SessionId::from("s"), MouseWheelEvent::from_steps(0, 0, 0, 1))
    }

    #[tokio::test]
    async fn test_connect_forwards_request_with_local_origin() {
        // Arrange – a fake serving loop answering one call
        let (tx, mut rx) = mpsc::channel(4);
        let transport = LocalTransport::new(tx);
        let connection = transport.connection_id();
        let server = tokio::spawn(async move {
            match rx.recv().await {
                Some(InboundCall::Connect { origin, owner, reply, .. }) => {
                    assert_eq!(origin, LOCAL_ORIGIN);
                    assert_eq!(owner, connection);
                    let _ = reply.send(ConnectResponse::SessionId(SessionId::from("abc")));
                }
                other => panic!("unexpected call {other:?}"),
            }
        });

        // Act
        let response = transport.connect(ConnectRequest::anonymous()).await.unwrap();

        // Assert
        assert_eq!(response, ConnectResponse::SessionId(SessionId::from("abc")));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_acknowledged_push_surfaces_server_error() {
        let (tx, mut rx) = mpsc::channel(4);
        let transport = LocalTransport::new(tx);
        tokio::spawn(async move {
            if let Some(InboundCall::Push { reply: Some(reply), .. }) = rx.recv().await {
                let _ = reply.send(PushAck::error("no handler for mouse-wheel events"));
            }
        });

        let result = transport.push(wheel_event(), DeliveryMode::Acknowledged).await;

        assert!(matches!(result, Err(TransportError::Rejected(r)) if r.contains("mouse-wheel")));
    }

    #[tokio::test]
    async fn test_fire_and_forget_push_carries_no_reply_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let transport = LocalTransport::new(tx);

        tokio_test::assert_ok!(transport.push(wheel_event(), DeliveryMode::FireAndForget).await);

        assert!(matches!(rx.recv().await, Some(InboundCall::Push { reply: None, .. })));
    }

    #[tokio::test]
    async fn test_calls_fail_with_closed_when_loop_is_gone() {
        // Arrange – receiver dropped
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let transport = LocalTransport::new(tx);

        // Act
        let result = transport.disconnect(DisconnectRequest::default()).await;

        // Assert
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_dropped_reply_maps_to_closed() {
        let (tx, mut rx) = mpsc::channel(4);
        let transport = LocalTransport::new(tx);
        tokio::spawn(async move {
            // Receive and drop the call without answering.
            let _ = rx.recv().await;
        });

        let result = transport.connect(ConnectRequest::anonymous()).await;

        assert!(matches!(result, Err(TransportError::Closed)));
    }
}
