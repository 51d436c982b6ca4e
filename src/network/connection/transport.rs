//! Per-session event stream.

use crate::error::TransportError;
use async_trait::async_trait;
use chat_proto::Event;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

/// A bidirectional event stream to one client.
///
/// `recv` yields `Ok(None)` once the peer has closed the stream. A frame
/// that is not a valid event comes back as [`TransportError::Codec`]; the
/// stream is still usable afterwards.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, event: &Event) -> Result<(), TransportError>;

    async fn recv(&mut self) -> Result<Option<Event>, TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// JSON events over WebSocket text frames.
pub struct WsTransport<S> {
    stream: WebSocketStream<S>,
}

impl<S> WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: WebSocketStream<S>) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<S> Transport for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, event: &Event) -> Result<(), TransportError> {
        let bytes = chat_proto::encode(event)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Event>, TransportError> {
        loop {
            let Some(frame) = self.stream.next().await else {
                return Ok(None);
            };
            match frame? {
                Message::Text(text) => return Ok(Some(chat_proto::decode(text.as_bytes())?)),
                Message::Binary(data) => return Ok(Some(chat_proto::decode(&data)?)),
                Message::Close(_) => return Ok(None),
                // pings are answered inside tungstenite
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::sync::mpsc;

    /// In-memory transport: the test holds the client ends.
    pub struct MemoryTransport {
        inbound: mpsc::Receiver<Event>,
        outbound: mpsc::Sender<Event>,
        pub fail_writes: bool,
    }

    pub struct ClientEnd {
        pub tx: mpsc::Sender<Event>,
        pub rx: mpsc::Receiver<Event>,
    }

    pub fn pair() -> (MemoryTransport, ClientEnd) {
        let (client_tx, inbound) = mpsc::channel(64);
        let (outbound, client_rx) = mpsc::channel(64);
        (
            MemoryTransport {
                inbound,
                outbound,
                fail_writes: false,
            },
            ClientEnd {
                tx: client_tx,
                rx: client_rx,
            },
        )
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&mut self, event: &Event) -> Result<(), TransportError> {
            if self.fail_writes {
                return Err(TransportError::Closed);
            }
            self.outbound
                .send(event.clone())
                .await
                .map_err(|_| TransportError::Closed)
        }

        async fn recv(&mut self) -> Result<Option<Event>, TransportError> {
            Ok(self.inbound.recv().await)
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.inbound.close();
            Ok(())
        }
    }
}
