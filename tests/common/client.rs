//! Test WebSocket client.
//!
//! Speaks JSON events over a WebSocket and asserts on what comes back.

use chat_proto::{Event, EventType};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// A test chat client.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let (ws, _) = connect_async(url).await?;
        Ok(Self { ws })
    }

    pub async fn send(&mut self, event: &Event) -> anyhow::Result<()> {
        let text = serde_json::to_string(event)?;
        self.ws.send(Message::Text(text)).await?;
        Ok(())
    }

    pub async fn auth(&mut self, id: &str, platform: &str, start: i64) -> anyhow::Result<()> {
        let body = serde_json::json!({ "id": id, "password": "", "platform": platform, "start": start });
        self.send(&Event::new(EventType::Auth, "", "", body.to_string()))
            .await
    }

    /// Receive the next event of any type. `None` once the server closed.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Option<Event>> {
        loop {
            let frame = timeout(dur, self.ws.next()).await?;
            match frame {
                None => return Ok(None),
                Some(Err(_)) => return Ok(None),
                Some(Ok(Message::Text(text))) => return Ok(Some(serde_json::from_str(&text)?)),
                Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(_)) => continue,
            }
        }
    }

    /// Receive the next event that is not a heartbeat.
    pub async fn recv(&mut self) -> anyhow::Result<Event> {
        loop {
            match self.recv_timeout(Duration::from_secs(5)).await? {
                Some(event) if event.kind == EventType::Heartbeat => continue,
                Some(event) => return Ok(event),
                None => anyhow::bail!("stream closed"),
            }
        }
    }

    /// Receive until an event of `kind` arrives, skipping everything else.
    pub async fn recv_kind(&mut self, kind: EventType) -> anyhow::Result<Event> {
        loop {
            let event = self.recv().await?;
            if event.kind == kind {
                return Ok(event);
            }
        }
    }

    /// Wait for the server to end the stream within `within`.
    pub async fn expect_closed(&mut self, within: Duration) -> anyhow::Result<()> {
        let deadline = Instant::now() + within;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.recv_timeout(left).await {
                Ok(None) => return Ok(()),
                Ok(Some(_)) => continue,
                Err(_) => anyhow::bail!("stream still open after {:?}", within),
            }
        }
    }

    /// Collect everything but heartbeats for `dur`.
    pub async fn drain(&mut self, dur: Duration) -> Vec<Event> {
        let deadline = Instant::now() + dur;
        let mut events = Vec::new();
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.recv_timeout(left).await {
                Ok(Some(event)) if event.kind != EventType::Heartbeat => events.push(event),
                Ok(Some(_)) => continue,
                _ => return events,
            }
        }
    }

    pub async fn close(mut self) -> anyhow::Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}
