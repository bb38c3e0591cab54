use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::ChannelError;

#[async_trait]
pub trait ChannelTransport: Send + Sync + 'static {
    async fn connect(&self, url: &Url) -> Result<Box<dyn ChannelConnection>, ChannelError>;
}

/// One live connection. `recv` must be cancel-safe: it is raced against outbound work.
#[async_trait]
pub trait ChannelConnection: Send {
    async fn send(&mut self, frame: String) -> Result<(), ChannelError>;

    /// `None` once the peer has closed the connection. `Protocol` errors are per-frame.
    async fn recv(&mut self) -> Option<Result<String, ChannelError>>;

    async fn close(&mut self);
}

#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    connect_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl ChannelTransport for WebSocketTransport {
    async fn connect(&self, url: &Url) -> Result<Box<dyn ChannelConnection>, ChannelError> {
        let (stream, _response) = timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| ChannelError::Transport("websocket connect timeout".to_string()))?
            .map_err(|err| ChannelError::Transport(format!("websocket connect failed: {err}")))?;
        Ok(Box::new(WebSocketConnection { stream }))
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl ChannelConnection for WebSocketConnection {
    async fn send(&mut self, frame: String) -> Result<(), ChannelError> {
        self.stream
            .send(Message::Text(frame))
            .await
            .map_err(|err| ChannelError::Transport(format!("websocket send failed: {err}")))
    }

    async fn recv(&mut self) -> Option<Result<String, ChannelError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(err) => {
                    return Some(Err(ChannelError::Transport(format!(
                        "websocket receive failed: {err}"
                    ))))
                }
            };
            match message {
                Message::Text(text) => return Some(Ok(text)),
                Message::Binary(data) => {
                    return Some(String::from_utf8(data).map_err(|_| {
                        ChannelError::Protocol("binary frame is not utf-8".to_string())
                    }))
                }
                Message::Close(_) => return None,
                // ping/pong are answered by tungstenite
                _ => continue,
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
