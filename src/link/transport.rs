//! Trait abstraction for socket transports to enable testing

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{Result, RoverLinkError};

/// One established text-message connection
#[async_trait]
pub trait Link: Send {
    /// Write one text payload
    async fn send(&mut self, text: String) -> Result<()>;

    /// Wait for the next inbound text payload
    ///
    /// Returns `None` when the peer closed the connection. Must be cancel
    /// safe: the connection task races it against outbound sends.
    async fn recv(&mut self) -> Option<Result<String>>;

    /// Close the connection gracefully
    async fn close(&mut self);
}

/// Factory for [`Link`]s, one per connection attempt
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `url`
    async fn connect(&self, url: &str) -> Result<Box<dyn Link>>;
}

/// WebSocket client transport
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Link>> {
        let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
        Ok(Box::new(WsLink { stream }))
    }
}

/// Wrapper around a tokio-tungstenite stream that implements [`Link`]
pub struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Link for WsLink {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(data)) => {
                    debug!("Ignoring binary message ({} bytes)", data.len());
                }
                Ok(Message::Close(frame)) => {
                    debug!("Peer sent close frame: {:?}", frame);
                    return None;
                }
                // Ping/pong are answered by tungstenite
                Ok(_) => {}
                Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed) => return None,
                Err(e) => return Some(Err(RoverLinkError::WebSocket(e))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("Error while closing WebSocket: {}", e);
        }
    }
}
