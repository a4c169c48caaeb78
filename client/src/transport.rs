//! Duplex text-frame transport seam and its WebSocket implementation

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::debug;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket failure: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("link closed")]
    Closed,
}

/// One established duplex link carrying text frames. `recv` returning `None`
/// means the peer is gone; errors carry transient receive trouble and do not
/// imply the link is dead.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;
    async fn close(&mut self);
}

/// Dials an address and hands back an established transport.
#[async_trait]
pub trait Connector: Send {
    async fn connect(&mut self, address: &str) -> Result<Box<dyn Transport>, TransportError>;
}

pub struct WsTransport {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.ws.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        while let Some(frame) = self.ws.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(_)) => return None,
                // Pings are answered by tungstenite itself; binary frames
                // are not part of this protocol.
                Ok(other) => debug!("skipping non-text frame: {:?}", other),
                Err(err) => return Some(Err(err.into())),
            }
        }
        None
    }

    async fn close(&mut self) {
        if let Err(err) = self.ws.close(None).await {
            debug!("websocket close failed: {}", err);
        }
    }
}

pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&mut self, address: &str) -> Result<Box<dyn Transport>, TransportError> {
        let (ws, _response) = connect_async(address).await?;
        Ok(Box::new(WsTransport { ws }))
    }
}
