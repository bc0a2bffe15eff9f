//! WebSocket [`Connector`] over tokio-tungstenite.

use async_trait::async_trait;
use tracing::debug;

use crate::client::reconnect::Connector;
use crate::error::StreamError;
use crate::transport::{WireSink, WireStream, split_tungstenite};

/// Connects to a `ws://host:port/stream` URL.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<(WireSink, WireStream), StreamError> {
        let (ws, response) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        debug!(url = %self.url, status = %response.status(), "websocket handshake complete");
        Ok(split_tungstenite(ws))
    }
}
