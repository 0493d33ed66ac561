//! WebSocket client for connecting to a ComfyUI instance.
//!
//! [`ComfyUIClient`] holds the connection configuration and the
//! process-wide client id. Call [`ComfyUIClient::connect`] to establish a
//! live [`ComfyUIConnection`] over WebSocket.

use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Raw WebSocket stream to a ComfyUI server.
pub type ComfyUIStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for a ComfyUI instance.
///
/// The client id is generated once per client and reused for every
/// connection, so status messages for jobs submitted with that id are
/// routed back to this process.
pub struct ComfyUIClient {
    ws_url: String,
    client_id: String,
}

/// A live WebSocket connection to a ComfyUI instance.
pub struct ComfyUIConnection {
    /// Client ID sent during the WebSocket handshake.
    pub client_id: String,
    /// The raw WebSocket stream for reading/writing frames.
    pub ws_stream: ComfyUIStream,
}

impl ComfyUIClient {
    /// Create a new client with a fresh UUID v4 client id.
    ///
    /// * `ws_url` - WebSocket base URL, e.g. `ws://host:8188`.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self::with_client_id(ws_url, uuid::Uuid::new_v4().to_string())
    }

    /// Create a client with an explicit client id.
    pub fn with_client_id(ws_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
        }
    }

    /// WebSocket base URL (e.g. `ws://host:8188`).
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Connect to the ComfyUI WebSocket endpoint.
    ///
    /// The client id is passed as the `clientId` query parameter so that
    /// ComfyUI addresses execution messages to this connection.
    pub async fn connect(&self) -> Result<ComfyUIConnection, ComfyUIClientError> {
        let url = format!("{}/ws?clientId={}", self.ws_url, self.client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ComfyUIClientError::Connection(format!(
                "Failed to connect to ComfyUI at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::debug!(client_id = %self.client_id, "Connected to ComfyUI at {}", self.ws_url);

        Ok(ComfyUIConnection {
            client_id: self.client_id.clone(),
            ws_stream,
        })
    }
}

impl ComfyUIConnection {
    /// Close the connection, logging rather than returning close errors.
    pub async fn close(mut self) {
        if let Err(e) = self.ws_stream.close(None).await {
            tracing::debug!(client_id = %self.client_id, error = %e, "WebSocket close failed");
        }
    }
}

/// Derive the WebSocket base URL from an HTTP API base URL.
///
/// `http://` maps to `ws://` and `https://` to `wss://`; any other
/// scheme is returned unchanged.
pub fn ws_url_from_api_url(api_url: &str) -> String {
    let api_url = api_url.trim_end_matches('/');
    if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        api_url.to_string()
    }
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIClientError {
    /// Failed to establish the initial WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_is_stable_per_client() {
        let client = ComfyUIClient::new("ws://127.0.0.1:8188/");
        let id = client.client_id().to_string();
        assert_eq!(client.client_id(), id);
        assert_eq!(client.ws_url(), "ws://127.0.0.1:8188");
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn ws_url_derivation() {
        assert_eq!(ws_url_from_api_url("http://127.0.0.1:8188"), "ws://127.0.0.1:8188");
        assert_eq!(ws_url_from_api_url("https://comfy.local/"), "wss://comfy.local");
        assert_eq!(ws_url_from_api_url("ws://already"), "ws://already");
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        // Reserve a free port, then release it so nothing is listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let client = ComfyUIClient::new(format!("ws://127.0.0.1:{port}"));
        let result = client.connect().await;
        assert!(matches!(result, Err(ComfyUIClientError::Connection(_))));
    }
}
