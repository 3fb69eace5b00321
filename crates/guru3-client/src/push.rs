//! Status stream: Guru3 announces queue length changes over a WebSocket.

use crate::error::Guru3Error;
use crate::types::{PushMessage, MESSAGE_COUNT_ACTION};
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

/// Live connection to the Guru3 status stream.
pub struct PushChannel {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl PushChannel {
    /// Connect to `url`, authenticating with the `ApiKey` header.
    pub async fn connect(url: &str, api_key: &str) -> Result<Self, Guru3Error> {
        let mut request = url.into_client_request()?;
        let key = HeaderValue::from_str(api_key)
            .map_err(|e| Guru3Error::InvalidApiKey(e.to_string()))?;
        request.headers_mut().insert("ApiKey", key);

        let (ws, _) = connect_async(request).await?;
        debug!(url, "Push channel connected");
        Ok(Self { ws })
    }

    /// Wait for the next queue-length hint.
    ///
    /// Returns an error when the server closes the stream or sends an action other than
    /// `messagecount`.
    pub async fn next_hint(&mut self) -> Result<u64, Guru3Error> {
        loop {
            let message = match self.ws.next().await {
                Some(message) => message?,
                None => return Err(Guru3Error::PushClosed),
            };

            match message {
                Message::Text(text) => return parse_hint(text.as_str()),
                Message::Close(frame) => {
                    warn!(?frame, "Push channel closed");
                    return Err(Guru3Error::PushClosed);
                }
                other => trace!(?other, "Ignoring non-text frame"),
            }
        }
    }

    /// Close the connection.
    pub async fn close(mut self) {
        if let Err(e) = self.ws.close(None).await {
            debug!("Error closing push channel: {}", e);
        }
    }
}

/// Decode one status stream message into its queue length.
pub fn parse_hint(text: &str) -> Result<u64, Guru3Error> {
    let message: PushMessage = serde_json::from_str(text)?;
    if message.action != MESSAGE_COUNT_ACTION {
        return Err(Guru3Error::UnknownAction(message.action));
    }
    Ok(message.queuelength)
}
