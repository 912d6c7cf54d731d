//! Pool websocket subscriber.

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::ClientError;
use crate::objects::PoolMessage;

/// A pool client connected to `GET /pool/ws`.
///
/// Registering with an id already in use replaces the previous connection's
/// registration on the server.
pub struct PoolSubscriber {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl PoolSubscriber {
    /// Connect to the daemon at `base_url` as pool client `id`.
    pub async fn connect(base_url: &Url, id: u64) -> Result<Self, ClientError> {
        let url = pool_url(base_url, id)?;
        let (socket, _response) = connect_async(url.as_str()).await?;
        Ok(Self { socket })
    }

    /// Wait for the next broadcast message.
    ///
    /// Returns `None` once the server closes the connection.
    pub async fn next_message(&mut self) -> Option<Result<PoolMessage, ClientError>> {
        while let Some(frame) = self.socket.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    return Some(serde_json::from_str(&text).map_err(ClientError::Json));
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }

    /// Close the connection, which unregisters this client.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.socket.close(None).await?;
        // Drain until the server acknowledges.
        while let Some(Ok(_)) = self.socket.next().await {}
        Ok(())
    }
}

fn pool_url(base_url: &Url, id: u64) -> Result<Url, ClientError> {
    let mut url = base_url.join("/pool/ws")?;
    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|()| ClientError::Scheme(base_url.scheme().to_string()))?;
    url.query_pairs_mut().append_pair("id", &id.to_string());
    Ok(url)
}
