//! Socket transport seam
//!
//! The socket manager never touches a WebSocket library directly. It asks a
//! [`Transport`] for a connection and gets back a text sink and a text stream,
//! which lets tests drive the manager with an in-memory fake.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

use crate::error::{CortexError, Result};

/// Outbound half of a connection
pub type FrameSink = Pin<Box<dyn Sink<String, Error = CortexError> + Send>>;

/// Inbound half of a connection. The stream ends when the socket closes; an
/// `Err` item is a transport error and is always followed by the close.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Opens connections to a WebSocket endpoint
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a new connection to `url`
    async fn connect(&self, url: &Url) -> Result<(FrameSink, FrameStream)>;
}

/// Production transport backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

/// Install the ring crypto provider as the process default unless one is
/// already installed
#[cfg(feature = "tls")]
fn ensure_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        // Losing the race to another installer is fine
        let _ = rustls::crypto::ring::default_provider().install_default();
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &Url) -> Result<(FrameSink, FrameStream)> {
        #[cfg(feature = "tls")]
        if url.scheme() == "wss" {
            ensure_crypto_provider();
        }

        let (socket, response) = connect_async(url.as_str()).await?;
        debug!(
            "WebSocket handshake with {} completed ({})",
            url,
            response.status()
        );

        let (sink, stream) = socket.split();

        let sink = sink.with(|text: String| future::ready(Ok::<_, CortexError>(Message::text(text))));

        let stream = stream.filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => Some(Ok(text)),
                    Err(_) => {
                        warn!("Dropping non UTF-8 binary message ({} bytes)", data.len());
                        None
                    }
                },
                Ok(Message::Close(frame)) => {
                    debug!("WebSocket received close: {:?}", frame);
                    None
                }
                // Pings are answered by tungstenite
                Ok(_) => None,
                Err(e) => Some(Err(CortexError::from(e))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}
