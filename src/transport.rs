//! WebSocket transport for the chat channel.
//!
//! Wraps `tokio-tungstenite` so the rest of the crate only sees a
//! [`TransportWriter`] / [`TransportReader`] pair and a small [`Inbound`]
//! enum. The chat protocol is JSON text, so binary frames are surfaced as
//! [`Inbound::Binary`] and ignored by the event loop.

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Something read from the socket.
#[derive(Debug)]
pub enum Inbound {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame (not part of the chat protocol).
    Binary(usize),
    /// Ping that needs a pong.
    Ping(Vec<u8>),
    /// Close frame.
    Close {
        /// WebSocket close code (1005 when the peer sent none).
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// Write half of a chat transport.
#[derive(Debug)]
pub struct TransportWriter {
    sink: futures_util::stream::SplitSink<WsStream, tungstenite::Message>,
}

impl TransportWriter {
    /// Send a UTF-8 text frame.
    pub async fn send_text(&mut self, text: String) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Text(text))
            .await
            .context("transport send failed")
    }

    /// Answer a ping.
    pub async fn send_pong(&mut self, data: Vec<u8>) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Pong(data))
            .await
            .context("transport pong failed")
    }

    /// Send a close frame and shut the sink down.
    pub async fn close(&mut self) -> Result<()> {
        // The peer may already be gone; closing the sink still releases it.
        let _ = self.sink.send(tungstenite::Message::Close(None)).await;
        self.sink.close().await.context("transport close failed")
    }
}

/// Read half of a chat transport.
#[derive(Debug)]
pub struct TransportReader {
    stream: futures_util::stream::SplitStream<WsStream>,
}

impl TransportReader {
    /// Next inbound item, `None` once the stream has ended.
    ///
    /// Pongs and raw frames are consumed silently.
    pub async fn recv(&mut self) -> Option<Result<Inbound>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(anyhow::anyhow!("transport read error: {e}"))),
            };
            let inbound = match message {
                tungstenite::Message::Text(text) => Inbound::Text(text),
                tungstenite::Message::Binary(data) => Inbound::Binary(data.len()),
                tungstenite::Message::Ping(data) => Inbound::Ping(data),
                tungstenite::Message::Close(frame) => {
                    let (code, reason) = frame
                        .map(|cf| (cf.code.into(), cf.reason.to_string()))
                        .unwrap_or((1005, String::new()));
                    Inbound::Close { code, reason }
                }
                tungstenite::Message::Pong(_) | tungstenite::Message::Frame(_) => continue,
            };
            return Some(Ok(inbound));
        }
    }
}

/// Open a transport to `url`.
///
/// # Errors
///
/// Returns an error if the URL is invalid or the handshake fails. Timeouts
/// are whatever the OS and TLS stack apply; the caller never waits on this
/// directly.
pub async fn connect(url: &str) -> Result<(TransportWriter, TransportReader)> {
    use tungstenite::client::IntoClientRequest;

    let request = url
        .into_client_request()
        .with_context(|| format!("invalid WebSocket URL: {url}"))?;

    let (stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .with_context(|| format!("WebSocket connect to {url} failed"))?;

    let (sink, stream) = stream.split();
    Ok((TransportWriter { sink }, TransportReader { stream }))
}

/// Normalize an endpoint to a WebSocket scheme.
///
/// `https://` becomes `wss://`, `http://` becomes `ws://`; WebSocket URLs
/// pass through unchanged.
#[must_use]
pub fn to_ws_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}
