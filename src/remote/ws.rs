//! Websocket transport over a plain TCP stream (`ws://` only).
//!
//! The read side uses a socket read timeout equal to the poll interval, so
//! [`Link::recv_text`] returns `Ok(None)` on a quiet connection instead of
//! blocking forever. tungstenite keeps partially read frames buffered
//! across timeouts.

use std::io::ErrorKind;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, warn};
use tungstenite::http::Uri;
use tungstenite::{Message, WebSocket};

use super::transport::{Connector, Link};
use crate::error::TransportError;

/// Connects to a `ws://host[:port]/path` endpoint.
pub struct WsConnector {
    url: String,
    connect_timeout: Duration,
    poll_interval: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, connect_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
            poll_interval,
        }
    }

    fn open_stream(&self) -> Result<TcpStream, TransportError> {
        let uri: Uri = self
            .url
            .parse()
            .map_err(|e| TransportError::Connect(format!("bad url {}: {e}", self.url)))?;
        if uri.scheme_str() != Some("ws") {
            return Err(TransportError::Connect(format!(
                "unsupported scheme in {} (only ws:// is supported)",
                self.url
            )));
        }
        let host = uri
            .host()
            .ok_or_else(|| TransportError::Connect(format!("no host in {}", self.url)))?;
        let port = uri.port_u16().unwrap_or(80);

        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| TransportError::Connect(format!("resolve {host}: {e}")))?
            .next()
            .ok_or_else(|| TransportError::Connect(format!("{host} has no address")))?;

        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| TransportError::Connect(format!("{addr}: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        // Bounds the upgrade handshake; a peer that accepts TCP and then
        // says nothing must not hold the worker.
        stream
            .set_read_timeout(Some(self.connect_timeout))
            .and_then(|()| stream.set_write_timeout(Some(self.connect_timeout)))
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(stream)
    }
}

impl Connector for WsConnector {
    type Link = WsLink;

    fn connect(&mut self) -> Result<WsLink, TransportError> {
        let stream = self.open_stream()?;
        let (socket, response) = tungstenite::client::client(self.url.as_str(), stream)
            .map_err(|e| TransportError::Connect(format!("handshake with {}: {e}", self.url)))?;
        debug!("WS handshake complete (status {})", response.status());

        // Reads poll; writes keep the handshake bound for the link's life.
        socket
            .get_ref()
            .set_read_timeout(Some(self.poll_interval))
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(WsLink { socket })
    }
}

/// An open websocket.
pub struct WsLink {
    socket: WebSocket<TcpStream>,
}

impl Link for WsLink {
    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.socket
            .send(Message::Text(text.to_owned()))
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    fn recv_text(&mut self) -> Result<Option<String>, TransportError> {
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(Some(text)),
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => Ok(Some(text)),
                Err(_) => {
                    warn!("WS: dropping non-UTF-8 binary frame");
                    Ok(None)
                }
            },
            Ok(Message::Close(frame)) => Err(TransportError::Io(format!(
                "closed by server ({frame:?})"
            ))),
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => Ok(None),
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Ok(None)
            }
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }

    fn close(&mut self) {
        if let Err(e) = self.socket.close(None) {
            debug!("WS: close handshake failed: {e}");
        }
        let _ = self.socket.flush();
        let _ = self.socket.get_ref().shutdown(Shutdown::Both);
    }
}
