//! Transport abstraction: any message-oriented, reconnectable channel.
//!
//! Concrete implementations:
//! - websocket over plain TCP ([`super::ws::WsConnector`])
//! - scripted in-memory links in the integration tests
//!
//! The remote channel is generic over [`Connector`], so swapping the
//! transport requires zero changes to the reconnect / dispatch logic.

use crate::error::TransportError;

/// One established connection.
pub trait Link: Send {
    /// Write one text frame.
    fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// Wait a bounded time for the next text frame.
    ///
    /// Returns `Ok(None)` when nothing arrived within the link's poll
    /// interval, so the caller can check its stop signal. Any `Err` means
    /// the link is dead.
    fn recv_text(&mut self) -> Result<Option<String>, TransportError>;

    /// Close the link. Must not block for long.
    fn close(&mut self);
}

/// Factory for [`Link`]s, called again after every transport failure.
pub trait Connector: Send + 'static {
    type Link: Link + 'static;

    fn connect(&mut self) -> Result<Self::Link, TransportError>;
}
