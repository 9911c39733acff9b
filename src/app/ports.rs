//! Port traits: the hexagonal boundary between the session core and the
//! outside world.
//!
//! ```text
//!   Panel adapter ──▶ SessionCoordinator ──▶ CommandSink (remote channel)
//!                          ▲       │
//!   RemoteEventSink ───────┘       └──▶ PanelPort (indicators, text)
//!
//!   LocationSource ──▶ LocationRelay ──▶ CommandSink
//! ```
//!
//! Ports take `&self`: panels, sinks and sources are shared between the
//! coordinator, the blink loop and the remote workers, so adapters use
//! interior mutability.

use crate::drivers::indicators::Indicator;
use crate::error::{LocationError, TransportError};
use crate::fsm::RemoteEvent;
use crate::remote::codec::Command;

// ───────────────────────────────────────────────────────────────
// Panel port (driven adapter: domain → lights and status text)
// ───────────────────────────────────────────────────────────────

/// Output half of the operator panel.
pub trait PanelPort: Send + Sync + 'static {
    /// Switch one indicator on or off.
    fn set_indicator(&self, indicator: Indicator, on: bool);

    /// Replace the status line.
    fn set_status_text(&self, text: &str);

    /// Current status line.
    fn status_text(&self) -> String;
}

// ───────────────────────────────────────────────────────────────
// Command sink (driven adapter: domain → server)
// ───────────────────────────────────────────────────────────────

/// Fire-and-forget outbound path to the server.
///
/// Implementations must not block on network I/O: the coordinator calls
/// this while holding its transition lock.
pub trait CommandSink: Send + Sync + 'static {
    fn send(&self, command: Command) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Remote event sink (driving adapter: server → domain)
// ───────────────────────────────────────────────────────────────

/// Where the remote channel delivers decoded push events.
pub trait RemoteEventSink: Send + Sync + 'static {
    fn on_remote_event(&self, event: RemoteEvent);
}

// ───────────────────────────────────────────────────────────────
// Location source (driven adapter: receiver → domain)
// ───────────────────────────────────────────────────────────────

/// One position fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy (metres, longitude axis).
    pub accuracy: f64,
    /// Accuracy on the latitude axis. Not forwarded.
    pub accuracy_y: f64,
    /// Source timestamp, seconds since the Unix epoch.
    pub timestamp: Option<f64>,
}

/// Called by push-capable sources for every new fix.
pub type FixCallback = Box<dyn FnMut(Fix) + Send + 'static>;

/// A producer of position fixes.
pub trait LocationSource: Send {
    fn start(&mut self) -> Result<(), LocationError>;

    fn stop(&mut self);

    /// `false` once the source is exhausted.
    fn has_more(&self) -> bool;

    /// The most recent fix, if any has arrived.
    fn latest(&mut self) -> Option<Fix>;

    /// Register a push callback. Returns `false` if the source can only be
    /// polled.
    fn set_callback(&mut self, _callback: FixCallback) -> bool {
        false
    }
}
