//! Session state machine as a pure transition table.
//!
//! ```text
//!   INIT ──[PressCall]──▶ CALLED ──[ServerAccepted]──▶ ACCEPTED
//!    ▲                      │                              │
//!    │                 [PressCancel]                [ServerArrived]
//!    │                      ▼                              ▼
//!    │◀──[any reset]── CANCELLED ◀──[PressCancel]──── ARRIVED (blink)
//!    │                                                     │
//!    │                                            [PressConfirmLoad]
//!    │                                                     ▼
//!    └────[PressCall]──── COMPLETE ◀──[ServerComplete]── LOADED
//! ```
//!
//! [`transition`] is a table lookup with no side effects and no shared
//! state. Every `(state, event)` pair either has exactly one row in
//! [`table::TRANSITIONS`] or is rejected with an [`InvalidTransition`]
//! value; the caller decides how to surface a rejection.

pub mod table;

pub use table::{CommandKind, Effect, Prompt, TransitionRule};

use crate::error::InvalidTransition;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Where the current robot-call session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Init,
    Called,
    Accepted,
    Arrived,
    Loaded,
    Complete,
    Cancelled,
}

impl SessionState {
    /// Every state, in lifecycle order.
    pub const ALL: [SessionState; 7] = [
        Self::Init,
        Self::Called,
        Self::Accepted,
        Self::Arrived,
        Self::Loaded,
        Self::Complete,
        Self::Cancelled,
    ];

    /// The server's name for this state.
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Init => "car_INIT",
            Self::Called => "car_CALLED",
            Self::Accepted => "car_ACCEPTED",
            Self::Arrived => "car_ARRIVED",
            Self::Loaded => "car_LOADED",
            Self::Complete => "car_COMPLETE",
            Self::Cancelled => "car_CANCEL",
        }
    }

    /// `Complete` and `Cancelled` wait for a reset trigger.
    pub const fn awaits_reset(self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events produced at the station itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalEvent {
    PressCall,
    PressCancel,
    PressConfirmLoad,
    /// Elapsed-time reset out of `Complete` / `Cancelled`.
    AutoReset,
}

/// Events pushed by the coordination server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteEvent {
    ServerConnected,
    ServerRegistered,
    ServerAccepted,
    ServerArrived,
    ServerComplete,
    ServerCancelled,
    /// The server moved our session back to `car_INIT`.
    ServerReset,
}

/// Anything that can drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEvent {
    Local(LocalEvent),
    Remote(RemoteEvent),
}

impl SessionEvent {
    /// Every event, local first.
    pub const ALL: [SessionEvent; 11] = [
        Self::Local(LocalEvent::PressCall),
        Self::Local(LocalEvent::PressCancel),
        Self::Local(LocalEvent::PressConfirmLoad),
        Self::Local(LocalEvent::AutoReset),
        Self::Remote(RemoteEvent::ServerConnected),
        Self::Remote(RemoteEvent::ServerRegistered),
        Self::Remote(RemoteEvent::ServerAccepted),
        Self::Remote(RemoteEvent::ServerArrived),
        Self::Remote(RemoteEvent::ServerComplete),
        Self::Remote(RemoteEvent::ServerCancelled),
        Self::Remote(RemoteEvent::ServerReset),
    ];
}

impl From<LocalEvent> for SessionEvent {
    fn from(e: LocalEvent) -> Self {
        Self::Local(e)
    }
}

impl From<RemoteEvent> for SessionEvent {
    fn from(e: RemoteEvent) -> Self {
        Self::Remote(e)
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Find the rule for `event` in `state`.
///
/// Returns the matching row, or an [`InvalidTransition`] when the table has
/// no entry for the pair. Never panics, never mutates anything.
pub fn transition(
    state: SessionState,
    event: SessionEvent,
) -> Result<&'static TransitionRule, InvalidTransition> {
    table::TRANSITIONS
        .iter()
        .find(|rule| rule.from == state && rule.event == event)
        .ok_or(InvalidTransition { state, event })
}
