//! The static transition table and the effects each row carries.
//!
//! Rows are plain data with no closures or heap, so the
//! whole machine can be checked for coverage in a unit test. Effects are
//! applied by the coordinator in the order listed here.

use super::{LocalEvent, RemoteEvent, SessionEvent, SessionState};
use crate::drivers::indicators::IndicatorPattern;

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// Protocol commands a transition can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Call,
    Cancel,
    SetLoaded,
    SetInit,
}

/// Status text shown on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Welcome,
    Connected,
    Ready,
    RequestSent,
    EnRoute,
    Loading,
    Loaded,
    Complete,
    Cancelled,
    CancelledByServer,
}

impl Prompt {
    pub const fn text(self) -> &'static str {
        match self {
            Self::Welcome => "Welcome to Call A Robot.",
            Self::Connected => "Connected to Server.",
            Self::Ready => "Ready to Call",
            Self::RequestSent => "Request has been sent.",
            Self::EnRoute => "A Robot is on the way",
            Self::Loading => "Load trays on robot then press BLUE button.",
            Self::Loaded => "Thank you the robot will now drive away.",
            Self::Complete => "Task complete. Press GREEN to continue.",
            Self::Cancelled => "Task has been cancelled. Press any button to reset.",
            Self::CancelledByServer => {
                "Task has been cancelled by the server. Press any button to reset."
            }
        }
    }
}

/// One side effect of an accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Stop the load-indicator blink loop (no-op when none runs).
    StopBlink,
    /// Start the load-indicator blink loop (no-op when one runs).
    StartBlink,
    /// Send a protocol command to the server.
    Send(CommandKind),
    /// Drive the three indicators to a named pattern.
    Indicate(IndicatorPattern),
    /// Replace the panel status text.
    Display(Prompt),
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// `(from, event) -> (to, effects)`.
#[derive(Debug)]
pub struct TransitionRule {
    pub from: SessionState,
    pub event: SessionEvent,
    pub to: SessionState,
    pub effects: &'static [Effect],
}

const fn rule(
    from: SessionState,
    event: SessionEvent,
    to: SessionState,
    effects: &'static [Effect],
) -> TransitionRule {
    TransitionRule {
        from,
        event,
        to,
        effects,
    }
}

const PRESS_CALL: SessionEvent = SessionEvent::Local(LocalEvent::PressCall);
const PRESS_CANCEL: SessionEvent = SessionEvent::Local(LocalEvent::PressCancel);
const PRESS_LOAD: SessionEvent = SessionEvent::Local(LocalEvent::PressConfirmLoad);
const AUTO_RESET: SessionEvent = SessionEvent::Local(LocalEvent::AutoReset);
const CONNECTED: SessionEvent = SessionEvent::Remote(RemoteEvent::ServerConnected);
const REGISTERED: SessionEvent = SessionEvent::Remote(RemoteEvent::ServerRegistered);
const ACCEPTED: SessionEvent = SessionEvent::Remote(RemoteEvent::ServerAccepted);
const ARRIVED: SessionEvent = SessionEvent::Remote(RemoteEvent::ServerArrived);
const COMPLETE: SessionEvent = SessionEvent::Remote(RemoteEvent::ServerComplete);
const SERVER_CANCEL: SessionEvent = SessionEvent::Remote(RemoteEvent::ServerCancelled);
const SERVER_RESET: SessionEvent = SessionEvent::Remote(RemoteEvent::ServerReset);

const CALL: &[Effect] = &[
    Effect::Send(CommandKind::Call),
    Effect::Display(Prompt::RequestSent),
    Effect::Indicate(IndicatorPattern::Calling),
];
const EN_ROUTE: &[Effect] = &[
    Effect::Display(Prompt::EnRoute),
    Effect::Indicate(IndicatorPattern::EnRoute),
];
const ARRIVAL: &[Effect] = &[
    Effect::Display(Prompt::Loading),
    Effect::Indicate(IndicatorPattern::Loading),
    Effect::StartBlink,
];
const CONFIRM_LOAD: &[Effect] = &[
    Effect::StopBlink,
    Effect::Send(CommandKind::SetLoaded),
    Effect::Display(Prompt::Loaded),
    Effect::Indicate(IndicatorPattern::Dark),
];
const FINISH: &[Effect] = &[
    Effect::Display(Prompt::Complete),
    Effect::Indicate(IndicatorPattern::Idle),
];
const RESET_AND_NOTIFY: &[Effect] = &[
    Effect::Send(CommandKind::SetInit),
    Effect::Display(Prompt::Ready),
    Effect::Indicate(IndicatorPattern::Idle),
];
const RESET: &[Effect] = &[
    Effect::Display(Prompt::Ready),
    Effect::Indicate(IndicatorPattern::Idle),
];
const CANCEL: &[Effect] = &[
    Effect::StopBlink,
    Effect::Send(CommandKind::Cancel),
    Effect::Display(Prompt::Cancelled),
    Effect::Indicate(IndicatorPattern::ResetPrompt),
];
const CANCELLED_BY_SERVER: &[Effect] = &[
    Effect::StopBlink,
    Effect::Display(Prompt::CancelledByServer),
    Effect::Indicate(IndicatorPattern::ResetPrompt),
];
const SERVER_UP: &[Effect] = &[
    Effect::Display(Prompt::Connected),
    Effect::Indicate(IndicatorPattern::Connected),
];

use SessionState::{Accepted, Arrived, Called, Cancelled, Complete, Init, Loaded};

/// The complete machine. Pairs not listed here are rejected.
pub static TRANSITIONS: &[TransitionRule] = &[
    // Happy path
    rule(Init, PRESS_CALL, Called, CALL),
    rule(Called, ACCEPTED, Accepted, EN_ROUTE),
    rule(Accepted, ARRIVED, Arrived, ARRIVAL),
    rule(Arrived, PRESS_LOAD, Loaded, CONFIRM_LOAD),
    rule(Loaded, COMPLETE, Complete, FINISH),
    // Reset out of Complete
    rule(Complete, PRESS_CALL, Init, RESET_AND_NOTIFY),
    rule(Complete, AUTO_RESET, Init, RESET_AND_NOTIFY),
    rule(Complete, SERVER_RESET, Init, RESET),
    // Operator cancellation
    rule(Called, PRESS_CANCEL, Cancelled, CANCEL),
    rule(Accepted, PRESS_CANCEL, Cancelled, CANCEL),
    rule(Arrived, PRESS_CANCEL, Cancelled, CANCEL),
    // Server cancellation
    rule(Called, SERVER_CANCEL, Cancelled, CANCELLED_BY_SERVER),
    rule(Accepted, SERVER_CANCEL, Cancelled, CANCELLED_BY_SERVER),
    rule(Arrived, SERVER_CANCEL, Cancelled, CANCELLED_BY_SERVER),
    rule(Loaded, SERVER_CANCEL, Cancelled, CANCELLED_BY_SERVER),
    // Any button (or the timer, or the server) resets a cancelled session
    rule(Cancelled, PRESS_CALL, Init, RESET),
    rule(Cancelled, PRESS_CANCEL, Init, RESET),
    rule(Cancelled, PRESS_LOAD, Init, RESET),
    rule(Cancelled, AUTO_RESET, Init, RESET),
    rule(Cancelled, SERVER_RESET, Init, RESET),
    // Connection lifecycle while idle
    rule(Init, CONNECTED, Init, SERVER_UP),
    rule(Init, REGISTERED, Init, RESET),
    rule(Init, SERVER_RESET, Init, RESET),
];
