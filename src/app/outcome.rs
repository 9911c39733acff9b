//! What happened when an event was handed to the coordinator.

use crate::error::InvalidTransition;
use crate::fsm::SessionState;

/// Fate of the protocol command a transition carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Handed to a connected channel.
    Sent,
    /// The channel refused it (not connected, queue full or closed).
    SendFailed,
    /// The transition has no send effect.
    NotAttempted,
}

/// Result of one `handle_local` / `handle_remote` call.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied {
        from: SessionState,
        to: SessionState,
        send: SendStatus,
    },
    Rejected(InvalidTransition),
}

impl Outcome {
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub const fn send_status(&self) -> SendStatus {
        match self {
            Self::Applied { send, .. } => *send,
            Self::Rejected(_) => SendStatus::NotAttempted,
        }
    }
}
