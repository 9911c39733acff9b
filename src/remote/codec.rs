//! Protocol codec for JSON text frames.
//!
//! Outbound (station → server), one object per frame:
//! ```text
//! {"method":"call","user":ID}
//! {"method":"cancel","user":ID}
//! {"method":"set_state","user":ID,"state":"car_LOADED"|"car_INIT"}
//! {"method":"location_update","user":ID,"latitude":..,"longitude":..,"accuracy":..,"rcv_time":..}
//! ```
//!
//! Inbound (server → station):
//! ```text
//! {"method":"update_orders","states":{ID: STATE, ...}}
//! ```
//!
//! Only the entry keyed by our own identity is decoded; the rest of the
//! map may hold anything.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::ports::Fix;
use crate::error::CodecError;
use crate::fsm::{CommandKind, RemoteEvent};
use crate::identity::UserIdentity;

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// States the station may set on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetState {
    #[serde(rename = "car_LOADED")]
    Loaded,
    #[serde(rename = "car_INIT")]
    Init,
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Command {
    Call {
        user: UserIdentity,
    },
    Cancel {
        user: UserIdentity,
    },
    SetState {
        user: UserIdentity,
        state: TargetState,
    },
    LocationUpdate {
        user: UserIdentity,
        latitude: f64,
        longitude: f64,
        accuracy: f64,
        rcv_time: f64,
    },
}

impl Command {
    /// Build the message for a transition's send effect.
    pub fn from_kind(kind: CommandKind, user: UserIdentity) -> Self {
        match kind {
            CommandKind::Call => Self::Call { user },
            CommandKind::Cancel => Self::Cancel { user },
            CommandKind::SetLoaded => Self::SetState {
                user,
                state: TargetState::Loaded,
            },
            CommandKind::SetInit => Self::SetState {
                user,
                state: TargetState::Init,
            },
        }
    }

    /// Build a location update. `captured_at` stands in for a missing
    /// source timestamp.
    pub fn location(user: UserIdentity, fix: &Fix, captured_at: f64) -> Self {
        Self::LocationUpdate {
            user,
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy: fix.accuracy,
            rcv_time: fix.timestamp.unwrap_or(captured_at),
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Self::Call { .. } => "call",
            Self::Cancel { .. } => "cancel",
            Self::SetState { .. } => "set_state",
            Self::LocationUpdate { .. } => "location_update",
        }
    }

    pub fn user(&self) -> &UserIdentity {
        match self {
            Self::Call { user }
            | Self::Cancel { user }
            | Self::SetState { user, .. }
            | Self::LocationUpdate { user, .. } => user,
        }
    }
}

/// Serialize a command into one text frame.
pub fn encode(command: &Command) -> Result<String, CodecError> {
    Ok(serde_json::to_string(command)?)
}

/// Parse an outbound-shaped frame (the server's view of our messages).
pub fn decode_command(text: &str) -> Result<Command, CodecError> {
    Ok(serde_json::from_str(text)?)
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A session state as pushed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushedState {
    Connected,
    Registered,
    Init,
    Called,
    Accepted,
    Arrived,
    Loaded,
    Complete,
    Cancelled,
}

impl PushedState {
    pub fn parse(s: &str) -> Result<Self, CodecError> {
        Ok(match s {
            "CONNECTED" => Self::Connected,
            "REGISTERED" => Self::Registered,
            "car_INIT" => Self::Init,
            "car_CALLED" => Self::Called,
            "car_ACCEPT" | "car_ACCEPTED" => Self::Accepted,
            "car_ARRIVED" => Self::Arrived,
            "car_LOADED" => Self::Loaded,
            "car_COMPLETE" => Self::Complete,
            "car_CANCEL" | "car_CANCELLED" => Self::Cancelled,
            other => return Err(CodecError::UnknownState(other.to_owned())),
        })
    }

    /// The event this push drives, if any. `Called` and `Loaded` only echo
    /// what the station itself just did.
    pub const fn event(self) -> Option<RemoteEvent> {
        match self {
            Self::Connected => Some(RemoteEvent::ServerConnected),
            Self::Registered => Some(RemoteEvent::ServerRegistered),
            Self::Init => Some(RemoteEvent::ServerReset),
            Self::Accepted => Some(RemoteEvent::ServerAccepted),
            Self::Arrived => Some(RemoteEvent::ServerArrived),
            Self::Complete => Some(RemoteEvent::ServerComplete),
            Self::Cancelled => Some(RemoteEvent::ServerCancelled),
            Self::Called | Self::Loaded => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "method")]
enum Inbound {
    #[serde(rename = "update_orders")]
    UpdateOrders { states: HashMap<String, Value> },
    #[serde(other)]
    Other,
}

/// Decode one inbound frame for `identity`.
///
/// `Ok(None)` when the frame is well-formed but not for us (other method,
/// or no entry for our identity).
pub fn decode_push(text: &str, identity: &UserIdentity) -> Result<Option<PushedState>, CodecError> {
    let Inbound::UpdateOrders { states } = serde_json::from_str::<Inbound>(text)? else {
        return Ok(None);
    };
    match states.get(identity.as_str()) {
        None => Ok(None),
        Some(Value::String(s)) => PushedState::parse(s).map(Some),
        Some(other) => Err(CodecError::UnknownState(other.to_string())),
    }
}
