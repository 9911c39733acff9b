//! Unified error types for the station controller.
//!
//! Each subsystem owns a typed error enum; the binary wraps them in
//! `anyhow` context at the boundary. Only [`ConfigError`] is fatal.
//! Everything else is recovered locally and degrades to a log line plus
//! panel text.

use thiserror::Error;

use crate::fsm::{SessionEvent, SessionState};

// ---------------------------------------------------------------------------
// State machine rejection
// ---------------------------------------------------------------------------

/// An event that has no row in the transition table for the current state.
///
/// This is a value, not a failure: the coordinator surfaces it as a
/// transient notice and carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{event:?} is not allowed in state {state:?}")]
pub struct InvalidTransition {
    pub state: SessionState,
    pub event: SessionEvent,
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting has no value.
    #[error("missing required setting {0}")]
    Missing(&'static str),
    /// A setting could not be parsed.
    #[error("setting {key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
    /// A setting parsed but failed range validation.
    #[error("validation failed: {0}")]
    ValidationFailed(&'static str),
    /// No identity override and no usable device address.
    #[error("cannot derive a user identity: {0}")]
    Identity(&'static str),
    /// The JSON config file could not be read or parsed.
    #[error("config file {path}: {reason}")]
    File { path: String, reason: String },
}

// ---------------------------------------------------------------------------
// Remote channel errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransportError {
    /// No registered connection is currently up.
    #[error("not connected")]
    NotConnected,
    /// The outbound queue is full; the command was dropped.
    #[error("outbound queue full")]
    QueueFull,
    /// The channel has been stopped.
    #[error("channel closed")]
    Closed,
    /// Establishing the connection failed.
    #[error("connect failed: {0}")]
    Connect(String),
    /// A read or write on an established connection failed.
    #[error("I/O failed: {0}")]
    Io(String),
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The server answered with a non-success status.
    #[error("server rejected identity (status {0})")]
    Rejected(u16),
    /// The request never got an answer.
    #[error("request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame is not valid JSON or does not have the expected shape.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The pushed state string is not one we know.
    #[error("unknown session state {0:?}")]
    UnknownState(String),
}

// ---------------------------------------------------------------------------
// Location errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LocationError {
    /// The source could not be started.
    #[error("source failed to start: {0}")]
    Start(String),
    /// Push mode was requested from a source that can only be polled.
    #[error("source does not support push delivery")]
    PushUnsupported,
}
