//! Robot-call station controller library.
//!
//! Exposes the session core and its adapters for the binary, the
//! integration tests and the fuzz targets.
//!
//! ```text
//!  adapters ──▶ app (coordinator · relay · ports) ──▶ remote (channel · codec)
//!                    │
//!                    └──▶ fsm (transition table)
//! ```

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod identity;
pub mod remote;
pub mod sync;
