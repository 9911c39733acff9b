//! Application core: session orchestration and location relay.
//!
//! All interaction with the panel, the server and the location receiver
//! happens through the **port traits** in [`ports`], so this layer runs
//! against mock adapters in the tests.

pub mod blink;
pub mod coordinator;
pub mod outcome;
pub mod ports;
pub mod relay;
