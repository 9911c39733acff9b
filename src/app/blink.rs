//! Load-indicator blink loop.
//!
//! One background thread toggles [`Indicator::Blue`] every half period
//! until its [`StopSignal`] fires. [`Blinker::stop`] joins the thread, so
//! once it returns no further toggle can land on the panel.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, warn};

use super::ports::PanelPort;
use crate::drivers::indicators::Indicator;
use crate::sync::StopSignal;

/// A running blink loop.
struct BlinkToken {
    stop: Arc<StopSignal>,
    handle: JoinHandle<()>,
}

/// Owner of at most one blink loop.
#[derive(Default)]
pub struct Blinker {
    token: Option<BlinkToken>,
}

impl Blinker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.token.is_some()
    }

    /// Start blinking. No-op if a loop is already running.
    pub fn start<P: PanelPort>(&mut self, panel: Arc<P>, half_period: Duration) {
        if self.token.is_some() {
            debug!("blink: already running");
            return;
        }
        let stop = Arc::new(StopSignal::new());
        let loop_stop = Arc::clone(&stop);
        let spawned = std::thread::Builder::new()
            .name("blink".into())
            .spawn(move || {
                let mut on = true;
                while !loop_stop.wait_timeout(half_period) {
                    on = !on;
                    panel.set_indicator(Indicator::Blue, on);
                }
            });
        match spawned {
            Ok(handle) => self.token = Some(BlinkToken { stop, handle }),
            Err(e) => warn!("blink: cannot spawn loop: {e}"),
        }
    }

    /// Stop blinking and wait for the loop to exit. No-op if none runs.
    pub fn stop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        token.stop.trigger();
        if token.handle.join().is_err() {
            warn!("blink: loop panicked");
        }
    }
}

impl Drop for Blinker {
    fn drop(&mut self) {
        self.stop();
    }
}
