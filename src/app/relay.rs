//! Location relay: forwards position fixes to the server.
//!
//! Two delivery modes:
//! - **Push**: the source calls back with every fix, which is forwarded
//!   from the source's own thread.
//! - **Fixed rate**: the relay polls [`LocationSource::latest`] once per
//!   period and forwards it if it changed since the last poll.
//!
//! Sends are never retried. Failures are counted and logged, and the relay
//! keeps going.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};

use super::ports::{CommandSink, Fix, LocationSource};
use crate::error::LocationError;
use crate::identity::UserIdentity;
use crate::remote::codec::Command;
use crate::sync::StopSignal;

/// How often push mode checks for stop / source exhaustion.
const PUSH_WATCH_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    Push,
    FixedRate(Duration),
}

impl RelayMode {
    /// `Push` when no rate is configured, else one poll every `1 / hz`.
    pub fn from_rate(hz: Option<f64>) -> Self {
        match hz {
            Some(hz) if hz > 0.0 => Self::FixedRate(
                Duration::try_from_secs_f64(1.0 / hz).unwrap_or(Duration::MAX),
            ),
            _ => Self::Push,
        }
    }
}

/// Totals for one relay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub forwarded: usize,
    pub failed: usize,
    /// Polls that found no new fix.
    pub skipped: usize,
}

#[derive(Default)]
struct Counters {
    forwarded: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl Counters {
    fn report(&self) -> RelayReport {
        RelayReport {
            forwarded: self.forwarded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

pub struct LocationRelay<S> {
    sink: S,
    identity: UserIdentity,
    mode: RelayMode,
}

impl<S: CommandSink + Clone> LocationRelay<S> {
    pub fn new(sink: S, identity: UserIdentity, mode: RelayMode) -> Self {
        Self {
            sink,
            identity,
            mode,
        }
    }

    pub fn mode(&self) -> RelayMode {
        self.mode
    }

    /// Relay until `stop` fires or the source runs dry. The source is
    /// started here and stopped before returning.
    pub fn run(
        &self,
        source: &mut impl LocationSource,
        stop: &StopSignal,
    ) -> Result<RelayReport, LocationError> {
        let counters = Arc::new(Counters::default());

        match self.mode {
            RelayMode::Push => {
                let sink = self.sink.clone();
                let identity = self.identity.clone();
                let cb_counters = Arc::clone(&counters);
                let accepted = source.set_callback(Box::new(move |fix: Fix| {
                    forward(&sink, &identity, &fix, &cb_counters);
                }));
                if !accepted {
                    return Err(LocationError::PushUnsupported);
                }
                source.start()?;
                info!("relay: push mode");
                while source.has_more() && !stop.wait_timeout(PUSH_WATCH_INTERVAL) {}
            }
            RelayMode::FixedRate(period) => {
                source.start()?;
                info!("relay: fixed rate every {period:?}");
                let mut last: Option<Fix> = None;
                loop {
                    match source.latest() {
                        Some(fix) if last != Some(fix) => {
                            forward(&self.sink, &self.identity, &fix, &counters);
                            last = Some(fix);
                        }
                        _ => {
                            counters.skipped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    if !source.has_more() || stop.wait_timeout(period) {
                        break;
                    }
                }
            }
        }

        source.stop();
        let report = counters.report();
        info!(
            "relay: done, {} forwarded, {} failed, {} skipped",
            report.forwarded, report.failed, report.skipped
        );
        Ok(report)
    }
}

fn forward(sink: &impl CommandSink, identity: &UserIdentity, fix: &Fix, counters: &Counters) {
    let command = Command::location(identity.clone(), fix, now_epoch_secs());
    match sink.send(command) {
        Ok(()) => {
            counters.forwarded.fetch_add(1, Ordering::Relaxed);
            debug!("relay: forwarded {:.6},{:.6}", fix.latitude, fix.longitude);
        }
        Err(e) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            warn!("relay: fix not sent: {e}");
        }
    }
}

fn now_epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
