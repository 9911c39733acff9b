//! Location source that replays recorded fixes.
//!
//! Input is JSON lines, one fix per line:
//!
//! ```text
//! {"latitude":51.5,"longitude":-0.12,"accuracy":3.0,"accuracy_y":4.0,"timestamp":1700000000.0}
//! ```
//!
//! `accuracy_y` defaults to `accuracy`; `timestamp` is optional. Fixes are
//! released one per `interval`. Polled, [`LocationSource::latest`] returns
//! whichever fix is current by wall-clock; with a callback set, a worker
//! thread delivers each fix as it comes due.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::Deserialize;

use crate::app::ports::{Fix, FixCallback, LocationSource};
use crate::error::LocationError;
use crate::sync::StopSignal;

#[derive(Debug, Deserialize)]
struct Record {
    latitude: f64,
    longitude: f64,
    accuracy: f64,
    #[serde(default)]
    accuracy_y: Option<f64>,
    #[serde(default)]
    timestamp: Option<f64>,
}

impl From<Record> for Fix {
    fn from(r: Record) -> Self {
        Self {
            latitude: r.latitude,
            longitude: r.longitude,
            accuracy: r.accuracy,
            accuracy_y: r.accuracy_y.unwrap_or(r.accuracy),
            timestamp: r.timestamp,
        }
    }
}

/// Parse JSON-lines text. Blank lines are skipped; bad lines are logged
/// and skipped.
pub fn parse_fixes(text: &str) -> Vec<Fix> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(n, line)| match serde_json::from_str::<Record>(line) {
            Ok(record) => Some(record.into()),
            Err(e) => {
                warn!("replay: line {} skipped: {e}", n + 1);
                None
            }
        })
        .collect()
}

pub struct ReplaySource {
    path: Option<PathBuf>,
    fixes: Arc<Vec<Fix>>,
    interval: Duration,
    started_at: Option<Instant>,
    callback: Option<FixCallback>,
    more: Arc<AtomicBool>,
    stop: Arc<StopSignal>,
    worker: Option<JoinHandle<()>>,
}

impl ReplaySource {
    /// Replay the file at `path`, read on [`start`](LocationSource::start).
    pub fn from_file(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self::build(Some(path.into()), Vec::new(), interval)
    }

    /// Replay an in-memory list.
    pub fn from_fixes(fixes: Vec<Fix>, interval: Duration) -> Self {
        Self::build(None, fixes, interval)
    }

    fn build(path: Option<PathBuf>, fixes: Vec<Fix>, interval: Duration) -> Self {
        Self {
            path,
            fixes: Arc::new(fixes),
            interval: interval.max(Duration::from_millis(1)),
            started_at: None,
            callback: None,
            more: Arc::new(AtomicBool::new(true)),
            stop: Arc::new(StopSignal::new()),
            worker: None,
        }
    }

    fn current_index(&self) -> Option<usize> {
        let started = self.started_at?;
        if self.fixes.is_empty() {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        let due = (started.elapsed().as_nanos() / self.interval.as_nanos()) as usize;
        Some(due.min(self.fixes.len() - 1))
    }
}

impl LocationSource for ReplaySource {
    fn start(&mut self) -> Result<(), LocationError> {
        if let Some(path) = &self.path {
            let text = fs::read_to_string(path)
                .map_err(|e| LocationError::Start(format!("{}: {e}", path.display())))?;
            self.fixes = Arc::new(parse_fixes(&text));
            info!("replay: {} fixes from {}", self.fixes.len(), path.display());
        }
        self.started_at = Some(Instant::now());
        self.more.store(!self.fixes.is_empty(), Ordering::Release);

        let Some(mut callback) = self.callback.take() else {
            return Ok(());
        };
        let fixes = Arc::clone(&self.fixes);
        let more = Arc::clone(&self.more);
        let stop = Arc::clone(&self.stop);
        let interval = self.interval;
        let handle = std::thread::Builder::new()
            .name("replay".into())
            .spawn(move || {
                for (i, fix) in fixes.iter().enumerate() {
                    if i > 0 && stop.wait_timeout(interval) {
                        break;
                    }
                    callback(*fix);
                }
                more.store(false, Ordering::Release);
                debug!("replay: worker done");
            })
            .map_err(|e| LocationError::Start(e.to_string()))?;
        self.worker = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.stop.trigger();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("replay: worker panicked");
            }
        }
        self.more.store(false, Ordering::Release);
    }

    fn has_more(&self) -> bool {
        if !self.more.load(Ordering::Acquire) {
            return false;
        }
        if self.worker.is_some() {
            return true;
        }
        match self.current_index() {
            Some(idx) => idx + 1 < self.fixes.len(),
            None => self.started_at.is_none(),
        }
    }

    fn latest(&mut self) -> Option<Fix> {
        self.current_index().map(|i| self.fixes[i])
    }

    fn set_callback(&mut self, callback: FixCallback) -> bool {
        self.callback = Some(callback);
        true
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        LocationSource::stop(self);
    }
}
