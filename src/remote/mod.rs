//! Remote channel: one persistent link to the coordination server.
//!
//! ```text
//!  coordinator / relay                       server
//!        │ RemoteSender::send                  ▲
//!        ▼                                     │ text frames
//!  ┌───────────┐  Command   ┌──────────────────┴─┐
//!  │  outbox   │──────────▶│  remote-io thread   │── decode_push ──▶ RemoteEventSink
//!  │ (bounded) │            │  connect / backoff  │
//!  └───────────┘            └─────────┬──────────┘
//!                                     │ generation++ on connect
//!                           ┌─────────▼──────────┐
//!                           │ remote-register    │── Registrar::register
//!                           │ thread (retries)   │
//!                           └────────────────────┘
//! ```
//!
//! Commands are only accepted while the link is up and the current
//! registration generation has completed. Inbound frames are not read
//! before that point, so nothing is consumed and dropped while the
//! server does not yet know us. When the link drops, whatever is still
//! in the outbox is discarded.

pub mod backoff;
pub mod codec;
pub mod register;
pub mod transport;
pub mod ws;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, info, warn};

use self::backoff::Backoff;
use self::codec::Command;
use self::register::Registrar;
use self::transport::{Connector, Link};
use crate::app::ports::{CommandSink, RemoteEventSink};
use crate::error::TransportError;
use crate::identity::UserIdentity;
use crate::sync::StopSignal;

/// Outbound queue depth.
const OUTBOX_DEPTH: usize = 32;

/// Lifecycle of the server connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Not yet connected and registered for the first time.
    Unconnected,
    /// Link up and registered; commands are accepted.
    Connected,
    /// Was connected before; currently reconnecting or re-registering.
    Reconnecting,
    /// Stopped explicitly.
    Closed,
}

/// Timing knobs for the remote workers.
#[derive(Debug, Clone, Copy)]
pub struct RemoteSettings {
    /// Upper bound on how long a worker sleeps before checking for stop.
    pub poll_interval: Duration,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            reconnect_initial: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Registration generations. `wanted` is bumped on every connect; the
/// channel counts as registered once `done` has caught up.
#[derive(Debug)]
struct Registration {
    wanted: u64,
    done: u64,
}

struct Shared {
    stop: StopSignal,
    link_up: AtomicBool,
    ever_connected: AtomicBool,
    ever_registered: AtomicBool,
    reg: Mutex<Registration>,
    reg_cv: Condvar,
    outbox: Channel<CriticalSectionRawMutex, Command, OUTBOX_DEPTH>,
}

impl Shared {
    fn new() -> Self {
        Self {
            stop: StopSignal::new(),
            link_up: AtomicBool::new(false),
            ever_connected: AtomicBool::new(false),
            ever_registered: AtomicBool::new(false),
            reg: Mutex::new(Registration { wanted: 0, done: 0 }),
            reg_cv: Condvar::new(),
            outbox: Channel::new(),
        }
    }

    fn registered(&self) -> bool {
        let reg = self.reg.lock().unwrap_or_else(PoisonError::into_inner);
        reg.done >= reg.wanted
    }

    fn request_registration(&self) {
        let mut reg = self.reg.lock().unwrap_or_else(PoisonError::into_inner);
        reg.wanted += 1;
        self.reg_cv.notify_all();
    }

    fn status(&self) -> ConnectionStatus {
        if self.stop.is_set() {
            ConnectionStatus::Closed
        } else if self.link_up.load(Ordering::Acquire) && self.registered() {
            ConnectionStatus::Connected
        } else if self.ever_connected.load(Ordering::Acquire)
            && self.ever_registered.load(Ordering::Acquire)
        {
            ConnectionStatus::Reconnecting
        } else {
            ConnectionStatus::Unconnected
        }
    }

    fn discard_outbox(&self) {
        let mut dropped = 0usize;
        while self.outbox.try_receive().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!("remote: link lost, discarded {dropped} queued command(s)");
        }
    }
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Cloneable handle that enqueues commands for the I/O worker.
#[derive(Clone)]
pub struct RemoteSender {
    shared: Arc<Shared>,
}

impl CommandSink for RemoteSender {
    fn send(&self, command: Command) -> Result<(), TransportError> {
        if self.shared.stop.is_set() {
            return Err(TransportError::Closed);
        }
        if !self.shared.link_up.load(Ordering::Acquire) || !self.shared.registered() {
            return Err(TransportError::NotConnected);
        }
        self.shared
            .outbox
            .try_send(command)
            .map_err(|_| TransportError::QueueFull)
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Owns the remote workers. Construct, hand [`sender`](Self::sender) to
/// the coordinator, then [`start`](Self::start) with the coordinator as
/// the event sink.
pub struct RemoteChannel<C: Connector, R: Registrar> {
    identity: UserIdentity,
    settings: RemoteSettings,
    shared: Arc<Shared>,
    connector: Option<C>,
    registrar: Option<R>,
    workers: Vec<JoinHandle<()>>,
}

impl<C: Connector, R: Registrar> RemoteChannel<C, R> {
    pub fn new(settings: RemoteSettings, identity: UserIdentity, connector: C, registrar: R) -> Self {
        Self {
            identity,
            settings,
            shared: Arc::new(Shared::new()),
            connector: Some(connector),
            registrar: Some(registrar),
            workers: Vec::new(),
        }
    }

    pub fn sender(&self) -> RemoteSender {
        RemoteSender {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.status()
    }

    /// Spawn the I/O and registration workers. Inbound events go to `sink`.
    ///
    /// Fails if the channel was already started or stopped.
    pub fn start<S: RemoteEventSink>(&mut self, sink: S) -> Result<(), TransportError> {
        if self.shared.stop.is_set() {
            return Err(TransportError::Closed);
        }
        let (Some(connector), Some(registrar)) = (self.connector.take(), self.registrar.take())
        else {
            return Err(TransportError::Io("remote channel already started".into()));
        };

        let io = IoWorker {
            shared: Arc::clone(&self.shared),
            identity: self.identity.clone(),
            settings: self.settings,
            connector,
            sink,
        };
        let handle = std::thread::Builder::new()
            .name("remote-io".into())
            .spawn(move || io.run())
            .map_err(|e| TransportError::Io(format!("spawn remote-io: {e}")))?;
        self.workers.push(handle);

        let reg = RegistrationWorker {
            shared: Arc::clone(&self.shared),
            identity: self.identity.clone(),
            settings: self.settings,
            registrar,
        };
        let handle = std::thread::Builder::new()
            .name("remote-register".into())
            .spawn(move || reg.run())
            .map_err(|e| TransportError::Io(format!("spawn remote-register: {e}")))?;
        self.workers.push(handle);

        info!("remote: started for {}", self.identity);
        Ok(())
    }

    /// Stop both workers and close the link. Returns once they have exited.
    pub fn stop(&mut self) {
        self.shared.stop.trigger();
        {
            let _reg = self.shared.reg.lock().unwrap_or_else(PoisonError::into_inner);
            self.shared.reg_cv.notify_all();
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("remote: worker panicked");
            }
        }
        self.shared.link_up.store(false, Ordering::Release);
    }
}

impl<C: Connector, R: Registrar> Drop for RemoteChannel<C, R> {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// I/O worker
// ---------------------------------------------------------------------------

enum LinkEnd {
    Stopped,
    Lost,
}

struct IoWorker<C, S> {
    shared: Arc<Shared>,
    identity: UserIdentity,
    settings: RemoteSettings,
    connector: C,
    sink: S,
}

impl<C: Connector, S: RemoteEventSink> IoWorker<C, S> {
    fn run(mut self) {
        let mut backoff = Backoff::new(self.settings.reconnect_initial, self.settings.reconnect_max);

        while !self.shared.stop.is_set() {
            let mut link = match self.connector.connect() {
                Ok(link) => link,
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!("remote: connect failed ({e}), retrying in {delay:?}");
                    if self.shared.stop.wait_timeout(delay) {
                        break;
                    }
                    continue;
                }
            };
            backoff.reset();

            if self.shared.ever_connected.swap(true, Ordering::AcqRel) {
                info!("remote: reconnected, re-registering");
            } else {
                info!("remote: connected, registering");
            }
            self.shared.request_registration();
            self.shared.link_up.store(true, Ordering::Release);

            let end = self.pump(&mut link);
            self.shared.link_up.store(false, Ordering::Release);
            link.close();
            self.shared.discard_outbox();

            match end {
                LinkEnd::Stopped => break,
                LinkEnd::Lost => {
                    let delay = backoff.next_delay();
                    if self.shared.stop.wait_timeout(delay) {
                        break;
                    }
                }
            }
        }
        debug!("remote: io worker exiting");
    }

    fn pump(&mut self, link: &mut C::Link) -> LinkEnd {
        loop {
            if self.shared.stop.is_set() {
                return LinkEnd::Stopped;
            }
            if !self.shared.registered() {
                if self.shared.stop.wait_timeout(self.settings.poll_interval) {
                    return LinkEnd::Stopped;
                }
                continue;
            }

            while let Ok(command) = self.shared.outbox.try_receive() {
                let text = match codec::encode(&command) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("remote: cannot encode {}: {e}", command.method());
                        continue;
                    }
                };
                if let Err(e) = link.send_text(&text) {
                    warn!("remote: send failed ({e}), link lost");
                    return LinkEnd::Lost;
                }
                debug!("remote: sent {}", command.method());
            }

            match link.recv_text() {
                Ok(Some(text)) => self.dispatch(&text),
                Ok(None) => {}
                Err(e) => {
                    warn!("remote: receive failed ({e}), link lost");
                    return LinkEnd::Lost;
                }
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match codec::decode_push(text, &self.identity) {
            Ok(Some(pushed)) => match pushed.event() {
                Some(event) => {
                    debug!("remote: push {pushed:?}");
                    self.sink.on_remote_event(event);
                }
                None => debug!("remote: echo {pushed:?} ignored"),
            },
            Ok(None) => {}
            Err(e) => warn!("remote: dropping undecodable frame: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Registration worker
// ---------------------------------------------------------------------------

struct RegistrationWorker<R> {
    shared: Arc<Shared>,
    identity: UserIdentity,
    settings: RemoteSettings,
    registrar: R,
}

impl<R: Registrar> RegistrationWorker<R> {
    fn run(mut self) {
        while let Some(target) = self.next_generation() {
            let mut backoff =
                Backoff::new(self.settings.reconnect_initial, self.settings.reconnect_max);
            loop {
                match self.registrar.register(&self.identity) {
                    Ok(()) => {
                        let mut reg = self.shared.reg.lock().unwrap_or_else(PoisonError::into_inner);
                        reg.done = reg.done.max(target);
                        self.shared.ever_registered.store(true, Ordering::Release);
                        info!("remote: registered as {}", self.identity);
                        break;
                    }
                    Err(e) => {
                        let delay = backoff.next_delay();
                        warn!("remote: registration failed ({e}), retrying in {delay:?}");
                        if self.shared.stop.wait_timeout(delay) {
                            return;
                        }
                    }
                }
            }
        }
        debug!("remote: registration worker exiting");
    }

    /// Block until a registration is wanted. `None` once stopped.
    fn next_generation(&self) -> Option<u64> {
        let mut reg = self.shared.reg.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if self.shared.stop.is_set() {
                return None;
            }
            if reg.done < reg.wanted {
                return Some(reg.wanted);
            }
            reg = self
                .shared
                .reg_cv
                .wait_timeout(reg, self.settings.poll_interval)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}
