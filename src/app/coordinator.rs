//! Session coordinator: the orchestration core.
//!
//! [`SessionCoordinator`] owns the session state and drives it from two
//! independent sources: local panel presses and remote push events. Both
//! funnel into one mutex, so exactly one transition is looked up and
//! applied at a time, and its effects (blink, send, indicators, text) run
//! in table order while the lock is held.
//!
//! ```text
//!   panel input ──handle_local──┐
//!                               ▼
//!                        ┌─────────────┐   Send(kind)   ┌─────────────┐
//!                        │  Mutex<     │──────────────▶│ CommandSink │
//!                        │   Session>  │                └─────────────┘
//!                        └─────────────┘──▶ PanelPort (text, indicators)
//!                               ▲       └─▶ Blinker
//!   remote-io ──handle_remote───┘
//! ```
//!
//! Sends are non-blocking enqueues; no network I/O happens under the lock.
//! Timers (rejection notice restore, auto-reset) run on short-lived
//! threads that take the lock only to act, and do nothing if a transition
//! happened in the meantime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};

use super::blink::Blinker;
use super::outcome::{Outcome, SendStatus};
use super::ports::{CommandSink, PanelPort, RemoteEventSink};
use crate::drivers::indicators::IndicatorPattern;
use crate::fsm::{
    self, CommandKind, Effect, LocalEvent, Prompt, RemoteEvent, SessionEvent, SessionState,
};
use crate::identity::UserIdentity;
use crate::remote::codec::Command;
use crate::sync::StopSignal;

/// Timing knobs for the coordinator.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorSettings {
    /// How long a rejection notice stays on the panel.
    pub notice_duration: Duration,
    /// Blink loop half period.
    pub blink_half_period: Duration,
    /// Leave `Complete` / `Cancelled` on its own after this long.
    pub auto_reset_after: Option<Duration>,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            notice_duration: Duration::from_secs(2),
            blink_half_period: Duration::from_millis(500),
            auto_reset_after: None,
        }
    }
}

/// Who produced the event; decides how a rejection is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Operator,
    Server,
    Timer,
}

struct Session {
    state: SessionState,
    /// Bumped on every applied transition.
    generation: u64,
    /// Bumped on every notice shown.
    notice_seq: u64,
    /// Text to put back when the current notice expires.
    restore_text: Option<String>,
    blinker: Blinker,
}

struct Inner<P, S> {
    panel: Arc<P>,
    sink: S,
    identity: UserIdentity,
    settings: CoordinatorSettings,
    session: Mutex<Session>,
    shutdown: StopSignal,
}

/// Cheaply cloneable handle; all clones drive the same session.
pub struct SessionCoordinator<P, S> {
    inner: Arc<Inner<P, S>>,
}

impl<P, S> Clone for SessionCoordinator<P, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: PanelPort, S: CommandSink> SessionCoordinator<P, S> {
    pub fn new(
        panel: Arc<P>,
        sink: S,
        identity: UserIdentity,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                panel,
                sink,
                identity,
                settings,
                session: Mutex::new(Session {
                    state: SessionState::Init,
                    generation: 0,
                    notice_seq: 0,
                    restore_text: None,
                    blinker: Blinker::new(),
                }),
                shutdown: StopSignal::new(),
            }),
        }
    }

    /// Paint the initial panel: welcome text, every indicator off.
    pub fn start(&self) {
        let _session = self.lock();
        self.inner.panel.set_status_text(Prompt::Welcome.text());
        IndicatorPattern::Dark.apply(&*self.inner.panel);
        info!("session: started as {}", self.inner.identity);
    }

    /// An operator press (or other station-side trigger).
    pub fn handle_local(&self, event: LocalEvent) -> Outcome {
        let mut session = self.lock();
        self.step(&mut session, event.into(), Origin::Operator)
    }

    /// A push from the server.
    pub fn handle_remote(&self, event: RemoteEvent) -> Outcome {
        let mut session = self.lock();
        self.step(&mut session, event.into(), Origin::Server)
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn is_blinking(&self) -> bool {
        self.lock().blinker.is_running()
    }

    /// Stop the blink loop and any pending timers.
    pub fn shutdown(&self) {
        self.inner.shutdown.trigger();
        self.lock().blinker.stop();
        debug!("session: shut down");
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ── Transition ────────────────────────────────────────────

    fn step(&self, session: &mut Session, event: SessionEvent, origin: Origin) -> Outcome {
        let rule = match fsm::transition(session.state, event) {
            Ok(rule) => rule,
            Err(rejected) => {
                match origin {
                    Origin::Operator => {
                        info!("session: {rejected}");
                        if let SessionEvent::Local(local) = event {
                            if let Some(text) = notice_for(local) {
                                self.show_notice(session, text);
                            }
                        }
                    }
                    Origin::Server => warn!("session: server push rejected: {rejected}"),
                    Origin::Timer => debug!("session: timer event rejected: {rejected}"),
                }
                return Outcome::Rejected(rejected);
            }
        };

        let from = session.state;
        session.state = rule.to;
        session.generation += 1;
        session.restore_text = None;
        info!("session: {from:?} --{event:?}--> {:?}", rule.to);

        let mut send = SendStatus::NotAttempted;
        for effect in rule.effects {
            match *effect {
                Effect::StopBlink => session.blinker.stop(),
                Effect::StartBlink => session
                    .blinker
                    .start(Arc::clone(&self.inner.panel), self.inner.settings.blink_half_period),
                Effect::Send(kind) => send = self.send(kind),
                Effect::Indicate(pattern) => pattern.apply(&*self.inner.panel),
                Effect::Display(prompt) => self.inner.panel.set_status_text(prompt.text()),
            }
        }

        if rule.to.awaits_reset() {
            if let Some(after) = self.inner.settings.auto_reset_after {
                self.arm_auto_reset(session.generation, after);
            }
        }

        Outcome::Applied {
            from,
            to: rule.to,
            send,
        }
    }

    fn send(&self, kind: CommandKind) -> SendStatus {
        let command = Command::from_kind(kind, self.inner.identity.clone());
        let method = command.method();
        match self.inner.sink.send(command) {
            Ok(()) => SendStatus::Sent,
            Err(e) => {
                warn!("session: {method} not sent: {e}");
                SendStatus::SendFailed
            }
        }
    }

    // ── Timers ────────────────────────────────────────────────

    fn show_notice(&self, session: &mut Session, text: &'static str) {
        if session.restore_text.is_none() {
            session.restore_text = Some(self.inner.panel.status_text());
        }
        self.inner.panel.set_status_text(text);
        session.notice_seq += 1;

        let seq = session.notice_seq;
        let generation = session.generation;
        let delay = self.inner.settings.notice_duration;
        self.spawn_timer("notice", delay, move |this, session| {
            if session.generation != generation || session.notice_seq != seq {
                return;
            }
            if let Some(prior) = session.restore_text.take() {
                this.inner.panel.set_status_text(&prior);
            }
        });
    }

    fn arm_auto_reset(&self, generation: u64, after: Duration) {
        self.spawn_timer("auto-reset", after, move |this, session| {
            if session.generation == generation {
                let _ = this.step(session, LocalEvent::AutoReset.into(), Origin::Timer);
            }
        });
    }

    /// Run `action` under the session lock after `delay`, unless shut down
    /// first.
    fn spawn_timer<F>(&self, name: &str, delay: Duration, action: F)
    where
        F: FnOnce(&Self, &mut Session) + Send + 'static,
    {
        let this = self.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("session-{name}"))
            .spawn(move || {
                if this.inner.shutdown.wait_timeout(delay) {
                    return;
                }
                let mut session = this.lock();
                action(&this, &mut session);
            });
        if let Err(e) = spawned {
            warn!("session: cannot start {name} timer: {e}");
        }
    }
}

impl<P: PanelPort, S: CommandSink> RemoteEventSink for SessionCoordinator<P, S> {
    fn on_remote_event(&self, event: RemoteEvent) {
        let _ = self.handle_remote(event);
    }
}

/// Transient text for a press the current state does not accept.
const fn notice_for(event: LocalEvent) -> Option<&'static str> {
    match event {
        LocalEvent::PressCall => Some("Cannot call a robot right now."),
        LocalEvent::PressCancel => Some("Cannot cancel any robot right now."),
        LocalEvent::PressConfirmLoad => Some("Cannot load a robot right now."),
        LocalEvent::AutoReset => None,
    }
}
