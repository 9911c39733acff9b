//! Remote channel against an in-memory connector and registrar.
//!
//! Every `connect()` hands the test a [`ServerEnd`]: pushing into it feeds
//! the station, dropping it kills the link.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use callbot::app::coordinator::{CoordinatorSettings, SessionCoordinator};
use callbot::app::ports::{CommandSink, RemoteEventSink};
use callbot::error::{RegistrationError, TransportError};
use callbot::fsm::{CommandKind, LocalEvent, RemoteEvent, SessionState};
use callbot::identity::UserIdentity;
use callbot::remote::codec::{self, Command};
use callbot::remote::register::Registrar;
use callbot::remote::transport::{Connector, Link};
use callbot::remote::{ConnectionStatus, RemoteChannel, RemoteSettings};

use crate::mock_station::{MockPanel, wait_for};

const ME: &str = "picker_001122aabbcc";
const WAIT: Duration = Duration::from_secs(5);

// ── Fake transport ────────────────────────────────────────────

/// The server's half of one link.
struct ServerEnd {
    to_station: Sender<String>,
    from_station: Receiver<String>,
}

impl ServerEnd {
    fn push_state(&self, user: &str, state: &str) {
        let text = format!(r#"{{"method":"update_orders","states":{{"{user}":"{state}"}}}}"#);
        self.to_station.send(text).unwrap();
    }

    fn push_raw(&self, text: &str) {
        self.to_station.send(text.to_owned()).unwrap();
    }

    fn next_command(&self) -> Command {
        let text = self.from_station.recv_timeout(WAIT).unwrap();
        codec::decode_command(&text).unwrap()
    }
}

struct FakeConnector {
    accepted: Sender<ServerEnd>,
    poll: Duration,
}

struct FakeLink {
    inbound: Option<Receiver<String>>,
    outbound: Option<Sender<String>>,
    poll: Duration,
}

impl Connector for FakeConnector {
    type Link = FakeLink;

    fn connect(&mut self) -> Result<FakeLink, TransportError> {
        let (to_station, inbound) = mpsc::channel();
        let (outbound, from_station) = mpsc::channel();
        self.accepted
            .send(ServerEnd {
                to_station,
                from_station,
            })
            .map_err(|_| TransportError::Connect("test server gone".into()))?;
        Ok(FakeLink {
            inbound: Some(inbound),
            outbound: Some(outbound),
            poll: self.poll,
        })
    }
}

impl Link for FakeLink {
    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        let out = self.outbound.as_ref().ok_or(TransportError::Closed)?;
        out.send(text.to_owned())
            .map_err(|_| TransportError::Io("peer gone".into()))
    }

    fn recv_text(&mut self) -> Result<Option<String>, TransportError> {
        let inbound = self.inbound.as_ref().ok_or(TransportError::Closed)?;
        match inbound.recv_timeout(self.poll) {
            Ok(text) => Ok(Some(text)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Io("peer gone".into())),
        }
    }

    fn close(&mut self) {
        self.inbound = None;
        self.outbound = None;
    }
}

// ── Fake registrar ────────────────────────────────────────────

#[derive(Clone)]
struct FakeRegistrar {
    allow: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
    successes: Arc<AtomicUsize>,
}

impl FakeRegistrar {
    fn new() -> Self {
        Self {
            allow: Arc::new(AtomicBool::new(true)),
            calls: Arc::new(AtomicUsize::new(0)),
            successes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Registrar for FakeRegistrar {
    fn register(&mut self, identity: &UserIdentity) -> Result<(), RegistrationError> {
        assert_eq!(identity.as_str(), ME);
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.allow.load(Ordering::SeqCst) {
            self.successes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        } else {
            Err(RegistrationError::Rejected(503))
        }
    }
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Clone, Default)]
struct EventLog(Arc<Mutex<Vec<RemoteEvent>>>);

impl EventLog {
    fn events(&self) -> Vec<RemoteEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl RemoteEventSink for EventLog {
    fn on_remote_event(&self, event: RemoteEvent) {
        self.0.lock().unwrap().push(event);
    }
}

// ── Harness ───────────────────────────────────────────────────

fn identity() -> UserIdentity {
    UserIdentity::new(ME).unwrap()
}

fn settings() -> RemoteSettings {
    RemoteSettings {
        poll_interval: Duration::from_millis(10),
        reconnect_initial: Duration::from_millis(5),
        reconnect_max: Duration::from_millis(20),
    }
}

fn channel() -> (
    RemoteChannel<FakeConnector, FakeRegistrar>,
    Receiver<ServerEnd>,
    FakeRegistrar,
) {
    let (accepted, connections) = mpsc::channel();
    let registrar = FakeRegistrar::new();
    let ch = RemoteChannel::new(
        settings(),
        identity(),
        FakeConnector {
            accepted,
            poll: Duration::from_millis(10),
        },
        registrar.clone(),
    );
    (ch, connections, registrar)
}

fn call() -> Command {
    Command::from_kind(CommandKind::Call, identity())
}

// ── Tests ─────────────────────────────────────────────────────

#[test]
fn connects_registers_and_delivers_our_pushes() {
    let (mut ch, connections, registrar) = channel();
    let log = EventLog::default();
    ch.start(log.clone()).unwrap();

    let server = connections.recv_timeout(WAIT).unwrap();
    assert!(wait_for(WAIT, || ch.status() == ConnectionStatus::Connected));
    assert!(registrar.successes.load(Ordering::SeqCst) >= 1);

    server.push_state("someone_else", "car_ARRIVED");
    server.push_state(ME, "car_ACCEPTED");
    assert!(wait_for(WAIT, || !log.events().is_empty()));
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(log.events(), vec![RemoteEvent::ServerAccepted]);

    ch.stop();
}

#[test]
fn echoes_and_garbage_are_not_delivered() {
    let (mut ch, connections, _registrar) = channel();
    let log = EventLog::default();
    ch.start(log.clone()).unwrap();
    let server = connections.recv_timeout(WAIT).unwrap();
    assert!(wait_for(WAIT, || ch.status() == ConnectionStatus::Connected));

    server.push_raw("not json at all");
    server.push_state(ME, "car_FLYING");
    server.push_state(ME, "car_CALLED");
    server.push_raw(r#"{"method":"ping"}"#);
    server.push_state(ME, "car_COMPLETE");

    assert!(wait_for(WAIT, || !log.events().is_empty()));
    assert_eq!(log.events(), vec![RemoteEvent::ServerComplete]);
    assert_eq!(ch.status(), ConnectionStatus::Connected);
    ch.stop();
}

#[test]
fn send_is_refused_until_connected_then_reaches_server() {
    let (mut ch, connections, registrar) = channel();
    registrar.allow.store(false, Ordering::SeqCst);
    let sender = ch.sender();
    assert!(matches!(sender.send(call()), Err(TransportError::NotConnected)));

    ch.start(EventLog::default()).unwrap();
    let server = connections.recv_timeout(WAIT).unwrap();

    // Link is up but registration keeps failing.
    assert!(wait_for(WAIT, || registrar.calls.load(Ordering::SeqCst) >= 2));
    assert!(matches!(sender.send(call()), Err(TransportError::NotConnected)));
    assert_eq!(ch.status(), ConnectionStatus::Unconnected);

    registrar.allow.store(true, Ordering::SeqCst);
    assert!(wait_for(WAIT, || ch.status() == ConnectionStatus::Connected));
    sender.send(call()).unwrap();
    assert_eq!(server.next_command(), call());

    ch.stop();
}

// Scenario F: the link drops mid-session. Nothing is delivered until the
// station has reconnected and re-registered; then delivery resumes.
#[test]
fn reconnect_gates_delivery_on_reregistration() {
    let (mut ch, connections, registrar) = channel();
    let log = EventLog::default();
    ch.start(log.clone()).unwrap();

    let first = connections.recv_timeout(WAIT).unwrap();
    assert!(wait_for(WAIT, || ch.status() == ConnectionStatus::Connected));
    first.push_state(ME, "car_ACCEPTED");
    assert!(wait_for(WAIT, || log.events().len() == 1));

    // Server goes away; re-registration is refused for now.
    registrar.allow.store(false, Ordering::SeqCst);
    let successes_before = registrar.successes.load(Ordering::SeqCst);
    drop(first);

    let second = connections.recv_timeout(WAIT).unwrap();
    assert!(wait_for(WAIT, || ch.status() == ConnectionStatus::Reconnecting));
    second.push_state(ME, "car_ARRIVED");
    assert!(matches!(ch.sender().send(call()), Err(TransportError::NotConnected)));

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(log.events(), vec![RemoteEvent::ServerAccepted]);

    registrar.allow.store(true, Ordering::SeqCst);
    assert!(wait_for(WAIT, || log.events().len() == 2));
    assert_eq!(
        log.events(),
        vec![RemoteEvent::ServerAccepted, RemoteEvent::ServerArrived]
    );
    assert_eq!(ch.status(), ConnectionStatus::Connected);
    assert!(registrar.successes.load(Ordering::SeqCst) > successes_before);

    ch.stop();
}

#[test]
fn stop_is_prompt_and_closes_the_link() {
    let (mut ch, connections, _registrar) = channel();
    ch.start(EventLog::default()).unwrap();
    let server = connections.recv_timeout(WAIT).unwrap();
    assert!(wait_for(WAIT, || ch.status() == ConnectionStatus::Connected));

    let started = Instant::now();
    ch.stop();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(ch.status(), ConnectionStatus::Closed);
    assert!(matches!(
        server.from_station.recv_timeout(WAIT),
        Err(RecvTimeoutError::Disconnected)
    ));
    assert!(matches!(ch.sender().send(call()), Err(TransportError::Closed)));
}

#[test]
fn end_to_end_call_and_server_driven_session() {
    let (mut ch, connections, _registrar) = channel();
    let panel = Arc::new(MockPanel::new());
    let coordinator = SessionCoordinator::new(
        Arc::clone(&panel),
        ch.sender(),
        identity(),
        CoordinatorSettings::default(),
    );
    coordinator.start();
    ch.start(coordinator.clone()).unwrap();

    let server = connections.recv_timeout(WAIT).unwrap();
    assert!(wait_for(WAIT, || ch.status() == ConnectionStatus::Connected));
    server.push_state(ME, "REGISTERED");

    let _ = coordinator.handle_local(LocalEvent::PressCall);
    assert_eq!(server.next_command(), call());

    server.push_state(ME, "car_ACCEPTED");
    server.push_state(ME, "car_ARRIVED");
    assert!(wait_for(WAIT, || coordinator.state() == SessionState::Arrived));
    assert!(coordinator.is_blinking());

    let _ = coordinator.handle_local(LocalEvent::PressConfirmLoad);
    assert_eq!(
        server.next_command(),
        Command::from_kind(CommandKind::SetLoaded, identity())
    );
    assert!(!coordinator.is_blinking());

    server.push_state(ME, "car_LOADED");
    server.push_state(ME, "car_COMPLETE");
    assert!(wait_for(WAIT, || coordinator.state() == SessionState::Complete));

    coordinator.shutdown();
    ch.stop();
}
