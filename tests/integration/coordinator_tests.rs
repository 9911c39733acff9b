//! Session coordinator against a mock panel and a recording sink.

use std::sync::Arc;
use std::time::Duration;

use callbot::app::coordinator::{CoordinatorSettings, SessionCoordinator};
use callbot::app::outcome::{Outcome, SendStatus};
use callbot::app::ports::PanelPort;
use callbot::drivers::indicators::{Indicator, IndicatorPattern};
use callbot::error::InvalidTransition;
use callbot::fsm::table::TRANSITIONS;
use callbot::fsm::{self, Effect, LocalEvent, Prompt, RemoteEvent, SessionEvent, SessionState};
use callbot::identity::UserIdentity;
use callbot::remote::codec::{Command, TargetState};

use crate::mock_station::{MockPanel, PanelCall, RecordingSink, wait_for};

type Coordinator = SessionCoordinator<MockPanel, RecordingSink>;

const NOTICE: Duration = Duration::from_millis(60);

fn settings() -> CoordinatorSettings {
    CoordinatorSettings {
        notice_duration: NOTICE,
        blink_half_period: Duration::from_millis(5),
        auto_reset_after: None,
    }
}

fn setup() -> (Coordinator, Arc<MockPanel>, RecordingSink) {
    let panel = Arc::new(MockPanel::new());
    let sink = RecordingSink::new();
    let c = SessionCoordinator::new(
        Arc::clone(&panel),
        sink.clone(),
        UserIdentity::new("picker_001122aabbcc").unwrap(),
        settings(),
    );
    c.start();
    (c, panel, sink)
}

/// Walk the happy path (or the cancel path) until `target` is reached.
fn drive_to(c: &Coordinator, target: SessionState) {
    if target == SessionState::Init {
        return;
    }
    if target == SessionState::Cancelled {
        let _ = c.handle_local(LocalEvent::PressCall);
        let _ = c.handle_local(LocalEvent::PressCancel);
        assert_eq!(c.state(), SessionState::Cancelled);
        return;
    }
    let steps: [SessionEvent; 5] = [
        LocalEvent::PressCall.into(),
        RemoteEvent::ServerAccepted.into(),
        RemoteEvent::ServerArrived.into(),
        LocalEvent::PressConfirmLoad.into(),
        RemoteEvent::ServerComplete.into(),
    ];
    for step in steps {
        let _ = match step {
            SessionEvent::Local(e) => c.handle_local(e),
            SessionEvent::Remote(e) => c.handle_remote(e),
        };
        if c.state() == target {
            return;
        }
    }
    panic!("could not reach {target:?}");
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn start_paints_welcome_and_dark_panel() {
    let (c, panel, sink) = setup();
    assert_eq!(c.state(), SessionState::Init);
    assert_eq!(panel.status_text(), Prompt::Welcome.text());
    assert_eq!(panel.lights(), (false, false, false));
    assert!(sink.sent().is_empty());
}

// ── Scenario A: Init + PressCall ──────────────────────────────

#[test]
fn call_from_init_sends_call_and_shows_calling() {
    let (c, panel, sink) = setup();
    let out = c.handle_local(LocalEvent::PressCall);
    assert_eq!(
        out,
        Outcome::Applied {
            from: SessionState::Init,
            to: SessionState::Called,
            send: SendStatus::Sent,
        }
    );
    assert_eq!(sink.methods(), vec!["call"]);
    assert_eq!(sink.sent()[0].user().as_str(), "picker_001122aabbcc");
    assert_eq!(panel.lights(), IndicatorPattern::Calling.levels());
    assert_eq!(panel.status_text(), Prompt::RequestSent.text());
}

// ── Scenario B: Accepted + ServerArrived ──────────────────────

#[test]
fn arrival_starts_blinking_and_shows_loading_prompt() {
    let (c, panel, _sink) = setup();
    drive_to(&c, SessionState::Accepted);
    assert!(!c.is_blinking());

    let out = c.handle_remote(RemoteEvent::ServerArrived);
    assert!(out.is_applied());
    assert_eq!(c.state(), SessionState::Arrived);
    assert!(c.is_blinking());
    assert_eq!(panel.status_text(), Prompt::Loading.text());

    panel.clear();
    assert!(wait_for(Duration::from_secs(2), || panel.writes_to(Indicator::Blue) >= 2));
    c.shutdown();
}

// ── Scenario C: Arrived + PressConfirmLoad ────────────────────

#[test]
fn confirm_load_stops_blink_before_going_dark() {
    let (c, panel, sink) = setup();
    drive_to(&c, SessionState::Arrived);
    std::thread::sleep(Duration::from_millis(20));

    let out = c.handle_local(LocalEvent::PressConfirmLoad);
    assert_eq!(out.send_status(), SendStatus::Sent);
    assert_eq!(c.state(), SessionState::Loaded);
    assert!(!c.is_blinking());
    assert_eq!(panel.lights(), (false, false, false));
    assert_eq!(panel.status_text(), Prompt::Loaded.text());

    let last = sink.sent().pop().unwrap();
    assert!(matches!(
        last,
        Command::SetState {
            state: TargetState::Loaded,
            ..
        }
    ));

    // The loop was joined: nothing toggles the load light any more.
    panel.clear();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(panel.writes_to(Indicator::Blue), 0);
    assert!(!panel.light(Indicator::Blue));
}

// ── Scenario D: Called + PressCancel ──────────────────────────

#[test]
fn cancel_while_called_sends_cancel_without_blink() {
    let (c, panel, sink) = setup();
    drive_to(&c, SessionState::Called);
    assert!(!c.is_blinking());

    let out = c.handle_local(LocalEvent::PressCancel);
    assert!(out.is_applied());
    assert_eq!(c.state(), SessionState::Cancelled);
    assert!(!c.is_blinking());
    assert_eq!(sink.methods(), vec!["call", "cancel"]);
    assert_eq!(panel.lights(), IndicatorPattern::ResetPrompt.levels());
    assert_eq!(panel.status_text(), Prompt::Cancelled.text());
}

#[test]
fn cancel_while_arrived_stops_blink() {
    let (c, _panel, sink) = setup();
    drive_to(&c, SessionState::Arrived);
    assert!(c.is_blinking());
    let _ = c.handle_local(LocalEvent::PressCancel);
    assert!(!c.is_blinking());
    assert_eq!(sink.methods().last(), Some(&"cancel"));
}

// ── Scenario E: rejected press ────────────────────────────────

#[test]
fn rejected_press_leaves_state_and_shows_notice() {
    let (c, panel, sink) = setup();
    drive_to(&c, SessionState::Loaded);
    let sent_before = sink.sent().len();

    let out = c.handle_local(LocalEvent::PressCall);
    assert_eq!(
        out,
        Outcome::Rejected(InvalidTransition {
            state: SessionState::Loaded,
            event: SessionEvent::Local(LocalEvent::PressCall),
        })
    );
    assert_eq!(c.state(), SessionState::Loaded);
    assert_eq!(sink.sent().len(), sent_before);
    assert_eq!(panel.status_text(), "Cannot call a robot right now.");

    assert!(wait_for(Duration::from_secs(2), || {
        panel.status_text() == Prompt::Loaded.text()
    }));
}

#[test]
fn notice_is_not_restored_over_a_newer_transition() {
    let (c, panel, _sink) = setup();
    let _ = c.handle_local(LocalEvent::PressConfirmLoad);
    assert_eq!(panel.status_text(), "Cannot load a robot right now.");

    let _ = c.handle_local(LocalEvent::PressCall);
    assert_eq!(panel.status_text(), Prompt::RequestSent.text());

    std::thread::sleep(NOTICE * 3);
    assert_eq!(panel.status_text(), Prompt::RequestSent.text());
}

#[test]
fn back_to_back_notices_restore_the_pre_notice_text() {
    let (c, panel, _sink) = setup();
    let _ = c.handle_local(LocalEvent::PressCancel);
    assert_eq!(panel.status_text(), "Cannot cancel any robot right now.");
    let _ = c.handle_local(LocalEvent::PressConfirmLoad);
    assert_eq!(panel.status_text(), "Cannot load a robot right now.");

    assert!(wait_for(Duration::from_secs(2), || {
        panel.status_text() == Prompt::Welcome.text()
    }));
}

#[test]
fn remote_rejection_shows_no_notice() {
    let (c, panel, _sink) = setup();
    let out = c.handle_remote(RemoteEvent::ServerComplete);
    assert!(!out.is_applied());
    assert_eq!(panel.status_text(), Prompt::Welcome.text());
}

// ── Reset and server-driven paths ─────────────────────────────

#[test]
fn complete_then_call_resets_and_notifies_server() {
    let (c, panel, sink) = setup();
    drive_to(&c, SessionState::Complete);
    assert_eq!(panel.status_text(), Prompt::Complete.text());

    let out = c.handle_local(LocalEvent::PressCall);
    assert_eq!(
        out,
        Outcome::Applied {
            from: SessionState::Complete,
            to: SessionState::Init,
            send: SendStatus::Sent,
        }
    );
    assert!(matches!(
        sink.sent().last(),
        Some(Command::SetState {
            state: TargetState::Init,
            ..
        })
    ));
    assert_eq!(panel.lights(), IndicatorPattern::Idle.levels());
    assert_eq!(panel.status_text(), Prompt::Ready.text());
}

#[test]
fn server_cancel_stops_blink_and_any_press_resets() {
    let (c, panel, sink) = setup();
    drive_to(&c, SessionState::Arrived);
    let sent_before = sink.sent().len();

    let out = c.handle_remote(RemoteEvent::ServerCancelled);
    assert_eq!(out.send_status(), SendStatus::NotAttempted);
    assert_eq!(c.state(), SessionState::Cancelled);
    assert!(!c.is_blinking());
    assert_eq!(panel.status_text(), Prompt::CancelledByServer.text());
    assert_eq!(sink.sent().len(), sent_before);

    let out = c.handle_local(LocalEvent::PressConfirmLoad);
    assert_eq!(out.send_status(), SendStatus::NotAttempted);
    assert_eq!(c.state(), SessionState::Init);
    assert_eq!(panel.status_text(), Prompt::Ready.text());
}

#[test]
fn server_connect_and_register_update_idle_panel() {
    let (c, panel, _sink) = setup();
    let _ = c.handle_remote(RemoteEvent::ServerConnected);
    assert_eq!(panel.status_text(), Prompt::Connected.text());
    assert_eq!(panel.lights(), IndicatorPattern::Connected.levels());
    let _ = c.handle_remote(RemoteEvent::ServerRegistered);
    assert_eq!(panel.status_text(), Prompt::Ready.text());
    assert_eq!(c.state(), SessionState::Init);
}

#[test]
fn offline_sink_reports_send_failed_but_transitions() {
    let (c, _panel, sink) = setup();
    sink.set_online(false);
    let out = c.handle_local(LocalEvent::PressCall);
    assert_eq!(out.send_status(), SendStatus::SendFailed);
    assert_eq!(c.state(), SessionState::Called);
    assert!(sink.sent().is_empty());
}

#[test]
fn auto_reset_leaves_cancelled_after_delay() {
    let panel = Arc::new(MockPanel::new());
    let sink = RecordingSink::new();
    let c = SessionCoordinator::new(
        Arc::clone(&panel),
        sink.clone(),
        UserIdentity::new("picker_001122aabbcc").unwrap(),
        CoordinatorSettings {
            auto_reset_after: Some(Duration::from_millis(30)),
            ..settings()
        },
    );
    c.start();
    drive_to(&c, SessionState::Cancelled);
    assert!(wait_for(Duration::from_secs(2), || c.state() == SessionState::Init));
    assert_eq!(panel.status_text(), Prompt::Ready.text());
    // Leaving Cancelled carries no command.
    assert_eq!(sink.methods(), vec!["call", "cancel"]);
    c.shutdown();
}

// ── Whole table ───────────────────────────────────────────────

const ME: &str = "picker_001122aabbcc";

/// Coordinator whose sink journals onto the panel. The blink period is
/// long enough that no toggle lands inside a test.
fn journaled() -> (Coordinator, Arc<MockPanel>, RecordingSink) {
    let panel = Arc::new(MockPanel::new());
    let sink = RecordingSink::journaling(&panel);
    let c = SessionCoordinator::new(
        Arc::clone(&panel),
        sink.clone(),
        UserIdentity::new(ME).unwrap(),
        CoordinatorSettings {
            blink_half_period: Duration::from_secs(60),
            ..settings()
        },
    );
    c.start();
    (c, panel, sink)
}

fn fire(c: &Coordinator, event: SessionEvent) -> Outcome {
    match event {
        SessionEvent::Local(e) => c.handle_local(e),
        SessionEvent::Remote(e) => c.handle_remote(e),
    }
}

/// What the panel history should read after a row's effects ran.
fn expected_calls(effects: &[Effect]) -> Vec<PanelCall> {
    let mut calls = Vec::new();
    for effect in effects {
        match *effect {
            Effect::StopBlink | Effect::StartBlink => {}
            Effect::Send(kind) => calls.push(PanelCall::Sent(Command::from_kind(
                kind,
                UserIdentity::new(ME).unwrap(),
            ))),
            Effect::Indicate(pattern) => {
                for indicator in Indicator::ALL {
                    calls.push(PanelCall::Indicator(indicator, pattern.level(indicator)));
                }
            }
            Effect::Display(prompt) => calls.push(PanelCall::Text(prompt.text().to_owned())),
        }
    }
    calls
}

#[test]
fn every_row_applies_its_effects_once_in_order() {
    for rule in TRANSITIONS {
        let (c, panel, sink) = journaled();
        drive_to(&c, rule.from);
        panel.clear();
        sink.clear();

        let out = fire(&c, rule.event);
        let expected_send = if rule.effects.iter().any(|e| matches!(e, Effect::Send(_))) {
            SendStatus::Sent
        } else {
            SendStatus::NotAttempted
        };
        assert_eq!(
            out,
            Outcome::Applied {
                from: rule.from,
                to: rule.to,
                send: expected_send,
            },
            "{:?} + {:?}",
            rule.from,
            rule.event
        );
        assert_eq!(c.state(), rule.to);
        assert_eq!(
            panel.calls(),
            expected_calls(rule.effects),
            "{:?} + {:?}",
            rule.from,
            rule.event
        );
        assert_eq!(c.is_blinking(), rule.to == SessionState::Arrived);
        c.shutdown();
    }
}

#[test]
fn every_pair_off_the_table_is_rejected_without_effects() {
    let mut checked = 0;
    for state in SessionState::ALL {
        for event in SessionEvent::ALL {
            if fsm::transition(state, event).is_ok() {
                continue;
            }
            let (c, panel, sink) = journaled();
            drive_to(&c, state);
            let blinking = c.is_blinking();
            panel.clear();
            sink.clear();

            let out = fire(&c, event);
            assert_eq!(out, Outcome::Rejected(InvalidTransition { state, event }));
            assert_eq!(c.state(), state);
            assert_eq!(c.is_blinking(), blinking);
            assert!(sink.sent().is_empty(), "{state:?} + {event:?} sent something");
            // At most the operator notice; no indicator moves.
            assert!(
                panel
                    .calls()
                    .iter()
                    .all(|call| matches!(call, PanelCall::Text(_))),
                "{state:?} + {event:?}: {:?}",
                panel.calls()
            );
            c.shutdown();
            checked += 1;
        }
    }
    assert_eq!(
        checked,
        SessionState::ALL.len() * SessionEvent::ALL.len() - TRANSITIONS.len()
    );
}

// ── Concurrency ───────────────────────────────────────────────

#[test]
fn concurrent_sources_keep_blink_in_step_with_state() {
    let (c, _panel, _sink) = setup();
    let locals = [
        LocalEvent::PressCall,
        LocalEvent::PressCancel,
        LocalEvent::PressConfirmLoad,
    ];
    let remotes = [
        RemoteEvent::ServerAccepted,
        RemoteEvent::ServerArrived,
        RemoteEvent::ServerComplete,
        RemoteEvent::ServerCancelled,
        RemoteEvent::ServerReset,
    ];

    let mut handles = Vec::new();
    for t in 0..4usize {
        let cl = c.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..200usize {
                let _ = cl.handle_local(locals[(i + t) % locals.len()]);
            }
        }));
        let cr = c.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..200usize {
                let _ = cr.handle_remote(remotes[(i * 3 + t) % remotes.len()]);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert!(SessionState::ALL.contains(&c.state()));
    assert_eq!(c.is_blinking(), c.state() == SessionState::Arrived);
    c.shutdown();
}
