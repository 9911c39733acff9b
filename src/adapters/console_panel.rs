//! Console panel for headless hosts.
//!
//! Output goes to the log: status-text changes at `info`, indicator
//! changes at `debug`. Input comes from a line-oriented reader
//! (normally stdin), one command per line:
//!
//! | Line               | Event              |
//! |--------------------|--------------------|
//! | `g`, `green`, `call`   | `PressCall`        |
//! | `r`, `red`, `cancel`   | `PressCancel`      |
//! | `b`, `blue`, `load`    | `PressConfirmLoad` |
//! | `q`, `quit`            | stop the station   |

use std::io::BufRead;
use std::sync::{Mutex, PoisonError};

use log::{debug, info, warn};

use crate::app::coordinator::SessionCoordinator;
use crate::app::ports::{CommandSink, PanelPort};
use crate::drivers::indicators::Indicator;
use crate::fsm::LocalEvent;
use crate::sync::StopSignal;

#[derive(Default)]
struct ConsoleState {
    text: String,
    /// Green, red, blue.
    lights: [bool; 3],
}

/// [`PanelPort`] that renders to the log.
#[derive(Default)]
pub struct ConsolePanel {
    state: Mutex<ConsoleState>,
}

impl ConsolePanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indicator(&self, indicator: Indicator) -> bool {
        self.lock().lights[slot(indicator)]
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ConsoleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

const fn slot(indicator: Indicator) -> usize {
    match indicator {
        Indicator::Green => 0,
        Indicator::Red => 1,
        Indicator::Blue => 2,
    }
}

impl PanelPort for ConsolePanel {
    fn set_indicator(&self, indicator: Indicator, on: bool) {
        let mut state = self.lock();
        let light = &mut state.lights[slot(indicator)];
        if *light != on {
            *light = on;
            debug!("panel: {indicator:?} {}", if on { "on" } else { "off" });
        }
    }

    fn set_status_text(&self, text: &str) {
        let mut state = self.lock();
        if state.text != text {
            text.clone_into(&mut state.text);
            info!("panel: {text}");
        }
    }

    fn status_text(&self) -> String {
        self.lock().text.clone()
    }
}

/// One parsed console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleInput {
    Press(LocalEvent),
    Quit,
}

pub fn parse_line(line: &str) -> Option<ConsoleInput> {
    Some(match line.trim().to_ascii_lowercase().as_str() {
        "g" | "green" | "call" => ConsoleInput::Press(LocalEvent::PressCall),
        "r" | "red" | "cancel" => ConsoleInput::Press(LocalEvent::PressCancel),
        "b" | "blue" | "load" => ConsoleInput::Press(LocalEvent::PressConfirmLoad),
        "q" | "quit" => ConsoleInput::Quit,
        _ => return None,
    })
}

/// Feed presses from `reader` into the coordinator until end of input,
/// a quit line, or `stop`. Triggers `stop` on quit or end of input.
pub fn run_input<R, P, S>(reader: R, coordinator: &SessionCoordinator<P, S>, stop: &StopSignal)
where
    R: BufRead,
    P: PanelPort,
    S: CommandSink,
{
    for line in reader.lines() {
        if stop.is_set() {
            return;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("console: read failed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Some(ConsoleInput::Press(event)) => {
                let _ = coordinator.handle_local(event);
            }
            Some(ConsoleInput::Quit) => break,
            None => warn!("console: unknown command {:?} (g/r/b/q)", line.trim()),
        }
    }
    info!("console: input closed, stopping");
    stop.trigger();
}
