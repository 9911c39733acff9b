//! Panel over `embedded-hal` digital pins.
//!
//! Three output pins drive the indicators and three input pins carry the
//! buttons. Pin construction (numbers, pulls, polarity) belongs to the
//! board setup code; this adapter takes ready-made pins.
//!
//! The panel has no display, so the status text is kept in memory and
//! logged.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use embedded_hal::digital::{InputPin, OutputPin};
use log::{info, warn};

use crate::app::coordinator::SessionCoordinator;
use crate::app::ports::{CommandSink, PanelPort};
use crate::drivers::button::{ButtonDriver, ButtonEvent, Polarity};
use crate::drivers::indicators::Indicator;
use crate::fsm::LocalEvent;
use crate::sync::StopSignal;

/// Default button sampling period.
pub const BUTTON_POLL: Duration = Duration::from_millis(10);

struct Lights<G, R, B> {
    green: G,
    red: R,
    blue: B,
}

/// Indicator outputs plus the in-memory status line.
pub struct GpioPanel<G, R, B> {
    lights: Mutex<Lights<G, R, B>>,
    text: Mutex<String>,
}

impl<G, R, B> GpioPanel<G, R, B>
where
    G: OutputPin + Send + 'static,
    R: OutputPin + Send + 'static,
    B: OutputPin + Send + 'static,
{
    pub fn new(green: G, red: R, blue: B) -> Self {
        Self {
            lights: Mutex::new(Lights { green, red, blue }),
            text: Mutex::new(String::new()),
        }
    }
}

fn drive<P: OutputPin>(pin: &mut P, on: bool) -> Result<(), P::Error> {
    if on { pin.set_high() } else { pin.set_low() }
}

impl<G, R, B> PanelPort for GpioPanel<G, R, B>
where
    G: OutputPin + Send + 'static,
    R: OutputPin + Send + 'static,
    B: OutputPin + Send + 'static,
{
    fn set_indicator(&self, indicator: Indicator, on: bool) {
        let mut lights = self.lights.lock().unwrap_or_else(PoisonError::into_inner);
        let failed = match indicator {
            Indicator::Green => drive(&mut lights.green, on).is_err(),
            Indicator::Red => drive(&mut lights.red, on).is_err(),
            Indicator::Blue => drive(&mut lights.blue, on).is_err(),
        };
        if failed {
            warn!("gpio: failed to drive {indicator:?}");
        }
    }

    fn set_status_text(&self, text: &str) {
        let mut current = self.text.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != text {
            text.clone_into(&mut *current);
            info!("panel: {text}");
        }
    }

    fn status_text(&self) -> String {
        self.text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// The three debounced buttons.
pub struct GpioButtons<C, X, L> {
    call: ButtonDriver<C>,
    cancel: ButtonDriver<X>,
    load: ButtonDriver<L>,
}

impl<C: InputPin, X: InputPin, L: InputPin> GpioButtons<C, X, L> {
    /// All three buttons share one wiring polarity.
    pub fn new(call: C, cancel: X, load: L, polarity: Polarity) -> Self {
        Self {
            call: ButtonDriver::new(call, polarity),
            cancel: ButtonDriver::new(cancel, polarity),
            load: ButtonDriver::new(load, polarity),
        }
    }

    /// Sample every button once. Read errors are logged and count as
    /// "not pressed".
    pub fn poll(&mut self, now_ms: u32) -> heapless::Vec<LocalEvent, 3> {
        let mut events = heapless::Vec::new();
        if pressed(self.call.poll(now_ms), "call") {
            let _ = events.push(LocalEvent::PressCall);
        }
        if pressed(self.cancel.poll(now_ms), "cancel") {
            let _ = events.push(LocalEvent::PressCancel);
        }
        if pressed(self.load.poll(now_ms), "load") {
            let _ = events.push(LocalEvent::PressConfirmLoad);
        }
        events
    }
}

fn pressed<E: core::fmt::Debug>(result: Result<Option<ButtonEvent>, E>, name: &str) -> bool {
    match result {
        Ok(Some(ButtonEvent::Pressed)) => true,
        Ok(None) => false,
        Err(e) => {
            warn!("gpio: {name} button read failed: {e:?}");
            false
        }
    }
}

/// Sample the buttons every `period` and feed presses into the
/// coordinator until `stop` fires.
pub fn run_buttons<C, X, L, P, S>(
    mut buttons: GpioButtons<C, X, L>,
    coordinator: &SessionCoordinator<P, S>,
    stop: &StopSignal,
    period: Duration,
) where
    C: InputPin,
    X: InputPin,
    L: InputPin,
    P: PanelPort,
    S: CommandSink,
{
    let epoch = Instant::now();
    loop {
        #[allow(clippy::cast_possible_truncation)]
        let now_ms = epoch.elapsed().as_millis() as u32;
        for event in buttons.poll(now_ms) {
            let _ = coordinator.handle_local(event);
        }
        if stop.wait_timeout(period) {
            break;
        }
    }
}
