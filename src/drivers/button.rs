//! Debounced push-button driver over `embedded-hal` input pins.
//!
//! ## Hardware
//!
//! Momentary switch per button, usually active-low with a pull-up. The
//! panel poller samples every pin at a fixed cadence and calls
//! [`ButtonDriver::poll`]; the debounce state machine below turns the raw
//! samples into one [`ButtonEvent::Pressed`] per physical press.
//!
//! | Parameter        | Default | Meaning                                   |
//! |------------------|---------|-------------------------------------------|
//! | `DEBOUNCE_MS`    | 50      | level must hold this long to be accepted  |
//! | `LOCKOUT_MS`     | 200     | minimum gap between two reported presses  |

use embedded_hal::digital::InputPin;

pub const DEBOUNCE_MS: u32 = 50;
pub const LOCKOUT_MS: u32 = 200;

/// Button events emitted after debouncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Pressed,
}

/// Pin-independent debounce state machine.
#[derive(Debug, Clone)]
pub struct Debouncer {
    /// Accepted (debounced) level; `true` = pressed.
    stable: bool,
    /// A level that differs from `stable`, and when it was first seen.
    candidate: Option<(bool, u32)>,
    last_press_ms: Option<u32>,
    debounce_ms: u32,
    lockout_ms: u32,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::with_timing(DEBOUNCE_MS, LOCKOUT_MS)
    }

    pub fn with_timing(debounce_ms: u32, lockout_ms: u32) -> Self {
        Self {
            stable: false,
            candidate: None,
            last_press_ms: None,
            debounce_ms,
            lockout_ms,
        }
    }

    /// Feed one raw sample. `now_ms` is a monotonic millisecond clock.
    pub fn update(&mut self, now_ms: u32, pressed: bool) -> Option<ButtonEvent> {
        if pressed == self.stable {
            self.candidate = None;
            return None;
        }

        match self.candidate {
            Some((level, since)) if level == pressed => {
                if now_ms.wrapping_sub(since) < self.debounce_ms {
                    return None;
                }
                self.stable = pressed;
                self.candidate = None;
                if !pressed {
                    return None;
                }
                let locked = self
                    .last_press_ms
                    .is_some_and(|last| now_ms.wrapping_sub(last) < self.lockout_ms);
                if locked {
                    return None;
                }
                self.last_press_ms = Some(now_ms);
                Some(ButtonEvent::Pressed)
            }
            _ => {
                self.candidate = Some((pressed, now_ms));
                None
            }
        }
    }

    /// Current debounced level.
    pub fn is_pressed(&self) -> bool {
        self.stable
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}

/// Which pin level means "pressed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Pull-up, switch to ground.
    ActiveLow,
    /// Pull-down, switch to supply.
    ActiveHigh,
}

/// One button wired to an input pin.
pub struct ButtonDriver<P> {
    pin: P,
    polarity: Polarity,
    debouncer: Debouncer,
}

impl<P: InputPin> ButtonDriver<P> {
    pub fn new(pin: P, polarity: Polarity) -> Self {
        Self {
            pin,
            polarity,
            debouncer: Debouncer::new(),
        }
    }

    /// Sample the pin once and run the debouncer.
    pub fn poll(&mut self, now_ms: u32) -> Result<Option<ButtonEvent>, P::Error> {
        let high = self.pin.is_high()?;
        let pressed = match self.polarity {
            Polarity::ActiveLow => !high,
            Polarity::ActiveHigh => high,
        };
        Ok(self.debouncer.update(now_ms, pressed))
    }
}
