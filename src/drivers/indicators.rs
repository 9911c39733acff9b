//! Indicator patterns for the three-button panel.
//!
//! Each button carries its own indicator light. A pattern is a named
//! combination of the three, chosen by the transition table; the blink
//! loop only ever toggles the load indicator on top of the current
//! pattern.
//!
//! | Pattern      | Green (call) | Red (cancel) | Blue (load) |
//! |--------------|--------------|--------------|-------------|
//! | Dark         | off          | off          | off         |
//! | Connected    | on           | on           | on          |
//! | Idle         | on           | off          | off         |
//! | Calling      | off          | on           | off         |
//! | EnRoute      | off          | on           | off         |
//! | Loading      | off          | on           | on (blinks) |
//! | ResetPrompt  | on           | on           | on          |

use crate::app::ports::PanelPort;

/// One physical indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    /// Next to the call button.
    Green,
    /// Next to the cancel button.
    Red,
    /// Next to the confirm-load button.
    Blue,
}

impl Indicator {
    pub const ALL: [Indicator; 3] = [Self::Green, Self::Red, Self::Blue];
}

/// Named indicator combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorPattern {
    Dark,
    Connected,
    Idle,
    Calling,
    EnRoute,
    Loading,
    ResetPrompt,
}

impl IndicatorPattern {
    /// `(green, red, blue)` levels.
    pub const fn levels(self) -> (bool, bool, bool) {
        match self {
            Self::Dark => (false, false, false),
            Self::Connected | Self::ResetPrompt => (true, true, true),
            Self::Idle => (true, false, false),
            Self::Calling | Self::EnRoute => (false, true, false),
            Self::Loading => (false, true, true),
        }
    }

    pub const fn level(self, indicator: Indicator) -> bool {
        let (g, r, b) = self.levels();
        match indicator {
            Indicator::Green => g,
            Indicator::Red => r,
            Indicator::Blue => b,
        }
    }

    /// Write every indicator of this pattern to the panel.
    pub fn apply(self, panel: &impl PanelPort) {
        for indicator in Indicator::ALL {
            panel.set_indicator(indicator, self.level(indicator));
        }
    }
}
