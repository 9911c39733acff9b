//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter          | Implements       | Connects to                    |
//! |------------------|------------------|--------------------------------|
//! | `console_panel`  | PanelPort        | log output, stdin key presses  |
//! | `gpio_panel`     | PanelPort        | embedded-hal output/input pins |
//! | `replay_source`  | LocationSource   | JSON-lines fix recording       |
//! | `device_id`      | (identity)       | `/sys/class/net/*/address`     |
//!
//! The remote-channel adapters (websocket link, HTTP registrar) live
//! next to the channel in [`crate::remote`].

pub mod console_panel;
pub mod device_id;
pub mod gpio_panel;
pub mod replay_source;
