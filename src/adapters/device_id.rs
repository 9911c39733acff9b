//! Station identity derived from the host's hardware address.
//!
//! Produces a stable identity of the form `picker_<12 lowercase hex
//! digits>` from the first non-loopback, non-zero MAC address found under
//! `/sys/class/net`. A configured `USERNAME` takes precedence; see
//! [`resolve_identity`].

use core::fmt::Write;
use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::error::ConfigError;
use crate::identity::UserIdentity;

/// 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// `picker_` + 12 hex digits.
pub type IdentityString = heapless::String<19>;

const NET_CLASS_DIR: &str = "/sys/class/net";

/// Parse `aa:bb:cc:dd:ee:ff` (either case).
pub fn parse_mac(text: &str) -> Option<MacAddress> {
    let mut mac = [0u8; 6];
    let mut parts = text.trim().split(':');
    for byte in &mut mac {
        let part = parts.next()?;
        if part.len() != 2 {
            return None;
        }
        *byte = u8::from_str_radix(part, 16).ok()?;
    }
    parts.next().is_none().then_some(mac)
}

/// First usable MAC under `dir`, interfaces visited in name order.
pub fn read_mac_from(dir: &Path) -> Option<MacAddress> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.file_name()))
        .filter(|name| name != "lo")
        .collect();
    names.sort();

    names.into_iter().find_map(|name| {
        let text = fs::read_to_string(dir.join(&name).join("address")).ok()?;
        let mac = parse_mac(&text)?;
        if mac == [0u8; 6] {
            return None;
        }
        debug!("identity: using {} from {name:?}", format_mac(&mac));
        Some(mac)
    })
}

/// First usable MAC of this host.
pub fn read_mac() -> Option<MacAddress> {
    read_mac_from(Path::new(NET_CLASS_DIR))
}

fn format_mac(mac: &MacAddress) -> heapless::String<17> {
    let mut s = heapless::String::new();
    for (i, b) in mac.iter().enumerate() {
        let sep = if i == 0 { "" } else { ":" };
        let _ = write!(s, "{sep}{b:02x}");
    }
    s
}

/// `picker_` followed by the MAC in lowercase hex without separators.
pub fn picker_identity(mac: &MacAddress) -> IdentityString {
    let mut id = IdentityString::new();
    let _ = id.push_str("picker_");
    for b in mac {
        let _ = write!(id, "{b:02x}");
    }
    id
}

/// The configured name if any, else the MAC-derived one.
pub fn resolve_identity(configured: Option<&str>) -> Result<UserIdentity, ConfigError> {
    resolve_identity_with(configured, read_mac)
}

pub fn resolve_identity_with(
    configured: Option<&str>,
    mac: impl FnOnce() -> Option<MacAddress>,
) -> Result<UserIdentity, ConfigError> {
    if let Some(name) = configured {
        return UserIdentity::new(name);
    }
    let mac = mac().ok_or(ConfigError::Identity(
        "USERNAME not set and no network hardware address found",
    ))?;
    let identity = UserIdentity::new(picker_identity(&mac).as_str())?;
    info!("identity: derived {identity} from hardware address");
    Ok(identity)
}
