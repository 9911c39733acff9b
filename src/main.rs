//! Robot-call station: main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  ConsolePanel      ReplaySource      WsConnector  HttpRegistrar
//! │  (PanelPort)       (LocationSource)  (Connector)  (Registrar)│
//! │                                                              │
//! │  ─────────────── Port Trait Boundary ──────────────────      │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │  SessionCoordinator (FSM · blink · notices)            │  │
//! │  │  LocationRelay                                         │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                                                              │
//! │  RemoteChannel (io worker · registration worker)             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use tracing_subscriber::EnvFilter;

use callbot::adapters::console_panel::{self, ConsolePanel};
use callbot::adapters::device_id;
use callbot::adapters::replay_source::ReplaySource;
use callbot::app::coordinator::SessionCoordinator;
use callbot::app::relay::{LocationRelay, RelayMode};
use callbot::config::StationConfig;
use callbot::remote::RemoteChannel;
use callbot::remote::register::HttpRegistrar;
use callbot::remote::ws::WsConnector;
use callbot::sync::StopSignal;

/// Spacing of replayed fixes when no `GPS_RATE` is configured.
const REPLAY_INTERVAL: Duration = Duration::from_secs(1);

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    // ── 1. Logging + configuration ────────────────────────────
    init_logging();
    info!("callbot v{}", env!("CARGO_PKG_VERSION"));

    let config = StationConfig::from_env().context("loading configuration")?;
    let identity = device_id::resolve_identity(config.username.as_deref())
        .context("resolving station identity")?;
    info!("station identity: {identity}");

    // ── 2. Remote channel ─────────────────────────────────────
    let remote_settings = config.remote_settings();
    let connector = WsConnector::new(
        &config.ws_address,
        config.connect_timeout(),
        remote_settings.poll_interval,
    );
    let registrar = HttpRegistrar::new(&config.site_address, config.connect_timeout())
        .context("building registration client")?;
    let mut remote = RemoteChannel::new(remote_settings, identity.clone(), connector, registrar);

    // ── 3. Session coordinator ────────────────────────────────
    let panel = Arc::new(ConsolePanel::new());
    let coordinator = SessionCoordinator::new(
        Arc::clone(&panel),
        remote.sender(),
        identity.clone(),
        config.coordinator_settings(),
    );
    coordinator.start();
    remote
        .start(coordinator.clone())
        .context("starting remote channel")?;

    // ── 4. Operator input ─────────────────────────────────────
    let stop = Arc::new(StopSignal::new());
    {
        let coordinator = coordinator.clone();
        let stop = Arc::clone(&stop);
        std::thread::Builder::new()
            .name("console-input".into())
            .spawn(move || console_panel::run_input(io::stdin().lock(), &coordinator, &stop))
            .context("spawning console input")?;
    }
    info!("keys: g = call, r = cancel, b = confirm load, q = quit");

    // ── 5. Location relay ─────────────────────────────────────
    match &config.gps_replay_file {
        Some(path) => {
            let relay = LocationRelay::new(remote.sender(), identity, config.relay_mode());
            let interval = match relay.mode() {
                RelayMode::FixedRate(period) => period,
                RelayMode::Push => REPLAY_INTERVAL,
            };
            let mut source = ReplaySource::from_file(path, interval);
            match relay.run(&mut source, &stop) {
                Ok(report) => info!("location replay finished: {report:?}"),
                Err(e) => warn!("location relay stopped: {e}"),
            }
        }
        None => info!("no location source configured, relay disabled"),
    }

    // ── 6. Run until quit ─────────────────────────────────────
    while !stop.wait_timeout(Duration::from_secs(60)) {}

    info!("shutting down");
    coordinator.shutdown();
    remote.stop();
    Ok(())
}
