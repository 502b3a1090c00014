//! Tank fill controller: Raspberry Pi entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  IolHatClient      rppal relays    JsonFileStore             │
//! │  (Sensor+Power)    (OutputPin)     (FillStore)               │
//! │  serial listener   socket listener HeadlessScreen            │
//! │                                                              │
//! │  ─────────────── Port Trait Boundary ──────────────────      │
//! │                                                              │
//! │  ┌──────────────────────┐    ┌───────────────────────────┐   │
//! │  │ FillService (poller) │    │ CommandRouter (listeners) │   │
//! │  └──────────┬───────────┘    └─────────────┬─────────────┘   │
//! │             └──────── SharedState ─────────┘                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `tankfill [config.json]`.  Log level via `RUST_LOG`
//! (default `info`).
#![deny(unused_must_use)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use log::{info, warn};
use rppal::gpio::Gpio;

use tankfill::adapters::headless::HeadlessScreen;
use tankfill::adapters::iolhat::IolHatClient;
use tankfill::adapters::lines::pump_lines;
use tankfill::adapters::log_sink::LogEventSink;
use tankfill::adapters::rpi;
use tankfill::adapters::socket::LoopbackListener;
use tankfill::adapters::store::JsonFileStore;
use tankfill::app::service::FillService;
use tankfill::config::ControllerConfig;
use tankfill::drivers::relay::{PulseWorker, Relay, RelayActuator};
use tankfill::router::{CommandRouter, RouterSettings, load_session};
use tankfill::sensors::link::{LinkSettings, SensorLink};
use tankfill::session::SharedState;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let cfg = ControllerConfig::load(path.as_deref()).context("loading configuration")?;
    info!("tankfill {} starting", env!("CARGO_PKG_VERSION"));

    let shutdown = Arc::new(AtomicBool::new(false));

    // ── Relays ────────────────────────────────────────────────
    let gpio = Gpio::new().context("opening GPIO")?;
    let pump_relay: Arc<dyn Relay> = Arc::new(RelayActuator::new(
        rpi::relay_pin(&gpio, cfg.pump_stop_gpio)?,
        "pump-stop",
    ));
    let reset_relay: Arc<dyn Relay> = Arc::new(RelayActuator::new(
        rpi::relay_pin(&gpio, cfg.flow_reset_gpio)?,
        "flow-reset",
    ));

    // ── Session, store, screen, router ────────────────────────
    let mut store = JsonFileStore::open(&cfg.store_dir)
        .with_context(|| format!("opening store in {}", cfg.store_dir.display()))?;
    let shared = SharedState::new(load_session(&mut store, &cfg));
    let pump_stop = PulseWorker::new(pump_relay, "pump-stop");
    let screen = Arc::new(HeadlessScreen::new(Arc::clone(&shutdown)));
    let router = Arc::new(CommandRouter::new(
        shared.clone(),
        screen,
        store,
        pump_stop.sharing("pump-stop"),
        PulseWorker::new(reset_relay, "flow-reset"),
        RouterSettings::from_config(&cfg),
    ));

    // ── Command listeners ─────────────────────────────────────
    match rpi::open_switch_box(&cfg.serial_device, cfg.serial_baud) {
        Ok(mut port) => {
            let router = Arc::clone(&router);
            let stop = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("serial-listener".into())
                .spawn(move || {
                    let mut sink = LogEventSink::new();
                    pump_lines(&mut port, &stop, |line| {
                        router.route(line, Instant::now(), &mut sink);
                    });
                })?;
        }
        Err(e) => warn!("serial {} unavailable ({e}), socket only", cfg.serial_device),
    }

    let listener = LoopbackListener::bind(cfg.socket_port)
        .with_context(|| format!("binding socket port {}", cfg.socket_port))?;
    {
        let router = Arc::clone(&router);
        let stop = Arc::clone(&shutdown);
        thread::Builder::new()
            .name("socket-listener".into())
            .spawn(move || {
                let mut sink = LogEventSink::new();
                listener.serve(&stop, |line| {
                    router.route(line, Instant::now(), &mut sink);
                });
            })?;
    }

    // ── Poller (runs on the main thread) ──────────────────────
    let addr: SocketAddr = cfg
        .iol_hat_addr
        .parse()
        .with_context(|| format!("bad IOL-HAT address {}", cfg.iol_hat_addr))?;
    let client = IolHatClient::new(addr);
    let link = SensorLink::new(client.clone(), client, LinkSettings::from_config(&cfg));
    let mut service = FillService::new(
        link,
        pump_stop.sharing("auto-alert"),
        shared,
        &cfg,
    );
    service.run(&shutdown, &mut LogEventSink::new());

    info!("tankfill stopped");
    Ok(())
}
