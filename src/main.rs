//! GymGate Firmware: Main Entry Point
//!
//! Hexagonal architecture driven by a single cooperative tick loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   NvsAdapter   Esp32Time       │
//! │  (ActuatorPort)    (EventSink)    (ConfigPort) (clock)         │
//! │  WifiAdapter       ValidationClient<TcpHttpTransport>          │
//! │  (LinkPort)        (ValidationPort)                            │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │          AccessController (pure logic)                 │    │
//! │  │  FSM · QR assembler · Feedback timers                  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  ConnectivitySupervisor · Button · Scanner UART · Watchdog     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::{Result, anyhow};
use log::{LevelFilter, debug, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;

use gymgate::adapters::device_id::DeviceId;
use gymgate::adapters::hardware::HardwareAdapter;
use gymgate::adapters::http_transport::TcpHttpTransport;
use gymgate::adapters::log_sink::LogEventSink;
use gymgate::adapters::nvs::{self, NvsAdapter};
use gymgate::adapters::time::Esp32TimeAdapter;
use gymgate::adapters::wifi::WifiAdapter;
use gymgate::app::service::AccessController;
use gymgate::backend::ValidationClient;
use gymgate::connectivity::{ConnectivitySupervisor, LinkPort};
use gymgate::diagnostics::{self, RuntimeMetrics};
use gymgate::drivers::{self, button::ButtonDriver, uart::ScannerUart};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  GymGate v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    diagnostics::install_panic_handler();
    let clock = Esp32TimeAdapter::new();

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let config = nvs::load_or_default(&nvs);
    config
        .validate()
        .map_err(|e| anyhow!("compiled-in config invalid: {e}"))?;

    if !config.debug_output {
        log::set_max_level(LevelFilter::Info);
    }

    // ── 3. Peripherals ────────────────────────────────────────
    drivers::hw_init::init_peripherals(&config.pins, config.serial_baud)
        .map_err(|e| anyhow!("HAL init failed: {e}"))?;
    if let Err(e) = drivers::hw_init::init_isr_service(&config.pins) {
        warn!("ISR service init failed: {} (manual button disabled)", e);
    }
    let mut watchdog = drivers::watchdog::Watchdog::new();

    let dev_id = DeviceId::of_this_board();
    info!("Device ID: {}", dev_id);

    let mut hw = HardwareAdapter::new(&config.pins);
    let mut sink = LogEventSink::new();
    let mut button = ButtonDriver::new(&config);
    let mut scanner = ScannerUart::new();

    // ── 4. Network ────────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    let mut wifi = WifiAdapter::new(&config).map_err(|e| anyhow!("WiFi config: {e}"))?;
    wifi.start(peripherals.modem, sysloop, None)
        .map_err(|e| anyhow!("WiFi start: {e}"))?;
    let mut supervisor = ConnectivitySupervisor::new(&config, clock.uptime_ms());

    let mut backend = ValidationClient::new(
        &config,
        dev_id.as_str(),
        TcpHttpTransport::new(),
        TcpHttpTransport::new(),
    );

    // ── 5. Application core ───────────────────────────────────
    let mut app = AccessController::new(config.clone(), dev_id.as_str());
    app.start(clock.uptime_ms(), &mut hw, &mut sink);

    info!("System ready. Entering control loop.");

    // ── 6. Control loop ───────────────────────────────────────
    let interval = u64::from(config.control_loop_interval_ms);
    let metrics_every = u64::from(config.status_interval_ms);
    let mut next_metrics = clock.uptime_ms() + metrics_every;
    let mut loop_cycles: u64 = 0;

    loop {
        let now = clock.uptime_ms();

        scanner.drain(|byte| app.push_scanner_byte(byte, now, &mut sink));

        if let Some(gesture) = button.tick(now as u32) {
            info!("Button: {:?}", gesture);
            app.handle_command(gesture.command(), now, &mut hw, &mut sink);
        }

        let link = supervisor.poll(now, &mut wifi);
        app.tick(now, link, &mut hw, &mut backend, &mut sink);

        watchdog.feed();
        loop_cycles += 1;

        if now >= next_metrics {
            let m = RuntimeMetrics::collect(now, loop_cycles, wifi.rssi());
            debug!(
                "METRICS | up={}ms loops={} wdt_feeds={} heap={}/{} rssi={:?} state={} \
                 link_down={}ms reconnects={} backoff={}ms",
                m.uptime_ms,
                m.loop_cycles,
                watchdog.feeds(),
                m.heap_free,
                m.heap_min_free,
                m.wifi_rssi,
                app.state().label(),
                supervisor.status().down_for(now),
                supervisor.attempts(),
                supervisor.current_backoff_ms()
            );
            next_metrics = now + metrics_every;
        }

        let spent = clock.uptime_ms().saturating_sub(now);
        std::thread::sleep(Duration::from_millis(interval.saturating_sub(spent).max(1)));
    }
}
