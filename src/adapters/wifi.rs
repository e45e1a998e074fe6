//! WiFi station-mode adapter.
//!
//! Implements [`LinkPort`], the hexagonal boundary the connectivity
//! supervisor drives.  Every call returns immediately: association runs
//! inside the ESP-IDF WiFi task and its progress is observed through
//! [`is_connected`](LinkPort::is_connected).  Backoff and edge tracking
//! live in [`ConnectivitySupervisor`](crate::connectivity::ConnectivitySupervisor),
//! not here.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation with a scriptable access point.

use log::{info, warn};

use crate::config::SystemConfig;
use crate::connectivity::{ConnectivityError, LinkPort};

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    nvs::EspDefaultNvsPartition,
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi},
};

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    /// Driver not started yet.
    Stopped,
    Disconnected,
    Connecting,
    Connected,
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 {
        return Err(ConnectivityError::InvalidCredentials("SSID must be 1-32 bytes"));
    }
    if !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidCredentials("SSID must be printable ASCII"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidCredentials(
            "password must be 8-64 bytes for WPA2, or empty for open",
        ));
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    connect_calls: u32,
    #[cfg(target_os = "espidf")]
    wifi: Option<EspWifi<'static>>,
    /// Simulation: whether the access point answers association requests.
    #[cfg(not(target_os = "espidf"))]
    sim_ap_up: bool,
}

impl WifiAdapter {
    /// Build the adapter from the configured credentials.
    pub fn new(config: &SystemConfig) -> Result<Self, ConnectivityError> {
        validate_ssid(&config.wifi_ssid)?;
        validate_password(&config.wifi_password)?;
        Ok(Self {
            state: WifiState::Stopped,
            ssid: config.wifi_ssid.clone(),
            password: config.wifi_password.clone(),
            connect_calls: 0,
            #[cfg(target_os = "espidf")]
            wifi: None,
            #[cfg(not(target_os = "espidf"))]
            sim_ap_up: true,
        })
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// Number of association attempts issued so far.
    pub fn connect_calls(&self) -> u32 {
        self.connect_calls
    }

    // ── Platform-specific ─────────────────────────────────────

    /// Bring up the WiFi driver in station mode.  Association is left to
    /// the supervisor's first `begin_connect`.
    #[cfg(target_os = "espidf")]
    pub fn start(
        &mut self,
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> Result<(), ConnectivityError> {
        let mut wifi =
            EspWifi::new(modem, sysloop, nvs).map_err(|_| ConnectivityError::DriverFailed)?;

        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let client = ClientConfiguration {
            ssid: self
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidCredentials("SSID too long"))?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidCredentials("password too long"))?,
            auth_method,
            ..Default::default()
        };
        wifi.set_configuration(&Configuration::Client(client))
            .map_err(|_| ConnectivityError::DriverFailed)?;
        wifi.start().map_err(|_| ConnectivityError::DriverFailed)?;

        self.wifi = Some(wifi);
        self.state = WifiState::Disconnected;
        info!("WiFi: STA started (SSID='{}')", self.ssid);
        Ok(())
    }

    /// Simulation: the driver is always startable.
    #[cfg(not(target_os = "espidf"))]
    pub fn start(&mut self) -> Result<(), ConnectivityError> {
        self.state = WifiState::Disconnected;
        info!("WiFi(sim): STA started (SSID='{}')", self.ssid);
        Ok(())
    }

    /// Simulation: make the access point appear or vanish.  Dropping it
    /// while associated drops the link.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_ap(&mut self, up: bool) {
        self.sim_ap_up = up;
        if !up && self.state != WifiState::Stopped {
            self.state = WifiState::Disconnected;
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        let wifi = self.wifi.as_mut().ok_or(ConnectivityError::NotInitialised)?;
        // Non-blocking: the driver reports the outcome through its events.
        wifi.connect().map_err(|_| ConnectivityError::DriverFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        if self.sim_ap_up {
            info!("WiFi(sim): associated with '{}'", self.ssid);
        } else {
            warn!("WiFi(sim): no answer from '{}'", self.ssid);
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if let Some(wifi) = self.wifi.as_mut() {
            let _ = wifi.disconnect();
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        info!("WiFi(sim): disconnected");
    }

    /// Associated and the station interface has an address.
    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.as_ref().is_some_and(|w| {
            w.is_connected().unwrap_or(false) && w.sta_netif().is_up().unwrap_or(false)
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_ap_up && matches!(self.state, WifiState::Connecting | WifiState::Connected)
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
        // SAFETY: plain query into a caller-owned struct; fails cleanly
        // when not associated.
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        (ret == esp_idf_svc::sys::ESP_OK).then_some(ap_info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        // Oscillate a little so diagnostics show a live value.
        let oscillation = (self.connect_calls % 12) as i8 - 6;
        Some(-60_i8.saturating_add(oscillation))
    }
}

// ───────────────────────────────────────────────────────────────
// LinkPort
// ───────────────────────────────────────────────────────────────

impl LinkPort for WifiAdapter {
    fn begin_connect(&mut self) -> Result<(), ConnectivityError> {
        if self.state == WifiState::Stopped {
            return Err(ConnectivityError::NotInitialised);
        }
        if self.platform_is_connected() {
            return Ok(());
        }
        self.connect_calls = self.connect_calls.wrapping_add(1);
        info!("WiFi: connecting to '{}' (attempt {})", self.ssid, self.connect_calls);
        self.state = WifiState::Connecting;
        self.platform_connect().inspect_err(|e| {
            warn!("WiFi: connect request rejected: {}", e);
            self.state = WifiState::Disconnected;
        })
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        if self.state != WifiState::Stopped {
            self.state = WifiState::Disconnected;
        }
        info!("WiFi: disconnected");
    }

    fn rssi(&self) -> Option<i8> {
        if self.platform_is_connected() {
            self.platform_rssi()
        } else {
            None
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
