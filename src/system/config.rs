//! Appliance configuration
//!
//! All tunables of the coordinator live in [`Config`]. Defaults match the
//! appliance as deployed; `build.rs` can override the site specific values
//! (URLs, camera id, WiFi) from environment variables at build time, which
//! [`Config::from_build_env`] picks up.
//!
//! The same firmware runs on several hardware variants (camera only,
//! gate with sensors, with or without AI detection). [`Capabilities`]
//! describes which parts are fitted; the coordinator is composed from it at
//! startup instead of carrying one build per variant.

use embassy_time::Duration;

use crate::system::error::ConfigError;

/// Hardware / feature set of one appliance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub struct Capabilities {
    /// Servo-driven gate barrier is fitted
    pub gate: bool,
    /// Entry and exit distance sensors are fitted
    pub sensors: bool,
    /// Live MJPEG stream is served
    pub stream: bool,
    /// Frames are periodically sent to the AI service
    pub detection: bool,
    /// Frames are periodically uploaded to the backend
    pub capture_upload: bool,
}

impl Capabilities {
    /// Everything fitted
    pub const FULL: Self = Self {
        gate: true,
        sensors: true,
        stream: true,
        detection: true,
        capture_upload: true,
    };

    /// Camera only: stream plus detection, no gate hardware
    pub const CAMERA_ONLY: Self = Self {
        gate: false,
        sensors: false,
        stream: true,
        detection: true,
        capture_upload: false,
    };
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::FULL
    }
}

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Name reported by `/status`
    pub device_name: &'static str,
    /// Camera id sent with uploads and gate events
    pub camera_id: &'static str,
    /// Backend base URL, e.g. `http://192.168.1.100:8080`
    pub backend_url: &'static str,
    /// AI service base URL, e.g. `http://192.168.1.100:5000`
    pub ai_service_url: &'static str,
    /// A reading below this distance (cm) is a vehicle
    pub detection_distance_cm: f64,
    /// Time the opposite sensor stays disabled after a trigger
    pub sensor_cooldown: Duration,
    /// Time the gate stays open before closing on its own
    pub gate_open_duration: Duration,
    /// Servo angle of the open barrier (degrees)
    pub gate_open_angle: f32,
    /// Servo angle of the closed barrier (degrees)
    pub gate_closed_angle: f32,
    /// Coordinator tick period
    pub tick_interval: Duration,
    /// Capture upload cadence
    pub capture_interval: Duration,
    /// AI detection cadence
    pub detection_interval: Duration,
    /// Stats fetch cadence
    pub stats_interval: Duration,
    /// Delay between two stream frames (~20 fps)
    pub stream_frame_delay: Duration,
    /// Timeout for backend requests
    pub http_timeout: Duration,
    /// Timeout for AI detection requests
    pub detection_timeout: Duration,
    /// Delay between the `/restart` reply and the reset
    pub restart_delay: Duration,
    /// Fitted hardware
    pub capabilities: Capabilities,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: "PARKING-GATE-CAM",
            camera_id: "cam1",
            backend_url: "http://192.168.1.100:8080",
            ai_service_url: "http://192.168.1.100:5000",
            detection_distance_cm: 20.0,
            sensor_cooldown: Duration::from_millis(3000),
            gate_open_duration: Duration::from_millis(5000),
            gate_open_angle: 90.0,
            gate_closed_angle: 0.0,
            tick_interval: Duration::from_millis(100),
            capture_interval: Duration::from_millis(10_000),
            detection_interval: Duration::from_millis(5000),
            stats_interval: Duration::from_millis(10_000),
            stream_frame_delay: Duration::from_millis(50),
            http_timeout: Duration::from_millis(5000),
            detection_timeout: Duration::from_millis(15_000),
            restart_delay: Duration::from_millis(2000),
            capabilities: Capabilities::FULL,
        }
    }
}

impl Config {
    /// Defaults overlaid with the values baked in by `build.rs`
    pub fn from_build_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = non_empty(option_env!("PARKING_BACKEND_URL")) {
            config.backend_url = url;
        }
        if let Some(url) = non_empty(option_env!("PARKING_AI_SERVICE_URL")) {
            config.ai_service_url = url;
        }
        if let Some(id) = non_empty(option_env!("PARKING_CAMERA_ID")) {
            config.camera_id = id;
        }
        if option_env!("PARKING_CAMERA_ONLY") == Some("true") {
            config.capabilities = Capabilities::CAMERA_ONLY;
        }
        config
    }

    /// Config for a given hardware variant
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// WiFi station configuration
#[derive(Debug, Clone)]
pub struct WifiConfig {
    /// Network SSID (max 32 chars)
    pub ssid: heapless::String<32>,
    /// WPA2 passphrase (max 63 chars)
    pub password: heapless::String<63>,
    /// Use DHCP for IP configuration
    pub use_dhcp: bool,
    /// Static IP address (used if use_dhcp = false)
    pub static_ip: [u8; 4],
    /// Gateway address (used if use_dhcp = false)
    pub gateway: [u8; 4],
}

impl WifiConfig {
    /// WiFi settings baked in by `build.rs`
    pub fn from_build_env() -> Self {
        let ssid = option_env!("WIFI_SSID").unwrap_or("");
        let password = option_env!("WIFI_PASSWORD").unwrap_or("");
        let mut config = match Self::with_credentials(ssid, password) {
            Ok(config) => config,
            Err(e) => {
                log_error!("WiFi settings rejected, running offline: {:?}", e);
                Self::default()
            }
        };
        config.use_dhcp = option_env!("WIFI_DHCP") != Some("false");
        if let Some(ip) = option_env!("WIFI_IP").and_then(parse_ipv4) {
            config.static_ip = ip;
        }
        if let Some(gateway) = option_env!("WIFI_GATEWAY").and_then(parse_ipv4) {
            config.gateway = gateway;
        }
        config
    }

    /// DHCP station config for the given network
    pub fn with_credentials(ssid: &str, password: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.ssid.push_str(ssid).map_err(|_| ConfigError::SsidTooLong)?;
        config
            .password
            .push_str(password)
            .map_err(|_| ConfigError::PasswordTooLong)?;
        Ok(config)
    }

    /// An empty SSID means the appliance runs offline
    pub fn is_configured(&self) -> bool {
        !self.ssid.is_empty()
    }
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            use_dhcp: true,
            static_ip: [0, 0, 0, 0],
            gateway: [0, 0, 0, 0],
        }
    }
}

fn non_empty(value: Option<&'static str>) -> Option<&'static str> {
    value.filter(|v| !v.is_empty())
}

/// Parse dotted quad notation
pub fn parse_ipv4(text: &str) -> Option<[u8; 4]> {
    let mut octets = [0u8; 4];
    let mut parts = text.split('.');
    for octet in octets.iter_mut() {
        *octet = parts.next()?.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(octets)
}
