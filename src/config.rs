//! Build-time configuration.
//!
//! Wi-Fi credentials are required, everything else falls back to a default
//! when the variable is not set at build time.

use heapless::String;

pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Hostname announced over DHCP when `OTA_HOSTNAME` is not set
const DEFAULT_HOSTNAME: &str = "esp-async-ota";

pub struct WifiConfig {
    pub ssid: &'static str,
    pub password: &'static str,
}

pub struct OtaConfig {
    /// Empty when the endpoints are not protected
    pub username: &'static str,
    pub password: &'static str,
    /// Replaces the hardware-derived identity when set
    pub device_id: Option<&'static str>,
    pub hostname: &'static str,
}

pub const WIFI: WifiConfig = WifiConfig {
    ssid: env!("WIFI_SSID"),
    password: env!("WIFI_PASSWORD"),
};

pub const OTA: OtaConfig = OtaConfig {
    username: or_empty(option_env!("OTA_USERNAME")),
    password: or_empty(option_env!("OTA_PASSWORD")),
    device_id: option_env!("OTA_DEVICE_ID"),
    hostname: match option_env!("OTA_HOSTNAME") {
        Some(hostname) => hostname,
        None => DEFAULT_HOSTNAME,
    },
};

const fn or_empty(value: Option<&'static str>) -> &'static str {
    match value {
        Some(value) => value,
        None => "",
    }
}

impl WifiConfig {
    /// Credentials in the bounded form the Wi-Fi driver takes.
    ///
    /// Returns `None` when either value exceeds the 802.11 limits.
    pub fn bounded(&self) -> Option<(String<32>, String<64>)> {
        let mut ssid = String::new();
        ssid.push_str(self.ssid).ok()?;
        let mut password = String::new();
        password.push_str(self.password).ok()?;
        Some((ssid, password))
    }
}
