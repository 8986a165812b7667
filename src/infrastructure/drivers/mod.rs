mod chip;
mod random;
mod watchdog;
pub mod wifi_sta;

pub use chip::hardware_id;
pub use watchdog::{BOOT_TIMEOUT_SECS, EspWatchdog};
pub use wifi_sta::start_wifi_sta;
