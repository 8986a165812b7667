use async_ota_core::{Clock, SystemRestart};
use embassy_time::Instant;

/// Restarts the chip through a software reset.
#[derive(Debug, Clone, Copy, Default)]
pub struct EspRestart;

impl SystemRestart for EspRestart {
    fn restart(&self) {
        esp_hal::system::software_reset();
    }
}

/// Milliseconds since boot from the embassy time driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now_ms(&self) -> u32 {
        // Wraps after ~49 days, the scheduler compares with wrapping math
        Instant::now().as_millis() as u32
    }
}
