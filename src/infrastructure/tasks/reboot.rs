//! Restart scheduler and watchdog keeper.

use async_ota_core::{Clock as _, RebootScheduler};
use embassy_time::{Duration, Timer};

use crate::infrastructure::{
    drivers::EspWatchdog,
    services::{EmbassyClock, EspRestart},
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Feed the watchdog and fire a requested restart once its delay elapsed.
#[embassy_executor::task]
pub async fn reboot_task(scheduler: &'static RebootScheduler, watchdog: EspWatchdog) {
    let clock = EmbassyClock;
    let restart = EspRestart;
    loop {
        watchdog.feed();
        scheduler.poll(clock.now_ms(), &restart);
        Timer::after(POLL_INTERVAL).await;
    }
}
