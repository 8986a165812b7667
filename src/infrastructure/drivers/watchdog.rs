//! RTC watchdog shared between the update controller and the reboot task.

use core::cell::RefCell;

use async_ota_core::Watchdog;
use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use esp_hal::{
    rtc_cntl::{Rtc, RwdtStage},
    time::Duration,
};
use static_cell::make_static;

/// Timeout armed at boot, before any upload raises it
pub const BOOT_TIMEOUT_SECS: u32 = 5;

type RtcCell = Mutex<CriticalSectionRawMutex, RefCell<Rtc<'static>>>;

/// Handle to the RTC watchdog. Copies share the same timer.
#[derive(Clone, Copy)]
pub struct EspWatchdog {
    rtc: &'static RtcCell,
}

impl EspWatchdog {
    /// Take over the RTC and arm its watchdog with [`BOOT_TIMEOUT_SECS`].
    pub fn start(rtc: Rtc<'static>) -> Self {
        let rtc: &'static RtcCell = make_static!(Mutex::new(RefCell::new(rtc)));
        let mut watchdog = Self { rtc };
        watchdog.set_timeout(BOOT_TIMEOUT_SECS);
        watchdog.rtc.lock(|cell| cell.borrow_mut().rwdt.enable());
        watchdog
    }

    pub fn feed(&self) {
        self.rtc.lock(|cell| cell.borrow_mut().rwdt.feed());
    }
}

impl Watchdog for EspWatchdog {
    fn set_timeout(&mut self, timeout_secs: u32) {
        self.rtc.lock(|cell| {
            let mut rtc = cell.borrow_mut();
            rtc.rwdt.set_timeout(
                RwdtStage::Stage0,
                Duration::from_secs(u64::from(timeout_secs)),
            );
            rtc.rwdt.feed();
        });
    }
}
