use async_ota_core::{FlashUpdater, UpdateController};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex::Mutex};
use esp_storage::FlashStorage;

use crate::infrastructure::{
    drivers::EspWatchdog,
    services::{EmbassyClock, EspPartitionLayout},
};

/// Update backend writing straight into the SPI flash
pub type FlashBackend = FlashUpdater<FlashStorage<'static>, EspPartitionLayout>;

pub type OtaControllerImpl =
    UpdateController<'static, FlashBackend, EspWatchdog, EmbassyClock>;

/// Held by the HTTP server for the whole request
pub type OtaControllerMutex = Mutex<CriticalSectionRawMutex, OtaControllerImpl>;
