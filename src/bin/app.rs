#![no_std]
#![no_main]

use async_ota_core::{FlashUpdater, RebootScheduler};
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};

use esp_alloc as _;
use esp_backtrace as _;
use esp_hal::{clock::CpuClock, rtc_cntl::Rtc, timer::timg::TimerGroup};
use esp_storage::FlashStorage;

use esp_async_ota::config::{OTA, WIFI};
use esp_async_ota::controllers::init_ota_controller;
use esp_async_ota::infrastructure::drivers::{
    EspWatchdog, hardware_id, start_wifi_sta, wifi_sta::hostname,
};
use esp_async_ota::infrastructure::services::{
    EspPartitionLayout, mark_running_image_valid,
};
use esp_async_ota::infrastructure::tasks::{http_server_task, reboot_task};
use esp_async_ota::mk_static;

esp_bootloader_esp_idf::esp_app_desc!();

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    esp_println::logger::init_logger_from_env();
    log::info!("app: esp-async-ota {}", esp_async_ota::config::BUILD_VERSION);

    // Initialize hardware
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // Wi-Fi driver needs a heap
    esp_alloc::heap_allocator!(
        #[unsafe(link_section = ".dram2_uninit")] size: 64 * 1024
    );

    // Start rtos
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Watchdog is fed by the reboot task from here on
    let watchdog = EspWatchdog::start(Rtc::new(peripherals.LPWR));
    let reboot = mk_static!(RebootScheduler, RebootScheduler::new());
    spawner.spawn(reboot_task(reboot, watchdog)).ok();

    let mut flash = FlashStorage::new(peripherals.FLASH);
    mark_running_image_valid(&mut flash);
    let backend = FlashUpdater::new(flash, EspPartitionLayout);

    let Ok(ota_controller) =
        init_ota_controller(hardware_id(), backend, watchdog, reboot, &OTA)
    else {
        log::error!("app: OTA credentials exceed 64 bytes, update server disabled");
        halt().await
    };

    let Some((ssid, password)) = WIFI.bounded() else {
        log::error!("app: Wi-Fi credentials exceed 32/64 bytes");
        halt().await
    };
    let stack = match start_wifi_sta(
        spawner,
        peripherals.WIFI,
        ssid,
        password,
        hostname(OTA.hostname),
    )
    .await
    {
        Ok(stack) => stack,
        Err(e) => {
            log::error!("app: Wi-Fi start failed: {:?}", e);
            halt().await
        }
    };

    spawner.spawn(http_server_task(stack, ota_controller)).ok();
    log::info!("app: update server listening on port 80");

    loop {
        Timer::after(Duration::from_secs(5)).await;
    }
}

/// Park the main task; the reboot task keeps the watchdog quiet.
async fn halt() -> ! {
    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}
