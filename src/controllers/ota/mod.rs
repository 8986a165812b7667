mod http;

use async_ota_core::{CredentialsTooLong, RebootScheduler, UpdateController};
use embassy_sync::mutex::Mutex;
pub use http::OtaHttpController;

use crate::{
    config::OtaConfig,
    infrastructure::{
        drivers::EspWatchdog,
        services::EmbassyClock,
        types::{FlashBackend, OtaControllerMutex},
    },
    mk_static,
};

/// Build the update controller and the HTTP handler serving it.
///
/// `hardware_id` seeds the default identity, `config` may replace it and
/// protect the endpoints with Basic credentials. Credentials that do not fit
/// are an error, the endpoints are never served with a truncated pair.
pub fn init_ota_controller(
    hardware_id: u32,
    backend: FlashBackend,
    watchdog: EspWatchdog,
    reboot: &'static RebootScheduler,
    config: &OtaConfig,
) -> Result<OtaHttpController, CredentialsTooLong> {
    let mut controller =
        UpdateController::new(hardware_id, backend, watchdog, EmbassyClock, reboot);
    if let Some(id) = config.device_id {
        controller.set_id(id);
    }
    if let Err(e) = controller.set_auth(config.username, config.password) {
        #[cfg(feature = "log")]
        esp_println::println!("ota: refusing credentials: {}", e);
        return Err(e);
    }

    #[cfg(feature = "log")]
    esp_println::println!(
        "ota: id {}, auth {}",
        controller.id(),
        if controller.is_auth_required() { "on" } else { "off" }
    );

    let controller = mk_static!(OtaControllerMutex, Mutex::new(controller));
    Ok(OtaHttpController::new(controller))
}
