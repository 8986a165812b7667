mod ota;

pub use ota::{OtaHttpController, init_ota_controller};
