use chrono::Utc;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=WIFI_SSID");
    println!("cargo:rerun-if-env-changed=WIFI_PASSWORD");
    println!("cargo:rerun-if-env-changed=OTA_USERNAME");
    println!("cargo:rerun-if-env-changed=OTA_PASSWORD");
    println!("cargo:rerun-if-env-changed=OTA_DEVICE_ID");
    println!("cargo:rerun-if-env-changed=OTA_HOSTNAME");

    let version = format!(
        "{}+{}",
        env!("CARGO_PKG_VERSION"),
        Utc::now().format("%Y%m%d%H%M")
    );
    println!("cargo:rustc-env=BUILD_VERSION={version}");
    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
