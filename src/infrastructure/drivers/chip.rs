/// Hardware-unique id of this chip.
///
/// The low four bytes of the factory MAC, read as a little-endian word.
pub fn hardware_id() -> u32 {
    let mac = esp_hal::efuse::Efuse::mac_address();
    u32::from_le_bytes([mac[0], mac[1], mac[2], mac[3]])
}
