use core::fmt::Write as _;

use heapless::String;

/// Maximum length of the device identity in bytes
pub const DEVICE_ID_CAPACITY: usize = 64;

/// Device identity reported by `GET /update/id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId(String<DEVICE_ID_CAPACITY>);

impl DeviceId {
    /// Build the default identity from a hardware-unique id.
    ///
    /// Rendered as uppercase hex without zero padding, so `0x00AB_CDEF`
    /// becomes `ABCDEF`.
    pub fn from_hardware_id(hardware_id: u32) -> Self {
        let mut id = String::new();
        // 8 hex digits always fit
        let _ = write!(id, "{hardware_id:X}");
        Self(id)
    }

    /// Build an identity from an arbitrary string.
    ///
    /// Values longer than [`DEVICE_ID_CAPACITY`] are cut at a character
    /// boundary.
    pub fn from_str_truncated(value: &str) -> Self {
        let mut id = String::new();
        if !copy_truncated(&mut id, value) {
            log::warn!(
                "identity: id truncated to {} bytes",
                DEVICE_ID_CAPACITY
            );
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Copy `src` into `dst`, cutting at the last character that fits.
///
/// Returns `false` when the value had to be truncated.
pub(crate) fn copy_truncated<const N: usize>(dst: &mut String<N>, src: &str) -> bool {
    dst.clear();
    if dst.push_str(src).is_ok() {
        return true;
    }
    for ch in src.chars() {
        if dst.push(ch).is_err() {
            break;
        }
    }
    false
}
