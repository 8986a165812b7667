use core::fmt;

/// Reason an update backend refused or aborted a write.
///
/// The text of each variant is what the device reports to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateFault {
    Write,
    Erase,
    Read,
    Space,
    Size,
    Md5,
    MagicByte,
    Activate,
    NoPartition,
    BadArgument,
    AlreadyRunning,
    NotRunning,
}

impl UpdateFault {
    pub const fn as_str(self) -> &'static str {
        match self {
            UpdateFault::Write => "Flash Write Failed",
            UpdateFault::Erase => "Flash Erase Failed",
            UpdateFault::Read => "Flash Read Failed",
            UpdateFault::Space => "Not Enough Space",
            UpdateFault::Size => "Bad Size Given",
            UpdateFault::Md5 => "MD5 Check Failed",
            UpdateFault::MagicByte => "Wrong Magic Byte",
            UpdateFault::Activate => "Could Not Activate The Firmware",
            UpdateFault::NoPartition => "Partition Could Not be Found",
            UpdateFault::BadArgument => "Bad Argument",
            UpdateFault::AlreadyRunning => "Update Already Running",
            UpdateFault::NotRunning => "Update Not Running",
        }
    }
}

impl fmt::Display for UpdateFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
