//! Fakes shared by the integration tests.

#![allow(dead_code)]

use std::cell::Cell;

use async_ota_core::{
    Clock, SystemRestart, UpdateBackend, UpdateFault, UpdateTarget, Watchdog,
    updater::{FlashRegion, PartitionLayout},
};
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash,
};

// -----------------------------------------------------------------------------
// Update backend
// -----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FakeBackend {
    pub md5: Option<String>,
    pub begins: Vec<UpdateTarget>,
    pub written: Vec<u8>,
    pub write_calls: usize,
    /// Writes received after an error was latched
    pub writes_after_error: usize,
    pub ends: Vec<bool>,
    /// Fault returned by `begin`
    pub refuse_begin: Option<UpdateFault>,
    /// Accept at most this many bytes in total
    pub capacity: Option<usize>,
    /// Fault returned by `end`
    pub refuse_end: Option<UpdateFault>,
    pub error: Option<UpdateFault>,
    /// Between a successful `begin` and the next `end`
    pub running: bool,
}

impl UpdateBackend for FakeBackend {
    fn set_md5(&mut self, expected: &str) -> Result<(), UpdateFault> {
        if expected.len() == 32 && expected.bytes().all(|b| b.is_ascii_hexdigit()) {
            self.md5 = Some(expected.to_owned());
            Ok(())
        } else {
            Err(UpdateFault::BadArgument)
        }
    }

    fn begin(&mut self, _size_hint: Option<u32>, target: UpdateTarget) -> Result<(), UpdateFault> {
        self.begins.push(target);
        if self.running {
            return Err(UpdateFault::AlreadyRunning);
        }
        if let Some(fault) = self.refuse_begin {
            self.error = Some(fault);
            return Err(fault);
        }
        self.running = true;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> usize {
        self.write_calls += 1;
        if self.error.is_some() {
            self.writes_after_error += 1;
        }
        let room = self
            .capacity
            .map_or(usize::MAX, |capacity| capacity.saturating_sub(self.written.len()));
        let accepted = room.min(data.len());
        self.written.extend_from_slice(&data[..accepted]);
        if accepted < data.len() {
            self.error = Some(UpdateFault::Space);
        }
        accepted
    }

    fn end(&mut self, commit_progress: bool) -> Result<(), UpdateFault> {
        self.ends.push(commit_progress);
        self.running = false;
        if let Some(fault) = self.refuse_end {
            self.error = Some(fault);
            return Err(fault);
        }
        Ok(())
    }

    fn error(&self) -> Option<UpdateFault> {
        self.error
    }
}

// -----------------------------------------------------------------------------
// Device services
// -----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FakeWatchdog {
    pub timeouts: Vec<u32>,
}

impl Watchdog for FakeWatchdog {
    fn set_timeout(&mut self, timeout_secs: u32) {
        self.timeouts.push(timeout_secs);
    }
}

#[derive(Debug, Default)]
pub struct FakeClock {
    now: Cell<u32>,
}

impl FakeClock {
    pub fn at(now: u32) -> Self {
        Self { now: Cell::new(now) }
    }

    pub fn set(&self, now: u32) {
        self.now.set(now);
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }
}

#[derive(Debug, Default)]
pub struct FakeRestart {
    pub count: Cell<u32>,
}

impl SystemRestart for FakeRestart {
    fn restart(&self) {
        self.count.set(self.count.get() + 1);
    }
}

// -----------------------------------------------------------------------------
// Flash
// -----------------------------------------------------------------------------

pub const SECTOR: usize = 4096;

/// NOR flash in RAM with erase checking.
pub struct RamFlash {
    pub data: Vec<u8>,
    pub erases: usize,
    pub fail_writes: bool,
}

impl RamFlash {
    pub fn new(sectors: usize) -> Self {
        Self {
            data: vec![0xFF; sectors * SECTOR],
            erases: 0,
            fail_writes: false,
        }
    }

    pub fn slice(&self, region: FlashRegion, len: usize) -> &[u8] {
        let start = region.offset as usize;
        &self.data[start..start + len]
    }
}

impl ErrorType for RamFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for RamFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let src = self
            .data
            .get(start..start + bytes.len())
            .ok_or(NorFlashErrorKind::OutOfBounds)?;
        bytes.copy_from_slice(src);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl NorFlash for RamFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = SECTOR;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        let (from, to) = (from as usize, to as usize);
        if from % SECTOR != 0 || to % SECTOR != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        let range = self
            .data
            .get_mut(from..to)
            .ok_or(NorFlashErrorKind::OutOfBounds)?;
        range.fill(0xFF);
        self.erases += 1;
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(NorFlashErrorKind::Other);
        }
        let start = offset as usize;
        if start % Self::WRITE_SIZE != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        let range = self
            .data
            .get_mut(start..start + bytes.len())
            .ok_or(NorFlashErrorKind::OutOfBounds)?;
        // NOR can only clear bits
        for (cell, byte) in range.iter_mut().zip(bytes) {
            *cell &= *byte;
        }
        Ok(())
    }
}

/// Fixed regions for both targets, recording activations.
#[derive(Debug, Default)]
pub struct FixedLayout {
    pub firmware: Option<FlashRegion>,
    pub filesystem: Option<FlashRegion>,
    pub activated: Vec<UpdateTarget>,
    pub refuse_activation: bool,
}

impl FixedLayout {
    /// Firmware in sectors 0..4, filesystem in sectors 4..6
    pub fn standard() -> Self {
        Self {
            firmware: Some(FlashRegion {
                offset: 0,
                size: 4 * SECTOR as u32,
            }),
            filesystem: Some(FlashRegion {
                offset: 4 * SECTOR as u32,
                size: 2 * SECTOR as u32,
            }),
            ..Self::default()
        }
    }
}

impl<F> PartitionLayout<F> for FixedLayout {
    fn locate(&mut self, _flash: &mut F, target: UpdateTarget) -> Result<FlashRegion, UpdateFault> {
        let region = match target {
            UpdateTarget::Firmware => self.firmware,
            UpdateTarget::Filesystem => self.filesystem,
        };
        region.ok_or(UpdateFault::NoPartition)
    }

    fn activate(&mut self, _flash: &mut F, target: UpdateTarget) -> Result<(), UpdateFault> {
        if self.refuse_activation {
            return Err(UpdateFault::Activate);
        }
        self.activated.push(target);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Request bodies
// -----------------------------------------------------------------------------

pub const BOUNDARY: &str = "----otaBoundary42";

/// Build a multipart body with the given fields followed by a file part.
pub fn multipart_body(fields: &[(&str, &str)], file: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"update\"; filename=\"image.bin\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Hex MD5 of `data`
pub fn md5_hex(data: &[u8]) -> String {
    use md5::{Digest as _, Md5};
    Md5::digest(data)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Firmware-looking image of `len` bytes
pub fn firmware_image(len: usize) -> Vec<u8> {
    let mut image: Vec<u8> = (0..len).map(|i| (i * 7 % 251) as u8).collect();
    if let Some(first) = image.first_mut() {
        *first = 0xE9;
    }
    image
}
