//! Update backend writing images straight to NOR flash.
//!
//! Incoming data is collected into one erase sector at a time. A full sector
//! is erased and programmed before the next one is started, the last partial
//! sector is padded with `0xFF` on [`UpdateBackend::end`].

use embedded_storage::nor_flash::NorFlash;

use crate::{
    checksum::{ChecksumVerifier, DIGEST_LEN, parse_md5_hex},
    fault::UpdateFault,
    ports::UpdateBackend,
    session::UpdateTarget,
};

const SECTOR_SIZE: usize = 4096;
#[allow(clippy::cast_possible_truncation)]
const SECTOR_SIZE_U32: u32 = SECTOR_SIZE as u32;
/// First byte of every ESP application image
const ESP_IMAGE_MAGIC: u8 = 0xE9;

/// Absolute flash range of a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashRegion {
    pub offset: u32,
    pub size: u32,
}

/// Where images go and how a written image is made bootable.
pub trait PartitionLayout<F> {
    /// Region the next image for `target` is written to.
    fn locate(&mut self, flash: &mut F, target: UpdateTarget) -> Result<FlashRegion, UpdateFault>;

    /// Make the freshly written region active.
    fn activate(&mut self, flash: &mut F, target: UpdateTarget) -> Result<(), UpdateFault>;
}

struct ActiveWrite {
    target: UpdateTarget,
    region: FlashRegion,
    size_hint: Option<u32>,
    /// Bytes accepted so far
    progress: u32,
    /// Bytes already programmed, always a multiple of the sector size
    flushed: u32,
    verifier: Option<ChecksumVerifier>,
}

pub struct FlashUpdater<F, L> {
    flash: F,
    layout: L,
    active: Option<ActiveWrite>,
    expected_md5: Option<[u8; DIGEST_LEN]>,
    buffer: [u8; SECTOR_SIZE],
    buffered: usize,
    fault: Option<UpdateFault>,
}

impl<F, L> FlashUpdater<F, L>
where
    F: NorFlash,
    L: PartitionLayout<F>,
{
    pub fn new(flash: F, layout: L) -> Self {
        Self {
            flash,
            layout,
            active: None,
            expected_md5: None,
            buffer: [0xFF; SECTOR_SIZE],
            buffered: 0,
            fault: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Bytes accepted by the running write
    pub fn progress(&self) -> u32 {
        self.active.as_ref().map_or(0, |active| active.progress)
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn layout(&self) -> &L {
        &self.layout
    }

    fn start(&mut self, size_hint: Option<u32>, target: UpdateTarget) -> Result<(), UpdateFault> {
        let region = self.layout.locate(&mut self.flash, target)?;
        if region.size == 0 {
            return Err(UpdateFault::NoPartition);
        }
        if size_hint.is_some_and(|size| size > region.size) {
            return Err(UpdateFault::Space);
        }
        log::info!(
            "updater: writing {:?} at 0x{:X}, {} bytes available",
            target,
            region.offset,
            region.size
        );
        self.active = Some(ActiveWrite {
            target,
            region,
            size_hint,
            progress: 0,
            flushed: 0,
            verifier: self.expected_md5.map(ChecksumVerifier::new),
        });
        Ok(())
    }

    fn write_active(&mut self, data: &[u8]) -> Result<(), UpdateFault> {
        let Some(active) = self.active.as_mut() else {
            return Err(UpdateFault::NotRunning);
        };
        if active.progress == 0
            && active.target == UpdateTarget::Firmware
            && data.first().is_some_and(|&byte| byte != ESP_IMAGE_MAGIC)
        {
            return Err(UpdateFault::MagicByte);
        }
        let len = u32::try_from(data.len()).map_err(|_| UpdateFault::Space)?;
        if active
            .progress
            .checked_add(len)
            .is_none_or(|end| end > active.region.size)
        {
            return Err(UpdateFault::Space);
        }

        let mut rest = data;
        while !rest.is_empty() {
            let take = (SECTOR_SIZE - self.buffered).min(rest.len());
            self.buffer[self.buffered..self.buffered + take].copy_from_slice(&rest[..take]);
            self.buffered += take;
            rest = &rest[take..];

            if self.buffered == SECTOR_SIZE {
                program_sector(
                    &mut self.flash,
                    active.region.offset + active.flushed,
                    &mut self.buffer,
                    SECTOR_SIZE,
                )?;
                active.flushed += SECTOR_SIZE_U32;
                self.buffered = 0;
            }
        }

        if let Some(verifier) = active.verifier.as_mut() {
            verifier.update(data);
        }
        active.progress += len;
        Ok(())
    }

    fn finish(&mut self, active: ActiveWrite, commit_progress: bool) -> Result<(), UpdateFault> {
        let expected_size = if commit_progress {
            active.progress
        } else {
            active.size_hint.ok_or(UpdateFault::Size)?
        };
        if active.progress == 0 || active.progress != expected_size {
            return Err(UpdateFault::Size);
        }

        if self.buffered > 0 {
            program_sector(
                &mut self.flash,
                active.region.offset + active.flushed,
                &mut self.buffer,
                self.buffered,
            )?;
            self.buffered = 0;
        }

        if let Some(verifier) = active.verifier
            && !verifier.matches()
        {
            return Err(UpdateFault::Md5);
        }

        self.layout.activate(&mut self.flash, active.target)?;
        log::info!(
            "updater: {:?} image of {} bytes activated",
            active.target,
            active.progress
        );
        Ok(())
    }

    fn abort(&mut self, fault: UpdateFault) {
        log::warn!("updater: aborted: {fault}");
        self.active = None;
        self.buffered = 0;
        self.fault = Some(fault);
    }
}

impl<F, L> UpdateBackend for FlashUpdater<F, L>
where
    F: NorFlash,
    L: PartitionLayout<F>,
{
    fn set_md5(&mut self, expected: &str) -> Result<(), UpdateFault> {
        let digest = parse_md5_hex(expected).ok_or(UpdateFault::BadArgument)?;
        self.expected_md5 = Some(digest);
        Ok(())
    }

    fn begin(&mut self, size_hint: Option<u32>, target: UpdateTarget) -> Result<(), UpdateFault> {
        if self.active.is_some() {
            log::warn!("updater: already running");
            return Err(UpdateFault::AlreadyRunning);
        }
        self.fault = None;
        self.buffered = 0;
        self.start(size_hint, target).inspect_err(|&fault| {
            self.fault = Some(fault);
        })
    }

    fn write(&mut self, data: &[u8]) -> usize {
        if self.fault.is_some() || self.active.is_none() {
            return 0;
        }
        match self.write_active(data) {
            Ok(()) => data.len(),
            Err(fault) => {
                self.abort(fault);
                0
            }
        }
    }

    fn end(&mut self, commit_progress: bool) -> Result<(), UpdateFault> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }
        let Some(active) = self.active.take() else {
            return Err(UpdateFault::NotRunning);
        };
        self.finish(active, commit_progress).inspect_err(|&fault| {
            self.abort(fault);
        })
    }

    fn error(&self) -> Option<UpdateFault> {
        self.fault
    }
}

/// Erase the sector at `address` and program the first `len` bytes of
/// `buffer`, padded with `0xFF` up to the write granularity.
fn program_sector<F: NorFlash>(
    flash: &mut F,
    address: u32,
    buffer: &mut [u8; SECTOR_SIZE],
    len: usize,
) -> Result<(), UpdateFault> {
    let padded = len.next_multiple_of(F::WRITE_SIZE.max(1)).min(SECTOR_SIZE);
    buffer[len..padded].fill(0xFF);

    flash
        .erase(address, address + SECTOR_SIZE_U32)
        .map_err(|_| UpdateFault::Erase)?;
    flash
        .write(address, &buffer[..padded])
        .map_err(|_| UpdateFault::Write)
}
