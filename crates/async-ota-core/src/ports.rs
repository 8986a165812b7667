//! Interfaces the update controller consumes.
//!
//! The controller only talks to hardware through these traits. The firmware
//! crate implements them for the ESP32, tests implement them with fakes.

use crate::{fault::UpdateFault, session::UpdateTarget};

/// Text reported by [`UpdateBackend::describe_error`] when nothing failed
pub const NO_ERROR: &str = "No Error";

/// Storage writer that receives the uploaded image.
pub trait UpdateBackend {
    /// Store the expected MD5 digest (32 hex digits) of the image.
    fn set_md5(&mut self, expected: &str) -> Result<(), UpdateFault>;

    /// Start writing into `target`. `size_hint` is `None` when the final
    /// size is not known up front.
    fn begin(&mut self, size_hint: Option<u32>, target: UpdateTarget) -> Result<(), UpdateFault>;

    /// Write the next piece of the image and return how many bytes were
    /// accepted. Anything short of `data.len()` is a failure.
    fn write(&mut self, data: &[u8]) -> usize;

    /// Finalize the write. With `commit_progress` the final size is the
    /// number of bytes written so far.
    fn end(&mut self, commit_progress: bool) -> Result<(), UpdateFault>;

    /// The latched failure, if any
    fn error(&self) -> Option<UpdateFault>;

    fn has_error(&self) -> bool {
        self.error().is_some()
    }

    /// Human-readable diagnostic for the latched failure
    fn describe_error(&self) -> &'static str {
        self.error().map_or(NO_ERROR, UpdateFault::as_str)
    }
}

/// Liveness monitor of the device.
pub trait Watchdog {
    fn set_timeout(&mut self, timeout_secs: u32);
}

impl<T: Watchdog + ?Sized> Watchdog for &mut T {
    fn set_timeout(&mut self, timeout_secs: u32) {
        (**self).set_timeout(timeout_secs);
    }
}

/// Millisecond clock. Wraps around like a 32-bit tick counter.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

/// Hard restart of the device.
pub trait SystemRestart {
    fn restart(&self);
}
