//! Hardware-independent core of the HTTP firmware updater.
//!
//! Everything in this crate is `no_std` and runs on the host, so the update
//! state machine can be tested without a device. The firmware crate plugs the
//! real flash, watchdog, clock and restart implementations into the [`ports`].

#![cfg_attr(not(test), no_std)]

pub mod auth;
pub mod checksum;
pub mod controller;
pub mod fault;
pub mod identity;
pub mod multipart;
pub mod ports;
pub mod reboot;
pub mod reply;
pub mod session;
pub mod updater;
pub mod upload;

pub use auth::{Credentials, CredentialsTooLong};
pub use controller::{ChunkOutcome, UpdateController, WATCHDOG_UPDATE_TIMEOUT_SECS};
pub use fault::UpdateFault;
pub use identity::DeviceId;
pub use ports::{Clock, SystemRestart, UpdateBackend, Watchdog};
pub use reboot::{REBOOT_DELAY_MS, RebootScheduler};
pub use reply::{IdentityDto, Reply, ReplyText};
pub use session::{SessionState, UpdateSession, UpdateTarget};
pub use updater::{FlashRegion, FlashUpdater, PartitionLayout};
pub use upload::{UploadChunk, UploadParams, UploadRequest, UploadStream};
