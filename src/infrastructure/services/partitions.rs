//! Partition lookup and activation through the ESP-IDF bootloader tables.
//!
//! Firmware goes to the OTA app slot after the running one, the filesystem
//! image to the SPIFFS data partition.

use async_ota_core::{FlashRegion, PartitionLayout, UpdateFault, UpdateTarget};
use esp_bootloader_esp_idf::{
    ota::{Ota, OtaImageState, Slot},
    ota_updater::OtaUpdater,
    partitions::{
        DataPartitionSubType,
        PARTITION_TABLE_MAX_LEN,
        PartitionType,
        read_partition_table,
    },
};
#[cfg(feature = "log")]
use esp_println::println;
use esp_storage::FlashStorage;

type Flash = FlashStorage<'static>;

#[derive(Debug, Default)]
pub struct EspPartitionLayout;

impl PartitionLayout<Flash> for EspPartitionLayout {
    fn locate(
        &mut self,
        flash: &mut Flash,
        target: UpdateTarget,
    ) -> Result<FlashRegion, UpdateFault> {
        let partition_type = match target {
            UpdateTarget::Firmware => next_app_partition(flash)?,
            UpdateTarget::Filesystem => {
                PartitionType::Data(DataPartitionSubType::Spiffs)
            }
        };

        let mut buffer = [0u8; PARTITION_TABLE_MAX_LEN];
        let table = read_partition_table(flash, &mut buffer)
            .map_err(|_| UpdateFault::Read)?;
        let entry = table
            .find_partition(partition_type)
            .map_err(|_| UpdateFault::Read)?
            .ok_or(UpdateFault::NoPartition)?;

        Ok(FlashRegion {
            offset: entry.offset(),
            size: entry.len(),
        })
    }

    fn activate(
        &mut self,
        flash: &mut Flash,
        target: UpdateTarget,
    ) -> Result<(), UpdateFault> {
        if target == UpdateTarget::Filesystem {
            return Ok(());
        }

        let mut buffer = [0u8; PARTITION_TABLE_MAX_LEN];
        let mut updater = OtaUpdater::new(flash, &mut buffer)
            .map_err(|_| UpdateFault::Activate)?;
        updater
            .activate_next_partition()
            .and_then(|()| updater.set_current_ota_state(OtaImageState::New))
            .map_err(|_| UpdateFault::Activate)?;

        #[cfg(feature = "log")]
        println!("ota: next app slot activated");
        Ok(())
    }
}

/// App partition the next firmware image is written to
fn next_app_partition(flash: &mut Flash) -> Result<PartitionType, UpdateFault> {
    let mut buffer = [0u8; PARTITION_TABLE_MAX_LEN];
    let mut updater = OtaUpdater::new(flash, &mut buffer)
        .map_err(|_| UpdateFault::NoPartition)?;
    let subtype = updater
        .next_partition()
        .map(|(_, subtype)| subtype)
        .map_err(|_| UpdateFault::NoPartition)?;
    Ok(PartitionType::App(subtype))
}

/// Confirm the running image so the bootloader does not roll it back.
///
/// Called once at boot. A device without OTA data keeps booting as is.
pub fn mark_running_image_valid(flash: &mut Flash) {
    let mut buffer = [0u8; PARTITION_TABLE_MAX_LEN];

    let Ok(table) = read_partition_table(flash, &mut buffer) else {
        #[cfg(feature = "log")]
        println!("ota: failed to read partition table");
        return;
    };
    let Ok(Some(ota_data)) =
        table.find_partition(PartitionType::Data(DataPartitionSubType::Ota))
    else {
        #[cfg(feature = "log")]
        println!("ota: no OTA data partition");
        return;
    };

    let mut region = ota_data.as_embedded_storage(flash);
    let Ok(mut ota) = Ota::new(&mut region) else {
        #[cfg(feature = "log")]
        println!("ota: failed to open OTA data");
        return;
    };
    if !matches!(ota.current_slot(), Ok(slot) if slot != Slot::None) {
        return;
    }

    if let Ok(OtaImageState::New | OtaImageState::PendingVerify) = ota.current_ota_state() {
        let _result = ota.set_current_ota_state(OtaImageState::Valid);
        #[cfg(feature = "log")]
        println!("ota: marking running image valid: {:?}", _result.is_ok());
    }
}
