mod partitions;
mod system;

pub use partitions::{EspPartitionLayout, mark_running_image_valid};
pub use system::{EmbassyClock, EspRestart};
