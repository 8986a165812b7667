mod http_server;
mod reboot;

pub use http_server::http_server_task;
pub use reboot::reboot_task;
