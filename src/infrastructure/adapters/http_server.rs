//! HTTP server adapter
//!
//! Allocates the socket buffers and runs the accept loop of `HttpServer`
//! with the update controller as the handler. Not a task itself, it is
//! driven by `http_server_task`.

use embassy_net::Stack;

use crate::controllers::OtaHttpController;
use crate::core::net::http::HttpServer;

const HTTP_PORT: u16 = 80;
const RX_BUFFER_SIZE: usize = 4096;
const TX_BUFFER_SIZE: usize = 4096;

/// Serve the update endpoints forever.
///
/// This function allocates 8KB of buffers on the stack (4KB RX + 4KB TX).
/// Ensure the calling task has sufficient stack size!
pub async fn run_http_server(stack: Stack<'static>, handler: &OtaHttpController) -> ! {
    let server =
        HttpServer::<OtaHttpController, TX_BUFFER_SIZE, RX_BUFFER_SIZE>::new(handler);
    let mut rx_buffer = [0u8; RX_BUFFER_SIZE];
    let mut tx_buffer = [0u8; TX_BUFFER_SIZE];

    server
        .listen_and_serve(stack, HTTP_PORT, &mut rx_buffer, &mut tx_buffer)
        .await
}
