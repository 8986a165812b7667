//! Update HTTP server task
//!
//! Serves the upload page, the identity endpoint and firmware uploads.

use embassy_net::Stack;

use crate::controllers::OtaHttpController;
use crate::infrastructure::adapters::run_http_server;

#[embassy_executor::task]
pub async fn http_server_task(stack: Stack<'static>, handler: OtaHttpController) {
    run_http_server(stack, &handler).await
}
