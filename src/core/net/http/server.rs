use embassy_net::{Stack, tcp::TcpSocket};
use embassy_time::Duration;
#[cfg(feature = "log")]
use esp_println::println;

use super::{HttpResult, connection::HttpConnection};

/// Idle timeout of a client socket
const SOCKET_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) trait HttpHandler {
    async fn handle_request(&self, conn: HttpConnection<'_>) -> HttpResult;
}

pub(crate) struct HttpServer<
    'a,
    T: HttpHandler,
    const TX_SIZE: usize,
    const RX_SIZE: usize,
> {
    handler: &'a T,
}

impl<'a, T: HttpHandler, const TX_SIZE: usize, const RX_SIZE: usize>
    HttpServer<'a, T, TX_SIZE, RX_SIZE>
{
    pub(crate) fn new(handler: &'a T) -> Self {
        Self { handler }
    }
}

impl<T: HttpHandler, const TX_SIZE: usize, const RX_SIZE: usize>
    HttpServer<'_, T, TX_SIZE, RX_SIZE>
{
    /// Accept and serve connections on `port`, one at a time, forever.
    pub(crate) async fn listen_and_serve(
        &self,
        stack: Stack<'static>,
        port: u16,
        rx_buffer: &mut [u8; RX_SIZE],
        tx_buffer: &mut [u8; TX_SIZE],
    ) -> ! {
        loop {
            let mut socket = TcpSocket::new(stack, &mut rx_buffer[..], &mut tx_buffer[..]);
            socket.set_timeout(Some(SOCKET_TIMEOUT));

            if let Err(_e) = socket.accept(port).await {
                #[cfg(feature = "log")]
                println!("http_server: accept error: {:?}", _e);
                continue;
            }

            let conn = match HttpConnection::from_socket(socket).await {
                Ok(connection) => connection,
                Err(_e) => {
                    #[cfg(feature = "log")]
                    println!("http_server: connection startup error: {:?}", _e);
                    continue;
                }
            };

            if let Err(_e) = self.handler.handle_request(conn).await {
                #[cfg(feature = "log")]
                println!("http_server: connection error: {:?}", _e);
            }
        }
    }
}
