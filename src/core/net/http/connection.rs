use embassy_net::tcp::TcpSocket;
use embedded_io_async::Write as _;
use heapless::{String, Vec};
use serde::Serialize;

use super::{
    Error,
    HttpResult,
    headers::{
        ContentHeaders,
        ContentType,
        HttpMethod,
        ResponseHeaders,
        TargetWriter as _,
        TextEncoding,
        find_content_length,
        find_header,
        parse_request_line,
        read_heading,
    },
};

/// Request head plus whatever body bytes arrived with it
const HEADER_BUFFER_SIZE: usize = 1536;
const BODY_BUFFER_SIZE: usize = 1024;
const STREAM_CHUNK_SIZE: usize = 1024;

const PATH_CAPACITY: usize = 64;
const AUTHORIZATION_CAPACITY: usize = 192;
const CONTENT_TYPE_CAPACITY: usize = 128;

/// A trait for reading chunks from a connection.
pub trait AsyncChunkedReader {
    fn content_length(&self) -> u32;

    /// Read the next piece of the body and pass it to `op`.
    ///
    /// `op` receives an empty slice once the body is exhausted or the peer
    /// closed the connection.
    fn read_and_then(
        &mut self,
        op: impl FnOnce(&[u8]),
    ) -> impl Future<Output = HttpResult>;
}

/// A trait for writing to a connection.
pub(crate) trait AsyncWriter {
    fn write_all(&mut self, buf: &[u8]) -> impl Future<Output = HttpResult>;
}

/// HTTP connection context
pub(crate) struct HttpConnection<'a> {
    pub method: HttpMethod,
    pub path: String<PATH_CAPACITY>,

    authorization: Option<String<AUTHORIZATION_CAPACITY>>,
    content_type: Option<String<CONTENT_TYPE_CAPACITY>>,
    socket: TcpSocket<'a>,
    content_length: u32,
    received: u32,
    header_end: usize,
    header_buf: Vec<u8, HEADER_BUFFER_SIZE>,
    body_buf: Vec<u8, BODY_BUFFER_SIZE>,
}

impl<'a> HttpConnection<'a> {
    /// Create a new HTTP connection from a socket.
    pub(crate) async fn from_socket(
        mut socket: TcpSocket<'a>,
    ) -> Result<Self, Error> {
        let mut header_buf = Vec::<u8, HEADER_BUFFER_SIZE>::new();
        let _ = header_buf.resize_default(HEADER_BUFFER_SIZE);
        let (header_end, header_len) =
            read_heading(header_buf.as_mut_slice(), &mut socket).await?;
        if header_len == 0 {
            return Err(Error::Closed);
        }
        header_buf.truncate(header_len);

        // Only the head is text, the trailer may be binary
        let headers_only = &header_buf.as_slice()[..header_end];
        let header_str =
            core::str::from_utf8(headers_only).map_err(|_| Error::Parse)?;
        let (method, raw_path, rest_headers) =
            parse_request_line(header_str).ok_or(Error::Parse)?;
        let content_length = find_content_length(rest_headers).unwrap_or(0);
        let authorization = header_value(rest_headers, "authorization");
        let content_type = header_value(rest_headers, "content-type");

        let mut path = String::new();
        path.push_str(raw_path).map_err(|()| Error::Parse)?;
        Ok(Self {
            method,
            path,
            authorization,
            content_type,
            socket,
            header_buf,
            body_buf: Vec::new(),
            content_length,
            received: 0,
            header_end,
        })
    }

    /// Write the headers to the connection
    pub(crate) async fn write_headers(
        &mut self,
        headers: &ResponseHeaders,
    ) -> HttpResult {
        self.header_buf.clear();
        headers.write_to(&mut self.header_buf)?;
        self.write_header_buf().await
    }

    /// Write the body to the connection
    pub(crate) async fn write_body(&mut self, body: &[u8]) -> HttpResult {
        for chunk in body.chunks(STREAM_CHUNK_SIZE) {
            self.write_all(chunk).await?;
        }
        Ok(())
    }

    /// Write a `text/plain` response with the given status.
    pub(crate) async fn write_text(&mut self, status: u16, body: &str) -> HttpResult {
        let headers = ResponseHeaders::from_code(status).with_content(
            ContentHeaders::new(ContentType::TextPlain)
                .with_text_encoding(TextEncoding::Utf8)
                .with_length(body.len()),
        );
        self.write_headers(&headers).await?;
        self.write_body(body.as_bytes()).await
    }

    /// Write JSON to the connection
    ///
    /// Writes both headers and body.
    pub(crate) async fn write_json<T: Serialize>(&mut self, data: &T) -> HttpResult {
        let _ = self.body_buf.resize_default(BODY_BUFFER_SIZE);
        let n = serde_json_core::to_slice(data, self.body_buf.as_mut_slice())
            .map_err(|_| Error::FormatBody)?;
        self.body_buf.truncate(n);
        let headers = ResponseHeaders::success()
            .with_content(ContentHeaders::new(ContentType::Json).with_length(n));

        self.write_headers(&headers).await?;

        self.write_body_buf().await?;
        Ok(())
    }

    /// Get request method and path
    pub(crate) fn route(&self) -> (HttpMethod, &'_ str) {
        (self.method, self.path.as_str())
    }

    /// Raw `Authorization` header, if the client sent one
    pub(crate) fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    pub(crate) fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Close the connection once everything written has left the socket.
    pub(crate) async fn close(mut self) -> HttpResult {
        self.socket.close();
        self.socket.flush().await?;
        Ok(())
    }

    /// Write the body buffer to the connection
    async fn write_body_buf(&mut self) -> HttpResult {
        self.socket.write_all(self.body_buf.as_slice()).await?;
        self.socket.flush().await?;

        Ok(())
    }

    /// Write the header buffer to the connection
    async fn write_header_buf(&mut self) -> HttpResult {
        self.socket.write_all(self.header_buf.as_slice()).await?;
        self.socket.flush().await?;

        Ok(())
    }
}

/// Copy a header value into an owned string; oversized values are dropped.
fn header_value<const N: usize>(headers: &str, name: &str) -> Option<String<N>> {
    let raw = find_header(headers, name)?;
    let mut value = String::new();
    value.push_str(raw).ok()?;
    Some(value)
}

impl AsyncWriter for HttpConnection<'_> {
    async fn write_all(&mut self, buf: &[u8]) -> HttpResult {
        self.socket.write_all(buf).await?;
        self.socket.flush().await?;
        Ok(())
    }
}

impl AsyncChunkedReader for HttpConnection<'_> {
    fn content_length(&self) -> u32 {
        self.content_length
    }

    #[allow(clippy::cast_possible_truncation)]
    async fn read_and_then(&mut self, op: impl FnOnce(&[u8])) -> HttpResult {
        if self.content_length == 0 {
            return Err(Error::NoData);
        }

        if self.received >= self.content_length {
            op(&[]);
            return Ok(());
        }

        if self.header_buf.len() > self.header_end {
            let trailer = &self.header_buf[self.header_end..];
            self.received += trailer.len() as u32;
            op(trailer);
            self.header_buf.truncate(self.header_end);
            return Ok(());
        }

        let _ = self.body_buf.resize_default(BODY_BUFFER_SIZE);
        let n = self.socket.read(self.body_buf.as_mut_slice()).await?;
        if n == 0 {
            #[cfg(feature = "log")]
            esp_println::println!(
                "http: peer closed at {}/{} bytes",
                self.received,
                self.content_length
            );
            op(&[]);
            return Ok(());
        }
        self.received += n as u32;
        self.body_buf.truncate(n);
        op(self.body_buf.as_slice());

        Ok(())
    }
}
