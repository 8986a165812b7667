use async_ota_core::{
    IdentityDto,
    Reply,
    UploadStream,
    auth::AUTH_REALM,
    multipart::{MAX_BOUNDARY_LEN, MultipartError, boundary_from_content_type},
    upload::AUTHORIZATION_CAPACITY,
};
#[cfg(feature = "log")]
use esp_println::println;
use heapless::String;

use crate::{
    core::net::http::{
        AsyncChunkedReader as _,
        ContentEncoding,
        ContentHeaders,
        ContentType,
        Error as HttpError,
        HttpConnection,
        HttpHandler,
        HttpMethod,
        HttpResult,
        ResponseHeaders,
        TextEncoding,
    },
    infrastructure::types::{OtaControllerImpl, OtaControllerMutex},
};

/// Holdback buffer of the multipart parser
const PARSER_BUFFER_SIZE: usize = 1024;
const MALFORMED_BODY: &str = "Malformed multipart body";

type Authorization = String<AUTHORIZATION_CAPACITY>;

/// Serves the update endpoints on top of a shared [`OtaControllerImpl`].
pub struct OtaHttpController {
    controller: &'static OtaControllerMutex,
}

impl OtaHttpController {
    pub(crate) const fn new(controller: &'static OtaControllerMutex) -> Self {
        Self { controller }
    }
}

impl HttpHandler for OtaHttpController {
    async fn handle_request(&self, conn: HttpConnection<'_>) -> HttpResult {
        let mut conn = conn;
        let authorization = conn.authorization().and_then(owned_authorization);
        let authorization = authorization.as_deref();
        let mut controller = self.controller.lock().await;

        match conn.route() {
            (HttpMethod::Get, "/update/id") => {
                let reply = controller.identity(authorization);
                write_reply(&mut conn, &reply).await?;
            }
            (HttpMethod::Get, "/update") => {
                let reply = controller.page(authorization);
                write_reply(&mut conn, &reply).await?;
            }
            (HttpMethod::Options, "/update") => {
                let reply = controller.preflight(authorization);
                write_reply(&mut conn, &reply).await?;
            }
            (HttpMethod::Post, "/update") => {
                handle_upload(&mut conn, &mut controller, authorization).await?;
            }
            _ => serve_404(&mut conn).await?,
        }
        drop(controller);
        conn.close().await
    }
}

fn owned_authorization(value: &str) -> Option<Authorization> {
    let mut owned = Authorization::new();
    owned.push_str(value).ok()?;
    Some(owned)
}

fn owned_boundary(value: &str) -> Option<String<MAX_BOUNDARY_LEN>> {
    let mut owned = String::new();
    owned.push_str(value).ok()?;
    Some(owned)
}

/// `POST /update`: stream the multipart body, then send the completion reply.
async fn handle_upload(
    conn: &mut HttpConnection<'_>,
    controller: &mut OtaControllerImpl,
    authorization: Option<&str>,
) -> HttpResult {
    let boundary = conn
        .content_type()
        .and_then(boundary_from_content_type)
        .and_then(owned_boundary);

    if let Some(boundary) = boundary {
        match stream_upload(conn, controller, &boundary, authorization).await {
            Ok(Ok(())) => {}
            Ok(Err(_e)) => {
                #[cfg(feature = "log")]
                println!("ota_http: rejecting body: {}", _e.as_str());
                controller.abort_request();
                return conn.write_text(400, MALFORMED_BODY).await;
            }
            Err(e) => {
                controller.abort_request();
                return Err(e);
            }
        }
    } else {
        #[cfg(feature = "log")]
        println!("ota_http: POST without multipart body");
    }

    let reply = controller.on_request_complete(authorization);
    #[cfg(feature = "log")]
    println!("ota_http: upload finished with {}", reply.status());
    write_reply(conn, &reply).await
}

/// Feed the body to the controller until the peer is done.
///
/// The outer error is a transport failure, the inner one a body that is not
/// valid multipart.
async fn stream_upload(
    conn: &mut HttpConnection<'_>,
    controller: &mut OtaControllerImpl,
    boundary: &str,
    authorization: Option<&str>,
) -> Result<Result<(), MultipartError>, HttpError> {
    let mut stream = match UploadStream::<PARSER_BUFFER_SIZE>::new(boundary, authorization) {
        Ok(stream) => stream,
        Err(e) => return Ok(Err(e)),
    };

    let mut parsed = Ok(());
    let mut is_eof = false;
    while !is_eof && parsed.is_ok() {
        let read = conn
            .read_and_then(|chunk| {
                if chunk.is_empty() {
                    is_eof = true;
                } else {
                    parsed = stream.feed(controller, chunk);
                }
            })
            .await;
        match read {
            Ok(()) => {}
            // Headers announced no body at all
            Err(HttpError::NoData) => is_eof = true,
            Err(e) => return Err(e),
        }
    }

    Ok(parsed.and_then(|()| stream.finish()))
}

async fn write_reply(conn: &mut HttpConnection<'_>, reply: &Reply) -> HttpResult {
    match reply {
        Reply::Challenge => {
            conn.write_headers(&ResponseHeaders::unauthorized(AUTH_REALM))
                .await
        }
        Reply::Empty => conn.write_headers(&ResponseHeaders::success()).await,
        Reply::Identity(id) => conn.write_json(&IdentityDto::from(id)).await,
        Reply::Page => serve_update_page(conn).await,
        Reply::Text { status, body } => conn.write_text(*status, body).await,
    }
}

async fn serve_update_page(conn: &mut HttpConnection<'_>) -> HttpResult {
    const HTML: &[u8] = esp_async_ota_update_page::UPDATE_PAGE_HTML_GZ;
    let content = ContentHeaders::new(ContentType::TextHtml)
        .with_text_encoding(TextEncoding::Utf8)
        .with_encoding(ContentEncoding::Gzip)
        .with_length(HTML.len());
    let headers = ResponseHeaders::success().with_content(content);
    conn.write_headers(&headers).await?;
    conn.write_body(HTML).await?;
    Ok(())
}

async fn serve_404(conn: &mut HttpConnection<'_>) -> HttpResult {
    conn.write_text(404, "Not Found").await
}
