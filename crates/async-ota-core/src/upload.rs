//! Glue between the multipart body of `POST /update` and the controller.

use heapless::String;

use crate::{
    controller::{ChunkOutcome, UpdateController},
    identity::copy_truncated,
    multipart::{MultipartError, MultipartEvent, MultipartParser},
    ports::{Clock, UpdateBackend, Watchdog},
};

/// Fits `Basic ` plus the base64 of the longest `user:password`
pub const AUTHORIZATION_CAPACITY: usize = 192;

/// Request data the controller needs for each chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadRequest<'r> {
    pub authorization: Option<&'r str>,
    pub md5: Option<&'r str>,
    pub mode: Option<&'r str>,
}

/// A piece of the uploaded file.
#[derive(Debug, Clone, Copy)]
pub struct UploadChunk<'d> {
    /// Position of `data` within the file
    pub offset: u32,
    pub data: &'d [u8],
    pub is_final: bool,
}

/// Form fields seen so far.
#[derive(Debug, Clone, Default)]
pub struct UploadParams {
    pub md5: Option<String<40>>,
    pub mode: Option<String<8>>,
}

impl UploadParams {
    pub fn record(&mut self, name: &str, value: &str) {
        match name {
            "md5" => self.md5 = Some(truncated(value)),
            "mode" => self.mode = Some(truncated(value)),
            _ => log::debug!("upload: ignoring field {name}"),
        }
    }
}

fn truncated<const N: usize>(value: &str) -> String<N> {
    let mut out = String::new();
    copy_truncated(&mut out, value);
    out
}

/// Multipart body of one upload request being fed to the controller.
pub struct UploadStream<const N: usize> {
    parser: MultipartParser<N>,
    params: UploadParams,
    authorization: Option<String<AUTHORIZATION_CAPACITY>>,
}

impl<const N: usize> UploadStream<N> {
    pub fn new(boundary: &str, authorization: Option<&str>) -> Result<Self, MultipartError> {
        Ok(Self {
            parser: MultipartParser::new(boundary)?,
            params: UploadParams::default(),
            authorization: authorization.map(truncated),
        })
    }

    /// Parse the next piece of the body, forwarding file data to `controller`.
    pub fn feed<B, W, C>(
        &mut self,
        controller: &mut UpdateController<'_, B, W, C>,
        bytes: &[u8],
    ) -> Result<(), MultipartError>
    where
        B: UpdateBackend,
        W: Watchdog,
        C: Clock,
    {
        let Self {
            parser,
            params,
            authorization,
        } = self;
        parser.push(bytes, |event| match event {
            MultipartEvent::Field { name, value } => params.record(name, value),
            MultipartEvent::FileChunk {
                offset,
                data,
                is_final,
            } => {
                let request = UploadRequest {
                    authorization: authorization.as_deref(),
                    md5: params.md5.as_deref(),
                    mode: params.mode.as_deref(),
                };
                let chunk = UploadChunk {
                    offset,
                    data,
                    is_final,
                };
                if let ChunkOutcome::Respond(reply) = controller.on_upload_chunk(&request, chunk) {
                    log::debug!("upload: early reply {}", reply.status());
                }
            }
        })
    }

    /// Check that the whole body was received
    pub fn finish(&self) -> Result<(), MultipartError> {
        self.parser.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_fields_are_recorded() {
        let mut params = UploadParams::default();
        params.record("md5", "abc");
        params.record("mode", "fs");
        params.record("other", "ignored");
        assert_eq!(params.md5.as_deref(), Some("abc"));
        assert_eq!(params.mode.as_deref(), Some("fs"));
    }

    #[test]
    fn overlong_values_are_cut() {
        let mut params = UploadParams::default();
        params.record("mode", "filesystem");
        assert_eq!(params.mode.as_deref(), Some("filesyst"));
    }
}
