//! Streaming `multipart/form-data` parser.
//!
//! The body is pushed in arbitrary pieces. Only a small holdback of
//! `delimiter.len() - 1` bytes is kept between pushes so a delimiter split
//! across two reads is still detected; everything before it is handed out
//! right away.

use heapless::{String, Vec};

use crate::identity::copy_truncated;

/// Longest boundary allowed by RFC 2046
pub const MAX_BOUNDARY_LEN: usize = 70;
/// `\r\n--` followed by the boundary
const DELIMITER_CAPACITY: usize = MAX_BOUNDARY_LEN + 4;
pub const FIELD_NAME_CAPACITY: usize = 32;
pub const FIELD_VALUE_CAPACITY: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartError {
    BoundaryTooLong,
    HeadersTooLarge,
    FieldTooLarge,
    Malformed,
}

impl MultipartError {
    pub const fn as_str(self) -> &'static str {
        match self {
            MultipartError::BoundaryTooLong => "boundary too long",
            MultipartError::HeadersTooLarge => "part headers too large",
            MultipartError::FieldTooLarge => "form field too large",
            MultipartError::Malformed => "malformed multipart body",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum MultipartEvent<'a> {
    /// A complete non-file form field
    Field { name: &'a str, value: &'a str },
    /// A piece of the file part. The first piece has offset 0, the last one
    /// has `is_final` set and may be empty.
    FileChunk {
        offset: u32,
        data: &'a [u8],
        is_final: bool,
    },
}

/// Extract the boundary from a `Content-Type` header value.
///
/// Returns `None` unless the type is `multipart/*` with a non-empty boundary.
pub fn boundary_from_content_type(content_type: &str) -> Option<&str> {
    let mut params = content_type.split(';');
    let mime = params.next()?.trim();
    let is_multipart = mime
        .get(..10)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("multipart/"));
    if !is_multipart {
        return None;
    }
    params.find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = unquote(value.trim());
        (!value.is_empty()).then_some(value)
    })
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Preamble,
    AfterDelimiter,
    PartHeaders,
    FieldBody,
    FileBody,
    Done,
}

/// Push parser holding at most `N` bytes of unprocessed input.
///
/// `N` bounds the size of one part's header block.
pub struct MultipartParser<const N: usize> {
    delimiter: Vec<u8, DELIMITER_CAPACITY>,
    state: State,
    buffer: Vec<u8, N>,
    field_name: String<FIELD_NAME_CAPACITY>,
    field_value: Vec<u8, FIELD_VALUE_CAPACITY>,
    file_offset: u32,
}

impl<const N: usize> MultipartParser<N> {
    pub fn new(boundary: &str) -> Result<Self, MultipartError> {
        if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
            return Err(MultipartError::BoundaryTooLong);
        }
        let mut delimiter = Vec::new();
        delimiter
            .extend_from_slice(b"\r\n--")
            .and_then(|()| delimiter.extend_from_slice(boundary.as_bytes()))
            .map_err(|_| MultipartError::BoundaryTooLong)?;
        if N < delimiter.len() * 2 {
            return Err(MultipartError::BoundaryTooLong);
        }

        // The first delimiter has no leading line break, pretend there was one
        let mut buffer = Vec::new();
        buffer
            .extend_from_slice(b"\r\n")
            .map_err(|_| MultipartError::BoundaryTooLong)?;

        Ok(Self {
            delimiter,
            state: State::Preamble,
            buffer,
            field_name: String::new(),
            field_value: Vec::new(),
            file_offset: 0,
        })
    }

    /// The closing delimiter has been seen
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Feed the next piece of the body.
    pub fn push(
        &mut self,
        mut input: &[u8],
        mut on_event: impl FnMut(MultipartEvent<'_>),
    ) -> Result<(), MultipartError> {
        loop {
            let room = N - self.buffer.len();
            let take = room.min(input.len());
            if self.buffer.extend_from_slice(&input[..take]).is_err() {
                return Err(MultipartError::Malformed);
            }
            input = &input[take..];

            while self.step(&mut on_event)? {}

            if input.is_empty() {
                return Ok(());
            }
            if take == 0 && self.buffer.len() == N {
                return Err(MultipartError::Malformed);
            }
        }
    }

    /// Check that the body ended with the closing delimiter
    pub fn finish(&self) -> Result<(), MultipartError> {
        if self.is_done() {
            Ok(())
        } else {
            Err(MultipartError::Malformed)
        }
    }

    /// Process buffered input. Returns `true` while progress is possible.
    fn step(
        &mut self,
        on_event: &mut impl FnMut(MultipartEvent<'_>),
    ) -> Result<bool, MultipartError> {
        match self.state {
            State::Preamble => {
                if let Some(pos) = find_subsequence(&self.buffer, &self.delimiter) {
                    self.consume(pos + self.delimiter.len());
                    self.state = State::AfterDelimiter;
                    return Ok(true);
                }
                let safe = self.safe_len();
                self.consume(safe);
                Ok(false)
            }
            State::AfterDelimiter => {
                if self.buffer.len() < 2 {
                    return Ok(false);
                }
                match &self.buffer[..2] {
                    b"--" => {
                        self.state = State::Done;
                        self.buffer.clear();
                        Ok(false)
                    }
                    b"\r\n" => {
                        self.consume(2);
                        self.state = State::PartHeaders;
                        Ok(true)
                    }
                    _ => Err(MultipartError::Malformed),
                }
            }
            State::PartHeaders => {
                let (headers_len, skip) = if self.buffer.starts_with(b"\r\n") {
                    (0, 2)
                } else if let Some(pos) = find_subsequence(&self.buffer, b"\r\n\r\n") {
                    (pos, pos + 4)
                } else if self.buffer.len() == N {
                    return Err(MultipartError::HeadersTooLarge);
                } else {
                    return Ok(false);
                };
                let is_file = self.parse_part_headers(headers_len)?;
                self.consume(skip);
                if is_file {
                    self.file_offset = 0;
                    self.state = State::FileBody;
                } else {
                    self.field_value.clear();
                    self.state = State::FieldBody;
                }
                Ok(true)
            }
            State::FieldBody => {
                let found = find_subsequence(&self.buffer, &self.delimiter);
                let len = found.unwrap_or_else(|| self.safe_len());
                if self.field_value.extend_from_slice(&self.buffer[..len]).is_err() {
                    return Err(MultipartError::FieldTooLarge);
                }
                match found {
                    Some(pos) => {
                        let value = core::str::from_utf8(&self.field_value)
                            .map_err(|_| MultipartError::Malformed)?;
                        on_event(MultipartEvent::Field {
                            name: self.field_name.as_str(),
                            value,
                        });
                        self.consume(pos + self.delimiter.len());
                        self.state = State::AfterDelimiter;
                        Ok(true)
                    }
                    None => {
                        self.consume(len);
                        Ok(false)
                    }
                }
            }
            State::FileBody => {
                let found = find_subsequence(&self.buffer, &self.delimiter);
                let len = found.unwrap_or_else(|| self.safe_len());
                let is_final = found.is_some();
                if len > 0 || is_final {
                    on_event(MultipartEvent::FileChunk {
                        offset: self.file_offset,
                        data: &self.buffer[..len],
                        is_final,
                    });
                    self.file_offset = self
                        .file_offset
                        .saturating_add(u32::try_from(len).unwrap_or(u32::MAX));
                }
                if is_final {
                    self.consume(len + self.delimiter.len());
                    self.state = State::AfterDelimiter;
                    Ok(true)
                } else {
                    self.consume(len);
                    Ok(false)
                }
            }
            State::Done => {
                self.buffer.clear();
                Ok(false)
            }
        }
    }

    /// Read `Content-Disposition` of the current part. Returns `true` for a
    /// file part.
    fn parse_part_headers(&mut self, len: usize) -> Result<bool, MultipartError> {
        let headers =
            core::str::from_utf8(&self.buffer[..len]).map_err(|_| MultipartError::Malformed)?;
        let mut is_file = false;
        self.field_name.clear();

        for line in headers.split("\r\n") {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            if !name.trim().eq_ignore_ascii_case("content-disposition") {
                continue;
            }
            for param in value.split(';').skip(1) {
                let Some((key, value)) = param.split_once('=') else {
                    continue;
                };
                let key = key.trim();
                if key.eq_ignore_ascii_case("name") {
                    copy_truncated(&mut self.field_name, unquote(value.trim()));
                } else if key.eq_ignore_ascii_case("filename") {
                    is_file = true;
                }
            }
        }
        Ok(is_file)
    }

    /// Bytes that can be released without cutting a possible delimiter
    fn safe_len(&self) -> usize {
        self.buffer
            .len()
            .saturating_sub(self.delimiter.len() - 1)
    }

    fn consume(&mut self, count: usize) {
        let remaining = self.buffer.len() - count;
        self.buffer.copy_within(count.., 0);
        self.buffer.truncate(remaining);
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = b"--XyZ\r\n\
Content-Disposition: form-data; name=\"md5\"\r\n\
\r\n\
0123456789abcdef0123456789abcdef\r\n\
--XyZ\r\n\
Content-Disposition: form-data; name=\"firmware\"; filename=\"app.bin\"\r\n\
Content-Type: application/octet-stream\r\n\
\r\n\
\xE9binary\r\n--X-data\r\n\
--XyZ--\r\n";

    #[derive(Debug, Default)]
    struct Collected {
        fields: std::vec::Vec<(std::string::String, std::string::String)>,
        file: std::vec::Vec<u8>,
        offsets: std::vec::Vec<u32>,
        finals: usize,
    }

    fn parse_in_pieces(body: &[u8], piece: usize) -> Result<Collected, MultipartError> {
        let mut parser = MultipartParser::<256>::new("XyZ")?;
        let mut collected = Collected::default();
        for part in body.chunks(piece) {
            parser.push(part, |event| match event {
                MultipartEvent::Field { name, value } => {
                    collected.fields.push((name.into(), value.into()));
                }
                MultipartEvent::FileChunk {
                    offset,
                    data,
                    is_final,
                } => {
                    assert_eq!(offset as usize, collected.file.len());
                    collected.offsets.push(offset);
                    collected.file.extend_from_slice(data);
                    if is_final {
                        collected.finals += 1;
                    }
                }
            })?;
        }
        parser.finish()?;
        Ok(collected)
    }

    #[test]
    fn boundary_is_extracted_from_content_type() {
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=----WebKitFormBoundary7MA"),
            Some("----WebKitFormBoundary7MA")
        );
        assert_eq!(
            boundary_from_content_type("Multipart/Form-Data; charset=utf-8; BOUNDARY=\"a b\""),
            Some("a b")
        );
        assert_eq!(boundary_from_content_type("application/octet-stream"), None);
        assert_eq!(boundary_from_content_type("multipart/form-data"), None);
        assert_eq!(boundary_from_content_type("multipart/form-data; boundary="), None);
    }

    #[test]
    fn whole_body_at_once() {
        let Ok(collected) = parse_in_pieces(BODY, BODY.len()) else {
            panic!("body should parse");
        };
        assert_eq!(
            collected.fields,
            [("md5".to_owned(), "0123456789abcdef0123456789abcdef".to_owned())]
        );
        assert_eq!(collected.file, b"\xE9binary\r\n--X-data");
        assert_eq!(collected.offsets.first(), Some(&0));
        assert_eq!(collected.finals, 1);
    }

    #[test]
    fn any_split_yields_same_result() {
        for piece in 1..BODY.len() {
            let Ok(collected) = parse_in_pieces(BODY, piece) else {
                panic!("body should parse with pieces of {piece}");
            };
            assert_eq!(collected.file, b"\xE9binary\r\n--X-data", "piece {piece}");
            assert_eq!(collected.fields.len(), 1);
            assert_eq!(collected.finals, 1);
        }
    }

    #[test]
    fn empty_file_still_emits_final_chunk() {
        let body = b"--XyZ\r\nContent-Disposition: form-data; name=\"f\"; filename=\"e\"\r\n\r\n\r\n--XyZ--";
        let Ok(collected) = parse_in_pieces(body, 7) else {
            panic!("body should parse");
        };
        assert!(collected.file.is_empty());
        assert_eq!(collected.offsets, [0]);
        assert_eq!(collected.finals, 1);
    }

    #[test]
    fn truncated_body_is_malformed() {
        let truncated = &BODY[..BODY.len() - 12];
        assert_eq!(
            parse_in_pieces(truncated, 16).map(|_| ()),
            Err(MultipartError::Malformed)
        );
    }

    #[test]
    fn garbage_after_delimiter_is_malformed() {
        let body = b"--XyZ??\r\n";
        assert_eq!(
            parse_in_pieces(body, 4).map(|_| ()),
            Err(MultipartError::Malformed)
        );
    }

    #[test]
    fn oversized_field_is_rejected() {
        let mut body = std::vec::Vec::new();
        body.extend_from_slice(b"--XyZ\r\nContent-Disposition: form-data; name=\"md5\"\r\n\r\n");
        body.extend(core::iter::repeat_n(b'a', FIELD_VALUE_CAPACITY + 1));
        body.extend_from_slice(b"\r\n--XyZ--");
        assert_eq!(
            parse_in_pieces(&body, 32).map(|_| ()),
            Err(MultipartError::FieldTooLarge)
        );
    }

    #[test]
    fn boundary_limits_are_enforced() {
        assert!(MultipartParser::<256>::new("").is_err());
        assert!(MultipartParser::<256>::new(&"b".repeat(MAX_BOUNDARY_LEN + 1)).is_err());
        assert!(MultipartParser::<16>::new("a-long-boundary").is_err());
    }
}
