//! MD5 integrity check of uploaded images.

use md5::{Digest as _, Md5};

pub const DIGEST_LEN: usize = 16;
/// Length of the digest rendered as hex
pub const DIGEST_HEX_LEN: usize = DIGEST_LEN * 2;

/// Parse a 32-digit hex MD5 digest. Both letter cases are accepted.
pub fn parse_md5_hex(value: &str) -> Option<[u8; DIGEST_LEN]> {
    if value.len() != DIGEST_HEX_LEN {
        return None;
    }
    let mut digest = [0u8; DIGEST_LEN];
    hex::decode_to_slice(value, &mut digest).ok()?;
    Some(digest)
}

/// Running MD5 over the image bytes compared against an expected digest.
#[derive(Clone)]
pub struct ChecksumVerifier {
    expected: [u8; DIGEST_LEN],
    hasher: Md5,
}

impl ChecksumVerifier {
    pub fn new(expected: [u8; DIGEST_LEN]) -> Self {
        Self {
            expected,
            hasher: Md5::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Consume the hasher and compare the result
    pub fn matches(self) -> bool {
        let actual = self.hasher.finalize();
        actual.as_slice() == self.expected.as_slice()
    }
}
