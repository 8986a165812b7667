//! HTTP Basic credentials for the update endpoints.

use core::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use heapless::String;

/// Realm announced in the `WWW-Authenticate` challenge
pub const AUTH_REALM: &str = "Login Required";

/// Longest accepted username in bytes
pub const USERNAME_CAPACITY: usize = 64;
/// Longest accepted password in bytes
pub const PASSWORD_CAPACITY: usize = 64;
/// Decoded `user:password` never exceeds both capacities plus the colon
const DECODED_CAPACITY: usize = USERNAME_CAPACITY + PASSWORD_CAPACITY + 1;

/// A username or password longer than its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialsTooLong;

impl fmt::Display for CredentialsTooLong {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "credentials exceed {USERNAME_CAPACITY}/{PASSWORD_CAPACITY} bytes"
        )
    }
}

/// Optional username/password pair protecting the update endpoints.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    username: String<USERNAME_CAPACITY>,
    password: String<PASSWORD_CAPACITY>,
}

impl Credentials {
    /// Credentials that do not require authentication
    pub const fn none() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
        }
    }

    pub fn new(username: &str, password: &str) -> Result<Self, CredentialsTooLong> {
        let mut credentials = Self::none();
        credentials.set(username, password)?;
        Ok(credentials)
    }

    /// Replace the stored pair. Empty strings disable authentication.
    ///
    /// An oversized value is rejected whole and the stored pair is kept.
    pub fn set(&mut self, username: &str, password: &str) -> Result<(), CredentialsTooLong> {
        let username = String::try_from(username).map_err(|_| CredentialsTooLong)?;
        let password = String::try_from(password).map_err(|_| CredentialsTooLong)?;
        self.username = username;
        self.password = password;
        Ok(())
    }

    /// Authentication is required only when both values are non-empty.
    pub fn is_required(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    /// Check an `Authorization` header value against the stored pair.
    ///
    /// Always succeeds when authentication is not required.
    pub fn verify(&self, authorization: Option<&str>) -> bool {
        if !self.is_required() {
            return true;
        }
        let Some(header) = authorization else {
            return false;
        };
        let Some((scheme, token)) = header.trim().split_once(' ') else {
            return false;
        };
        if !scheme.eq_ignore_ascii_case("basic") {
            return false;
        }

        let token = token.trim();
        let mut decoded = [0u8; DECODED_CAPACITY + 3];
        if token.len() / 4 * 3 > decoded.len() {
            return false;
        }
        let Ok(len) = STANDARD.decode_slice(token, &mut decoded) else {
            return false;
        };
        let Some(colon) = decoded[..len].iter().position(|&b| b == b':') else {
            return false;
        };

        &decoded[..colon] == self.username.as_bytes()
            && &decoded[colon + 1..len] == self.password.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // "admin:secret"
    const ADMIN_SECRET: &str = "Basic YWRtaW46c2VjcmV0";

    fn pair(username: &str, password: &str) -> Credentials {
        Credentials::new(username, password).expect("credentials should fit")
    }

    #[test]
    fn empty_credentials_do_not_require_auth() {
        let credentials = Credentials::none();
        assert!(!credentials.is_required());
        assert!(credentials.verify(None));
    }

    #[test]
    fn one_empty_value_disables_auth() {
        assert!(!pair("admin", "").is_required());
        assert!(!pair("", "secret").is_required());
        assert!(pair("admin", "secret").is_required());
    }

    #[test]
    fn basic_header_is_accepted() {
        let credentials = pair("admin", "secret");
        assert!(credentials.verify(Some(ADMIN_SECRET)));
        assert!(credentials.verify(Some("basic YWRtaW46c2VjcmV0")));
    }

    #[test]
    fn wrong_or_missing_header_is_rejected() {
        let credentials = pair("admin", "secret");
        assert!(!credentials.verify(None));
        // "admin:wrong"
        assert!(!credentials.verify(Some("Basic YWRtaW46d3Jvbmc=")));
        assert!(!credentials.verify(Some("Bearer YWRtaW46c2VjcmV0")));
        assert!(!credentials.verify(Some("Basic not-base64!")));
        // "adminsecret" has no separator
        assert!(!credentials.verify(Some("Basic YWRtaW5zZWNyZXQ=")));
    }

    #[test]
    fn password_may_contain_colons() {
        let credentials = pair("admin", "a:b");
        // "admin:a:b"
        assert!(credentials.verify(Some("Basic YWRtaW46YTpi")));
    }

    #[test]
    fn clearing_credentials_disables_auth() {
        let mut credentials = pair("admin", "secret");
        credentials.set("", "").expect("empty values fit");
        assert!(!credentials.is_required());
        assert!(credentials.verify(None));
    }

    #[test]
    fn oversized_values_are_rejected_not_truncated() {
        let long = "x".repeat(USERNAME_CAPACITY + 1);
        assert_eq!(Credentials::new(&long, "secret").err(), Some(CredentialsTooLong));
        assert_eq!(Credentials::new("admin", &long).err(), Some(CredentialsTooLong));
        assert!(Credentials::new(&long[..USERNAME_CAPACITY], "secret").is_ok());

        let mut stored = pair("admin", "secret");
        assert_eq!(stored.set("admin", &long), Err(CredentialsTooLong));
        assert!(stored.verify(Some(ADMIN_SECRET)));
    }
}
