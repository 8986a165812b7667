use serde::Serialize;

use crate::identity::{DeviceId, copy_truncated};

/// Bounded response body text
pub type ReplyText = heapless::String<128>;

/// Response the HTTP layer should send, independent of the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// 401 with a Basic auth challenge
    Challenge,
    /// 200 with no body (CORS preflight)
    Empty,
    /// 200 with `{"id": ...}`
    Identity(DeviceId),
    /// 200 with the compressed update page
    Page,
    /// Plain text body with the given status
    Text { status: u16, body: ReplyText },
}

impl Reply {
    pub fn text(status: u16, body: &str) -> Self {
        let mut text = ReplyText::new();
        copy_truncated(&mut text, body);
        Reply::Text { status, body: text }
    }

    pub fn ok() -> Self {
        Self::text(200, "OK")
    }

    pub fn status(&self) -> u16 {
        match self {
            Reply::Challenge => 401,
            Reply::Empty | Reply::Identity(_) | Reply::Page => 200,
            Reply::Text { status, .. } => *status,
        }
    }
}

/// JSON body of `GET /update/id`
#[derive(Debug, Serialize)]
pub struct IdentityDto<'a> {
    pub id: &'a str,
}

impl<'a> From<&'a DeviceId> for IdentityDto<'a> {
    fn from(id: &'a DeviceId) -> Self {
        Self { id: id.as_str() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_serializes_as_id_object() {
        let id = DeviceId::from_hardware_id(0xABCD_EF12);
        let mut buffer = [0u8; 64];
        let len = serde_json_core::to_slice(&IdentityDto::from(&id), &mut buffer)
            .unwrap_or_default();
        assert_eq!(&buffer[..len], br#"{"id":"ABCDEF12"}"#);
    }

    #[test]
    fn statuses_follow_reply_kind() {
        assert_eq!(Reply::Challenge.status(), 401);
        assert_eq!(Reply::Empty.status(), 200);
        assert_eq!(Reply::ok().status(), 200);
        assert_eq!(Reply::text(400, "OTA could not begin").status(), 400);
    }
}
