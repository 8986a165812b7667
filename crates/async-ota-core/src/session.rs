use crate::reply::ReplyText;

/// Storage region an upload is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateTarget {
    /// Application image in the next OTA slot
    #[default]
    Firmware,
    /// Filesystem image (SPIFFS data partition)
    Filesystem,
}

impl UpdateTarget {
    /// Map the `mode` form field. Only `"fs"` selects the filesystem.
    pub fn from_mode(mode: Option<&str>) -> Self {
        match mode {
            Some("fs") => UpdateTarget::Filesystem,
            _ => UpdateTarget::Firmware,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Receiving,
    Complete,
    Failed,
}

/// Progress of one upload request.
#[derive(Debug, Clone)]
pub struct UpdateSession {
    pub target: UpdateTarget,
    pub written: u32,
    pub state: SessionState,
    /// Backend diagnostic captured when the session failed
    pub error: Option<ReplyText>,
}

impl UpdateSession {
    pub fn new(target: UpdateTarget) -> Self {
        Self {
            target,
            written: 0,
            state: SessionState::Idle,
            error: None,
        }
    }

    pub fn is_receiving(&self) -> bool {
        self.state == SessionState::Receiving
    }

    pub fn fail(&mut self, diagnostic: Option<&str>) {
        self.state = SessionState::Failed;
        if let Some(text) = diagnostic {
            let mut captured = ReplyText::new();
            crate::identity::copy_truncated(&mut captured, text);
            self.error = Some(captured);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_fs_mode_selects_filesystem() {
        assert_eq!(UpdateTarget::from_mode(Some("fs")), UpdateTarget::Filesystem);
        assert_eq!(UpdateTarget::from_mode(Some("fr")), UpdateTarget::Firmware);
        assert_eq!(UpdateTarget::from_mode(Some("FS")), UpdateTarget::Firmware);
        assert_eq!(UpdateTarget::from_mode(None), UpdateTarget::Firmware);
    }

    #[test]
    fn failing_captures_diagnostic() {
        let mut session = UpdateSession::new(UpdateTarget::Firmware);
        session.state = SessionState::Receiving;
        session.fail(Some("Not Enough Space"));
        assert_eq!(session.state, SessionState::Failed);
        assert_eq!(session.error.as_deref(), Some("Not Enough Space"));
    }
}
