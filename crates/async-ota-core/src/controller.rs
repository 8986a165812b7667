//! Update controller: identity, credentials and the upload state machine.
//!
//! The HTTP layer drives the controller with two kinds of events per
//! `POST /update`: any number of [`UploadChunk`]s followed by exactly one
//! completion. The completion reply is the one sent to the client.

use crate::{
    auth::{Credentials, CredentialsTooLong},
    identity::DeviceId,
    ports::{Clock, UpdateBackend, Watchdog},
    reboot::RebootScheduler,
    reply::{Reply, ReplyText},
    session::{SessionState, UpdateSession, UpdateTarget},
    upload::{UploadChunk, UploadRequest},
};

/// Watchdog budget while an image is erased and written
pub const WATCHDOG_UPDATE_TIMEOUT_SECS: u32 = 15;

const MD5_INVALID: &str = "MD5 parameter missing or invalid";
const BEGIN_FAILED: &str = "OTA could not begin";
const END_FAILED: &str = "Could not end OTA";

/// What happened to a single chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Chunk was written (or was an empty final marker)
    Continue,
    /// No active session, chunk was dropped
    Ignored,
    /// The session ended early with this reply
    Respond(Reply),
}

pub struct UpdateController<'a, B, W, C> {
    identity: DeviceId,
    credentials: Credentials,
    backend: B,
    watchdog: W,
    clock: C,
    reboot: &'a RebootScheduler,
    session: Option<UpdateSession>,
    early_reply: Option<Reply>,
}

impl<'a, B, W, C> UpdateController<'a, B, W, C>
where
    B: UpdateBackend,
    W: Watchdog,
    C: Clock,
{
    pub fn new(
        hardware_id: u32,
        backend: B,
        watchdog: W,
        clock: C,
        reboot: &'a RebootScheduler,
    ) -> Self {
        Self {
            identity: DeviceId::from_hardware_id(hardware_id),
            credentials: Credentials::none(),
            backend,
            watchdog,
            clock,
            reboot,
            session: None,
            early_reply: None,
        }
    }

    pub fn set_id(&mut self, id: &str) {
        self.identity = DeviceId::from_str_truncated(id);
    }

    pub fn id(&self) -> &str {
        self.identity.as_str()
    }

    /// Protect the endpoints. Oversized values leave the current pair in place.
    pub fn set_auth(&mut self, username: &str, password: &str) -> Result<(), CredentialsTooLong> {
        self.credentials.set(username, password)
    }

    pub fn is_auth_required(&self) -> bool {
        self.credentials.is_required()
    }

    pub fn is_authorized(&self, authorization: Option<&str>) -> bool {
        self.credentials.verify(authorization)
    }

    /// `GET /update/id`
    pub fn identity(&self, authorization: Option<&str>) -> Reply {
        self.guarded(authorization, || Reply::Identity(self.identity.clone()))
    }

    /// `GET /update`
    pub fn page(&self, authorization: Option<&str>) -> Reply {
        self.guarded(authorization, || Reply::Page)
    }

    /// `OPTIONS /update`
    pub fn preflight(&self, authorization: Option<&str>) -> Reply {
        self.guarded(authorization, || Reply::Empty)
    }

    fn guarded(&self, authorization: Option<&str>, reply: impl FnOnce() -> Reply) -> Reply {
        if self.is_authorized(authorization) {
            reply()
        } else {
            Reply::Challenge
        }
    }

    /// Handle one piece of the uploaded file.
    pub fn on_upload_chunk(
        &mut self,
        request: &UploadRequest<'_>,
        chunk: UploadChunk<'_>,
    ) -> ChunkOutcome {
        if chunk.offset == 0 {
            // Nothing from an earlier request survives a new upload
            self.session = None;
            self.early_reply = None;
            if !self.is_authorized(request.authorization) {
                log::warn!("ota: upload rejected, not authorized");
                return ChunkOutcome::Respond(Reply::Challenge);
            }
            if let Err(reply) = self.start_session(request) {
                return self.finish_early(reply);
            }
        }

        let Some(session) = self.session.as_mut() else {
            return ChunkOutcome::Ignored;
        };
        if !session.is_receiving() {
            return ChunkOutcome::Ignored;
        }

        if !chunk.data.is_empty() {
            let accepted = self.backend.write(chunk.data);
            session.written = session
                .written
                .saturating_add(u32::try_from(accepted).unwrap_or(u32::MAX));
            if accepted != chunk.data.len() {
                log::warn!(
                    "ota: short write at offset {}: {} of {} bytes",
                    chunk.offset,
                    accepted,
                    chunk.data.len()
                );
                session.fail(Some(self.backend.describe_error()));
                return self.finish_early(Reply::text(400, BEGIN_FAILED));
            }
        }

        if chunk.is_final {
            if let Err(fault) = self.backend.end(true) {
                log::warn!("ota: finalize failed: {fault}");
                let diagnostic = diagnostic(&self.backend, fault.as_str());
                session.fail(Some(diagnostic));
                return self.finish_early(Reply::text(400, END_FAILED));
            }
            session.state = SessionState::Complete;
            log::info!("ota: update complete, {} bytes", session.written);
        }

        ChunkOutcome::Continue
    }

    fn start_session(&mut self, request: &UploadRequest<'_>) -> Result<(), Reply> {
        let target = UpdateTarget::from_mode(request.mode);
        let session = self.session.insert(UpdateSession::new(target));

        let md5_accepted = request
            .md5
            .is_some_and(|md5| self.backend.set_md5(md5).is_ok());
        if !md5_accepted {
            log::warn!("ota: {MD5_INVALID}");
            session.fail(None);
            return Err(Reply::text(400, MD5_INVALID));
        }

        self.watchdog.set_timeout(WATCHDOG_UPDATE_TIMEOUT_SECS);

        if let Err(fault) = self.backend.begin(None, target) {
            log::warn!("ota: begin failed: {fault}");
            session.fail(Some(diagnostic(&self.backend, fault.as_str())));
            return Err(Reply::text(400, BEGIN_FAILED));
        }
        log::info!("ota: update started, target {target:?}");
        session.state = SessionState::Receiving;
        Ok(())
    }

    fn finish_early(&mut self, reply: Reply) -> ChunkOutcome {
        if self.early_reply.is_none() {
            self.early_reply = Some(reply.clone());
        }
        ChunkOutcome::Respond(reply)
    }

    /// Drop the request in flight without replying or scheduling a restart.
    ///
    /// Called when the body could not be read to the end. A write the
    /// backend already began stays open until the device restarts.
    pub fn abort_request(&mut self) {
        if let Some(session) = self.session.take() {
            log::warn!(
                "ota: {:?} upload aborted after {} bytes",
                session.target,
                session.written
            );
        }
        self.early_reply = None;
    }

    /// Produce the final reply of `POST /update` and schedule the restart.
    ///
    /// Unauthorized requests get the challenge and never schedule a restart.
    pub fn on_request_complete(&mut self, authorization: Option<&str>) -> Reply {
        let session = self.session.take();
        let early_reply = self.early_reply.take();

        if !self.is_authorized(authorization) {
            return Reply::Challenge;
        }
        if let Some(session) = &session {
            log::debug!(
                "ota: {:?} request finished in state {:?}, {} bytes",
                session.target,
                session.state,
                session.written
            );
        }

        let reply = if self.backend.has_error() {
            let body = session.and_then(|session| session.error).unwrap_or_else(|| {
                let mut text = ReplyText::new();
                let _ = text.push_str(self.backend.describe_error());
                text
            });
            Reply::Text { status: 500, body }
        } else {
            early_reply.unwrap_or_else(Reply::ok)
        };

        self.reboot.request(self.clock.now_ms());
        reply
    }

    pub fn session(&self) -> Option<&UpdateSession> {
        self.session.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

/// Backend diagnostic, or `fallback` when the backend latched nothing
fn diagnostic<B: UpdateBackend>(backend: &B, fallback: &'static str) -> &'static str {
    if backend.has_error() {
        backend.describe_error()
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;
    use crate::fault::UpdateFault;

    #[derive(Default)]
    struct Backend {
        begins: u32,
        written: usize,
        accept_limit: Option<usize>,
        error: Option<UpdateFault>,
    }

    impl UpdateBackend for Backend {
        fn set_md5(&mut self, expected: &str) -> Result<(), UpdateFault> {
            if expected.len() == 32 {
                Ok(())
            } else {
                Err(UpdateFault::BadArgument)
            }
        }

        fn begin(&mut self, _: Option<u32>, _: UpdateTarget) -> Result<(), UpdateFault> {
            self.begins += 1;
            Ok(())
        }

        fn write(&mut self, data: &[u8]) -> usize {
            let accepted = self.accept_limit.map_or(data.len(), |limit| limit.min(data.len()));
            if accepted != data.len() {
                self.error = Some(UpdateFault::Write);
            }
            self.written += accepted;
            accepted
        }

        fn end(&mut self, _: bool) -> Result<(), UpdateFault> {
            Ok(())
        }

        fn error(&self) -> Option<UpdateFault> {
            self.error
        }
    }

    #[derive(Default)]
    struct Watchdog(u32);

    impl crate::ports::Watchdog for Watchdog {
        fn set_timeout(&mut self, timeout_secs: u32) {
            self.0 = timeout_secs;
        }
    }

    struct Clock(Cell<u32>);

    impl crate::ports::Clock for Clock {
        fn now_ms(&self) -> u32 {
            self.0.get()
        }
    }

    const MD5: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";

    fn request(md5: Option<&str>) -> UploadRequest<'_> {
        UploadRequest {
            authorization: None,
            md5,
            mode: None,
        }
    }

    fn chunk(offset: u32, data: &[u8], is_final: bool) -> UploadChunk<'_> {
        UploadChunk {
            offset,
            data,
            is_final,
        }
    }

    #[test]
    fn whole_upload_in_one_chunk_succeeds() {
        let reboot = RebootScheduler::new();
        let mut controller = UpdateController::new(
            1,
            Backend::default(),
            Watchdog::default(),
            Clock(Cell::new(42)),
            &reboot,
        );
        let outcome = controller.on_upload_chunk(&request(Some(MD5)), chunk(0, b"image", true));
        assert_eq!(outcome, ChunkOutcome::Continue);
        assert_eq!(controller.session().map(|s| s.state), Some(SessionState::Complete));
        assert_eq!(controller.on_request_complete(None), Reply::ok());
        assert_eq!(controller.backend().written, 5);
        assert_eq!(controller.watchdog.0, WATCHDOG_UPDATE_TIMEOUT_SECS);
        assert!(reboot.is_pending());
        assert!(controller.session().is_none());
    }

    #[test]
    fn missing_md5_never_begins() {
        let reboot = RebootScheduler::new();
        let mut controller = UpdateController::new(
            1,
            Backend::default(),
            Watchdog::default(),
            Clock(Cell::new(0)),
            &reboot,
        );
        let outcome = controller.on_upload_chunk(&request(None), chunk(0, b"image", false));
        assert_eq!(outcome, ChunkOutcome::Respond(Reply::text(400, MD5_INVALID)));
        assert_eq!(
            controller.on_upload_chunk(&request(None), chunk(5, b"more", true)),
            ChunkOutcome::Ignored
        );
        assert_eq!(controller.backend().begins, 0);
        assert_eq!(controller.backend().written, 0);
        assert_eq!(controller.watchdog.0, 0);
        assert_eq!(controller.on_request_complete(None), Reply::text(400, MD5_INVALID));
    }

    #[test]
    fn short_write_reports_500_at_completion() {
        let reboot = RebootScheduler::new();
        let backend = Backend {
            accept_limit: Some(2),
            ..Backend::default()
        };
        let mut controller =
            UpdateController::new(1, backend, Watchdog::default(), Clock(Cell::new(0)), &reboot);
        let outcome = controller.on_upload_chunk(&request(Some(MD5)), chunk(0, b"image", false));
        assert_eq!(outcome, ChunkOutcome::Respond(Reply::text(400, BEGIN_FAILED)));
        controller.on_upload_chunk(&request(Some(MD5)), chunk(5, b"rest", true));
        assert_eq!(controller.backend().written, 2);
        assert_eq!(
            controller.on_request_complete(None),
            Reply::text(500, "Flash Write Failed")
        );
    }

    #[test]
    fn protected_controller_challenges() {
        let reboot = RebootScheduler::new();
        let mut controller = UpdateController::new(
            0xABCD,
            Backend::default(),
            Watchdog::default(),
            Clock(Cell::new(0)),
            &reboot,
        );
        controller.set_auth("admin", "secret").expect("credentials fit");
        assert_eq!(controller.identity(None), Reply::Challenge);
        assert_eq!(controller.page(None), Reply::Challenge);
        assert_eq!(controller.preflight(None), Reply::Challenge);
        let outcome = controller.on_upload_chunk(&request(Some(MD5)), chunk(0, b"x", true));
        assert_eq!(outcome, ChunkOutcome::Respond(Reply::Challenge));
        assert!(controller.session().is_none());
        assert_eq!(controller.on_request_complete(None), Reply::Challenge);
        assert!(!reboot.is_pending());
    }

    #[test]
    fn id_override_takes_precedence() {
        let reboot = RebootScheduler::new();
        let mut controller = UpdateController::new(
            0x00AB_CDEF,
            Backend::default(),
            Watchdog::default(),
            Clock(Cell::new(0)),
            &reboot,
        );
        assert_eq!(controller.id(), "ABCDEF");
        controller.set_id("garage-door");
        assert_eq!(controller.id(), "garage-door");
        assert_eq!(
            controller.identity(None),
            Reply::Identity(DeviceId::from_str_truncated("garage-door"))
        );
    }
}
