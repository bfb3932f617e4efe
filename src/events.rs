use crate::peer::types::{PartnerId, RemoteTrackSet};
use tokio::sync::mpsc;
use tracing::debug;

/// Events surfaced to the embedding application.
#[derive(Debug)]
pub enum SessionEvent {
    /// A session was created for this partner.
    Paired { partner_id: PartnerId },
    /// Negotiation reached Stable.
    Connected { partner_id: PartnerId },
    /// First remote track set, delivered once per session after Stable.
    RemoteMedia(RemoteTrackSet),
    ConnectionProblem,
    ConnectionRecovering,
    ConnectionRecovered,
    ConnectionFailed,
    /// Local capture was not available when a pairing arrived; no session
    /// was created.
    MediaUnavailable,
    /// The session was torn down (user request, partner loss, retry cap,
    /// or replacement by a new pairing).
    Disconnected { partner_id: PartnerId },
}

/// Emitter handed to the lifecycle; the receiving half goes to the app.
#[derive(Clone)]
pub struct SessionEvents {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionEvents {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionEvents { tx }, rx)
    }

    pub fn emit(&self, event: SessionEvent) {
        debug!(?event, "session event");
        // The app dropping its receiver must not break negotiation.
        let _ = self.tx.send(event);
    }
}
