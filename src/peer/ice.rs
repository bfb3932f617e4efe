use crate::peer::endpoint::PeerEndpoint;
use crate::peer::types::IceCandidate;
use tracing::{debug, warn};

/// Holds trickle candidates that arrive before the remote description is
/// applicable. Flushed exactly once, right after the remote description is
/// accepted; afterwards candidates are applied directly.
#[derive(Debug, Default)]
pub struct CandidateBuffer {
    pending: Vec<IceCandidate>,
    remote_ready: bool,
}

impl CandidateBuffer {
    pub fn new() -> Self {
        CandidateBuffer::default()
    }

    /// Whether the remote description has been accepted, i.e. candidates
    /// can be applied immediately.
    pub fn remote_ready(&self) -> bool {
        self.remote_ready
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Queues a candidate that cannot be applied yet.
    pub fn push(&mut self, candidate: IceCandidate) {
        debug!(candidate = %candidate.candidate, queued = self.pending.len() + 1,
            "remote description not set yet, queuing candidate");
        self.pending.push(candidate);
    }

    /// Applies all queued candidates strictly in arrival order and marks
    /// the buffer ready. A failing candidate is logged and skipped; it does
    /// not abort the rest of the flush.
    pub async fn flush(&mut self, endpoint: &dyn PeerEndpoint) {
        self.remote_ready = true;
        let pending = std::mem::take(&mut self.pending);
        for candidate in pending {
            debug!(candidate = %candidate.candidate, "applying queued candidate");
            if let Err(err) = endpoint.add_ice_candidate(&candidate).await {
                warn!(%err, "failed to apply queued candidate");
            }
        }
    }

    /// Dropped on teardown; queued hints for a closed session are useless.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.remote_ready = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::peer::types::SdpPayload;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEndpoint {
        applied: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl PeerEndpoint for RecordingEndpoint {
        async fn create_offer(&self) -> Result<String, SessionError> {
            unreachable!()
        }
        async fn create_answer(&self) -> Result<String, SessionError> {
            unreachable!()
        }
        async fn set_local_description(&self, _: &SdpPayload) -> Result<(), SessionError> {
            unreachable!()
        }
        async fn set_remote_description(&self, _: &SdpPayload) -> Result<(), SessionError> {
            unreachable!()
        }
        async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), SessionError> {
            if self.fail_on.as_deref() == Some(candidate.candidate.as_str()) {
                return Err(SessionError::primitive("candidate rejected"));
            }
            self.applied.lock().unwrap().push(candidate.candidate.clone());
            Ok(())
        }
        async fn close(&self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    fn hint(tag: &str) -> IceCandidate {
        IceCandidate {
            candidate: tag.into(),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
        }
    }

    #[tokio::test]
    async fn flush_applies_in_arrival_order_and_clears() {
        let endpoint = RecordingEndpoint::default();
        let mut buffer = CandidateBuffer::new();
        buffer.push(hint("first"));
        buffer.push(hint("second"));
        buffer.push(hint("third"));
        assert!(!buffer.remote_ready());

        buffer.flush(&endpoint).await;

        assert!(buffer.remote_ready());
        assert_eq!(buffer.pending_len(), 0);
        assert_eq!(
            *endpoint.applied.lock().unwrap(),
            vec!["first".to_string(), "second".into(), "third".into()]
        );
    }

    #[tokio::test]
    async fn second_flush_applies_nothing_twice() {
        let endpoint = RecordingEndpoint::default();
        let mut buffer = CandidateBuffer::new();
        buffer.push(hint("only"));
        buffer.flush(&endpoint).await;
        buffer.flush(&endpoint).await;
        assert_eq!(endpoint.applied.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_candidate_does_not_abort_flush() {
        let endpoint = RecordingEndpoint {
            fail_on: Some("bad".into()),
            ..Default::default()
        };
        let mut buffer = CandidateBuffer::new();
        buffer.push(hint("good-1"));
        buffer.push(hint("bad"));
        buffer.push(hint("good-2"));

        buffer.flush(&endpoint).await;

        assert_eq!(
            *endpoint.applied.lock().unwrap(),
            vec!["good-1".to_string(), "good-2".into()]
        );
    }
}
