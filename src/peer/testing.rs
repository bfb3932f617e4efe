//! In-crate mocks for the endpoint and transport seams, shared by the
//! negotiation and lifecycle tests.

use crate::error::SessionError;
use crate::peer::endpoint::{EndpointEvent, EndpointFactory, PeerEndpoint};
use crate::peer::types::{IceCandidate, PartnerId, SdpPayload};
use crate::signaling::{SignalEnvelope, SignalTransport};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Default)]
pub struct MockEndpoint {
    local: Mutex<Option<SdpPayload>>,
    remote: Mutex<Option<SdpPayload>>,
    applied: Mutex<Vec<IceCandidate>>,
    close_calls: AtomicUsize,
    fail_create_offer: AtomicBool,
    fail_create_answer: AtomicBool,
    fail_set_local: AtomicBool,
    fail_set_remote: AtomicBool,
}

impl MockEndpoint {
    pub fn local_description(&self) -> Option<SdpPayload> {
        self.local.lock().unwrap().clone()
    }

    pub fn remote_description(&self) -> Option<SdpPayload> {
        self.remote.lock().unwrap().clone()
    }

    pub fn applied_candidates(&self) -> Vec<IceCandidate> {
        self.applied.lock().unwrap().clone()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn fail_next_create_offer(&self) {
        self.fail_create_offer.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_create_answer(&self) {
        self.fail_create_answer.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_set_local(&self) {
        self.fail_set_local.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_set_remote(&self) {
        self.fail_set_remote.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PeerEndpoint for MockEndpoint {
    async fn create_offer(&self) -> Result<String, SessionError> {
        if self.fail_create_offer.swap(false, Ordering::SeqCst) {
            return Err(SessionError::primitive("create_offer refused"));
        }
        Ok("v=0 mock-offer".into())
    }

    async fn create_answer(&self) -> Result<String, SessionError> {
        if self.fail_create_answer.swap(false, Ordering::SeqCst) {
            return Err(SessionError::primitive("create_answer refused"));
        }
        Ok("v=0 mock-answer".into())
    }

    async fn set_local_description(&self, payload: &SdpPayload) -> Result<(), SessionError> {
        if self.fail_set_local.swap(false, Ordering::SeqCst) {
            return Err(SessionError::primitive("set_local_description refused"));
        }
        *self.local.lock().unwrap() = Some(payload.clone());
        Ok(())
    }

    async fn set_remote_description(&self, payload: &SdpPayload) -> Result<(), SessionError> {
        if self.fail_set_remote.swap(false, Ordering::SeqCst) {
            return Err(SessionError::primitive("set_remote_description refused"));
        }
        *self.remote.lock().unwrap() = Some(payload.clone());
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), SessionError> {
        self.applied.lock().unwrap().push(candidate.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<SignalEnvelope>>,
    user_disconnects: AtomicUsize,
}

impl MockTransport {
    pub fn sent(&self) -> Vec<SignalEnvelope> {
        self.sent.lock().unwrap().clone()
    }

    pub fn user_disconnects(&self) -> usize {
        self.user_disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalTransport for MockTransport {
    async fn send(&self, envelope: SignalEnvelope) -> Result<(), SessionError> {
        self.sent.lock().unwrap().push(envelope);
        Ok(())
    }

    async fn user_disconnect(&self) -> Result<(), SessionError> {
        self.user_disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory returning one fresh `MockEndpoint` per session. Event senders
/// are retained so the endpoint channel stays open for the test's lifetime.
#[derive(Default)]
pub struct MockFactory {
    media_missing: AtomicBool,
    created: Mutex<Vec<Arc<MockEndpoint>>>,
    event_txs: Mutex<Vec<mpsc::UnboundedSender<EndpointEvent>>>,
}

impl MockFactory {
    pub fn set_media_available(&self, available: bool) {
        self.media_missing.store(!available, Ordering::SeqCst);
    }

    pub fn last_endpoint(&self) -> Arc<MockEndpoint> {
        self.created.lock().unwrap().last().unwrap().clone()
    }
}

#[async_trait]
impl EndpointFactory for MockFactory {
    async fn create(
        &self,
        _partner_id: &PartnerId,
        events: mpsc::UnboundedSender<EndpointEvent>,
    ) -> Result<Arc<dyn PeerEndpoint>, SessionError> {
        if self.media_missing.load(Ordering::SeqCst) {
            return Err(SessionError::MediaUnavailable);
        }
        let endpoint = Arc::new(MockEndpoint::default());
        self.created.lock().unwrap().push(endpoint.clone());
        self.event_txs.lock().unwrap().push(events);
        Ok(endpoint)
    }
}
