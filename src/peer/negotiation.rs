use crate::error::SessionError;
use crate::peer::endpoint::PeerEndpoint;
use crate::peer::ice::CandidateBuffer;
use crate::peer::state::{NegotiationState, Role};
use crate::peer::types::{IceCandidate, PartnerId, SdpKind, SdpPayload};
use crate::signaling::{Signal, SignalEnvelope, SignalTransport};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What became of an inbound offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    /// Processed (or dropped for good cause); nothing left to do.
    Handled,
    /// The current state cannot accept an offer. The caller must queue a
    /// bounded retry; the offer is never simply discarded.
    Deferred,
}

/// Owns one session's negotiation state and drives the offer/answer
/// exchange over the signal transport. All primitive failures are caught
/// here: they are logged and leave the machine in its pre-failure state so
/// a later retry can still succeed. Only an explicit close (or the
/// lifecycle's exhausted retry cap) reaches `Closed`.
pub struct Negotiation {
    local_id: PartnerId,
    partner_id: PartnerId,
    role: Role,
    state: NegotiationState,
    candidates: CandidateBuffer,
    endpoint: Arc<dyn PeerEndpoint>,
    transport: Arc<dyn SignalTransport>,
}

impl Negotiation {
    pub fn new(
        local_id: PartnerId,
        partner_id: PartnerId,
        endpoint: Arc<dyn PeerEndpoint>,
        transport: Arc<dyn SignalTransport>,
    ) -> Self {
        let role = Role::derive(&local_id, &partner_id);
        Negotiation {
            local_id,
            partner_id,
            role,
            state: NegotiationState::Idle,
            candidates: CandidateBuffer::new(),
            endpoint,
            transport,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn partner_id(&self) -> &PartnerId {
        &self.partner_id
    }

    /// Caller side: create and send the initial offer. The callee never
    /// spontaneously offers, so this is a no-op for it.
    pub async fn start(&mut self) {
        if self.role != Role::Caller {
            return;
        }
        if self.state != NegotiationState::Idle {
            warn!(state = ?self.state, "offer requested outside Idle, ignoring");
            return;
        }
        self.state = NegotiationState::CreatingOffer;
        let sdp = match self.endpoint.create_offer().await {
            Ok(sdp) => sdp,
            Err(err) => {
                warn!(%err, "create_offer failed");
                self.state = NegotiationState::Idle;
                return;
            }
        };
        let payload = SdpPayload::new(SdpKind::Offer, sdp);
        if let Err(err) = self.endpoint.set_local_description(&payload).await {
            warn!(%err, "setting local offer failed");
            self.state = NegotiationState::Idle;
            return;
        }
        self.send(Signal::Offer(payload)).await;
        self.state = NegotiationState::OfferSent;
        info!(partner = %self.partner_id, "offer sent");
    }

    /// Inbound offer. Accepted only in Idle or Stable; anywhere else the
    /// offer is handed back as `Deferred` for a bounded retry.
    pub async fn handle_offer(&mut self, payload: &SdpPayload) -> OfferOutcome {
        if self.state == NegotiationState::Closed {
            debug!("offer for closed session dropped");
            return OfferOutcome::Handled;
        }
        if !self.state.accepts_offer() {
            debug!(state = ?self.state, "offer cannot be applied yet, deferring");
            return OfferOutcome::Deferred;
        }
        let entry_state = self.state;
        if let Err(err) = self.endpoint.set_remote_description(payload).await {
            warn!(%err, "accepting remote offer failed");
            return OfferOutcome::Handled;
        }
        self.state = NegotiationState::OfferReceived;
        self.candidates.flush(self.endpoint.as_ref()).await;

        let sdp = match self.endpoint.create_answer().await {
            Ok(sdp) => sdp,
            Err(err) => {
                warn!(%err, "create_answer failed");
                self.state = entry_state;
                return OfferOutcome::Handled;
            }
        };
        let answer = SdpPayload::new(SdpKind::Answer, sdp);
        if let Err(err) = self.endpoint.set_local_description(&answer).await {
            warn!(%err, "setting local answer failed");
            self.state = entry_state;
            return OfferOutcome::Handled;
        }
        self.state = NegotiationState::AnswerSent;
        self.send(Signal::Answer(answer)).await;
        // Nothing further is expected from the partner for this round.
        self.state = NegotiationState::Stable;
        info!(partner = %self.partner_id, "answer sent, negotiation stable");
        OfferOutcome::Handled
    }

    /// Inbound answer. Only meaningful while an offer of ours is
    /// outstanding; a stale answer from an old round is logged and dropped
    /// without touching state.
    pub async fn handle_answer(&mut self, payload: &SdpPayload) {
        if self.state != NegotiationState::OfferSent {
            let err = SessionError::StateMismatch {
                signal: "answer",
                state: self.state,
            };
            warn!(%err, "discarding stale answer");
            return;
        }
        if let Err(err) = self.endpoint.set_remote_description(payload).await {
            warn!(%err, "accepting remote answer failed");
            return;
        }
        self.candidates.flush(self.endpoint.as_ref()).await;
        self.state = NegotiationState::Stable;
        info!(partner = %self.partner_id, "answer accepted, negotiation stable");
    }

    /// Inbound trickle hint: applied immediately once a remote description
    /// has been accepted, queued until then.
    pub async fn handle_candidate(&mut self, candidate: IceCandidate) {
        if self.state == NegotiationState::Closed {
            return;
        }
        if self.candidates.remote_ready() {
            if let Err(err) = self.endpoint.add_ice_candidate(&candidate).await {
                warn!(%err, "failed to add ice candidate");
            }
        } else {
            self.candidates.push(candidate);
        }
    }

    /// Forwards a locally gathered hint to the partner (trickle).
    pub async fn send_local_candidate(&self, candidate: IceCandidate) {
        self.send(Signal::Candidate(candidate)).await;
    }

    /// Tears the connection down. Idempotent; `Closed` is terminal.
    pub async fn close(&mut self) {
        if self.state == NegotiationState::Closed {
            return;
        }
        if let Err(err) = self.endpoint.close().await {
            warn!(%err, "error closing connection");
        }
        self.candidates.clear();
        self.state = NegotiationState::Closed;
        info!(partner = %self.partner_id, "session closed");
    }

    async fn send(&self, signal: Signal) {
        let kind = signal.kind();
        let envelope = SignalEnvelope {
            to: self.partner_id.clone(),
            from: self.local_id.clone(),
            signal,
        };
        if let Err(err) = self.transport.send(envelope).await {
            warn!(%err, kind, "failed to send signal");
        }
    }
}
