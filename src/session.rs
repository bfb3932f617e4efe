use crate::config::NegotiationConfig;
use crate::error::SessionError;
use crate::events::{SessionEvent, SessionEvents};
use crate::peer::endpoint::{EndpointEvent, EndpointFactory};
use crate::peer::negotiation::{Negotiation, OfferOutcome};
use crate::peer::state::{NegotiationState, Role, SessionKey};
use crate::peer::types::{PartnerId, RemoteTrackSet, SdpPayload};
use crate::signaling::{Signal, SignalEnvelope, SignalTransport, TransportEvent};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

/// One live pairing: the negotiation machine plus lifecycle bookkeeping.
struct Session {
    key: SessionKey,
    negotiation: Negotiation,
    /// Whether `Connected` has been emitted for this session.
    announced: bool,
    /// Remote media held back until negotiation is stable.
    pending_media: Option<RemoteTrackSet>,
    media_delivered: bool,
}

/// An inbound offer that could not be applied yet. Re-validated against the
/// live session at retry time, never against elapsed time alone.
struct DeferredOffer {
    generation: u64,
    from: PartnerId,
    payload: SdpPayload,
    attempts: u32,
    due: Instant,
}

struct EndpointChannel {
    generation: u64,
    rx: mpsc::UnboundedReceiver<EndpointEvent>,
}

enum Wake {
    Transport(Option<TransportEvent>),
    Endpoint(Option<EndpointEvent>, u64),
    Retry,
}

/// Orchestrates session creation and teardown around the negotiation state
/// machine: reacts to relay pairings, routes inbound signals, forwards
/// locally gathered candidates, and runs the bounded deferred-offer retry
/// queue. At most one session is live at a time; a new pairing replaces and
/// closes the previous one.
pub struct SessionLifecycle {
    local_id: PartnerId,
    config: NegotiationConfig,
    transport: Arc<dyn SignalTransport>,
    factory: Arc<dyn EndpointFactory>,
    events: SessionEvents,
    session: Option<Session>,
    endpoint_rx: Option<EndpointChannel>,
    deferred: VecDeque<DeferredOffer>,
    next_generation: u64,
}

impl SessionLifecycle {
    pub fn new(
        local_id: PartnerId,
        config: NegotiationConfig,
        transport: Arc<dyn SignalTransport>,
        factory: Arc<dyn EndpointFactory>,
        events: SessionEvents,
    ) -> Self {
        SessionLifecycle {
            local_id,
            config,
            transport,
            factory,
            events,
            session: None,
            endpoint_rx: None,
            deferred: VecDeque::new(),
            next_generation: 0,
        }
    }

    pub fn partner_id(&self) -> Option<&PartnerId> {
        self.session.as_ref().map(|s| &s.key.partner_id)
    }

    pub fn negotiation_state(&self) -> Option<NegotiationState> {
        self.session.as_ref().map(|s| s.negotiation.state())
    }

    pub fn is_connected(&self) -> bool {
        self.negotiation_state() == Some(NegotiationState::Stable)
    }

    /// The relay paired us with a partner. Any open session is closed
    /// first; a fresh session is then created and, if we are the caller,
    /// the offer round starts immediately.
    pub async fn on_paired(&mut self, partner_id: PartnerId) -> Result<(), SessionError> {
        self.close_current(false).await;

        let (tx, rx) = mpsc::unbounded_channel();
        let endpoint = match self.factory.create(&partner_id, tx).await {
            Ok(endpoint) => endpoint,
            Err(err @ SessionError::MediaUnavailable) => {
                warn!(partner = %partner_id, "pairing arrived before local media, refusing session");
                self.events.emit(SessionEvent::MediaUnavailable);
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        self.next_generation += 1;
        let generation = self.next_generation;
        let negotiation = Negotiation::new(
            self.local_id.clone(),
            partner_id.clone(),
            endpoint,
            self.transport.clone(),
        );
        info!(partner = %partner_id, role = ?negotiation.role(), generation, "session created");

        self.endpoint_rx = Some(EndpointChannel { generation, rx });
        let mut session = Session {
            key: SessionKey {
                partner_id: partner_id.clone(),
                generation,
            },
            negotiation,
            announced: false,
            pending_media: None,
            media_delivered: false,
        };
        self.events.emit(SessionEvent::Paired { partner_id });

        if session.negotiation.role() == Role::Caller {
            session.negotiation.start().await;
        }
        self.session = Some(session);
        Ok(())
    }

    /// Routes an inbound negotiation message to the session matching its
    /// sender. Messages for an unknown or mismatched partner are discarded
    /// and logged, never fatal.
    pub async fn on_signal(&mut self, envelope: SignalEnvelope) {
        let SignalEnvelope { from, signal, .. } = envelope;
        let deferred = {
            let Some(session) = self.session.as_mut() else {
                let err = SessionError::UnknownPartner(from.clone());
                warn!(%err, kind = signal.kind(), "signal discarded");
                return;
            };
            if session.key.partner_id != from {
                let err = SessionError::UnknownPartner(from.clone());
                warn!(%err, partner = %session.key.partner_id, "signal discarded");
                return;
            }
            match signal {
                Signal::Offer(payload) => {
                    match session.negotiation.handle_offer(&payload).await {
                        OfferOutcome::Deferred => Some(payload),
                        OfferOutcome::Handled => None,
                    }
                }
                Signal::Answer(payload) => {
                    session.negotiation.handle_answer(&payload).await;
                    None
                }
                Signal::Candidate(candidate) => {
                    session.negotiation.handle_candidate(candidate).await;
                    None
                }
            }
        };
        if let Some(payload) = deferred {
            self.defer_offer(from, payload);
        }
        self.announce_if_stable();
    }

    /// User-initiated teardown. The relay is told about it; with no active
    /// session this is a complete no-op.
    pub async fn on_disconnect_requested(&mut self) {
        self.close_current(true).await;
    }

    /// The relay reported loss of the partner.
    pub async fn on_partner_disconnected(&mut self) {
        self.close_current(false).await;
    }

    /// Event-loop driver: multiplexes relay events, the live endpoint's
    /// events and the deferred-offer retry clock. Returns when the relay
    /// event stream ends.
    pub async fn run(mut self, mut transport_rx: mpsc::UnboundedReceiver<TransportEvent>) {
        loop {
            let next_due = self.next_retry_due();
            let mut endpoint_channel = self.endpoint_rx.take();
            let wake = {
                let endpoint_fut = async {
                    match endpoint_channel.as_mut() {
                        Some(channel) => (channel.rx.recv().await, channel.generation),
                        None => std::future::pending().await,
                    }
                };
                let retry_fut = async {
                    match next_due {
                        Some(due) => time::sleep_until(due).await,
                        None => std::future::pending().await,
                    }
                };
                tokio::select! {
                    event = transport_rx.recv() => Wake::Transport(event),
                    (event, generation) = endpoint_fut => Wake::Endpoint(event, generation),
                    _ = retry_fut => Wake::Retry,
                }
            };

            // Hand the event receiver back unless its channel just closed;
            // a session handler below may still replace it.
            if let Some(channel) = endpoint_channel {
                let closed =
                    matches!(wake, Wake::Endpoint(None, generation) if generation == channel.generation);
                let current = self.session.as_ref().map(|s| s.key.generation);
                if !closed && self.endpoint_rx.is_none() && current == Some(channel.generation) {
                    self.endpoint_rx = Some(channel);
                }
            }

            match wake {
                Wake::Transport(Some(TransportEvent::Paired { partner_id })) => {
                    if let Err(err) = self.on_paired(partner_id).await {
                        error!(%err, "pairing failed");
                    }
                }
                Wake::Transport(Some(TransportEvent::Signal(envelope))) => {
                    self.on_signal(envelope).await;
                }
                Wake::Transport(Some(TransportEvent::Disconnected)) => {
                    self.on_partner_disconnected().await;
                }
                Wake::Transport(None) => {
                    self.on_partner_disconnected().await;
                    return;
                }
                Wake::Endpoint(Some(event), generation) => {
                    self.on_endpoint_event(generation, event).await;
                }
                Wake::Endpoint(None, _) => {}
                Wake::Retry => self.fire_due_retries(Instant::now()).await,
            }
        }
    }

    async fn on_endpoint_event(&mut self, generation: u64, event: EndpointEvent) {
        let events = self.events.clone();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.key.generation != generation {
            debug!(generation, "event from a stale endpoint ignored");
            return;
        }
        match event {
            EndpointEvent::LocalCandidate(candidate) => {
                session.negotiation.send_local_candidate(candidate).await;
            }
            EndpointEvent::RemoteMedia(tracks) => {
                if session.media_delivered {
                    debug!("additional remote media ignored");
                } else {
                    session.pending_media = Some(tracks);
                }
            }
            EndpointEvent::ConnectionProblem => events.emit(SessionEvent::ConnectionProblem),
            EndpointEvent::ConnectionRecovering => events.emit(SessionEvent::ConnectionRecovering),
            EndpointEvent::ConnectionRecovered => events.emit(SessionEvent::ConnectionRecovered),
            EndpointEvent::ConnectionFailed => events.emit(SessionEvent::ConnectionFailed),
        }
        self.announce_if_stable();
    }

    /// Emits `Connected` the first time a session reaches Stable, then the
    /// first remote track set once one is available.
    fn announce_if_stable(&mut self) {
        let events = &self.events;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.negotiation.state() == NegotiationState::Stable && !session.announced {
            session.announced = true;
            events.emit(SessionEvent::Connected {
                partner_id: session.key.partner_id.clone(),
            });
        }
        if session.announced && !session.media_delivered {
            if let Some(tracks) = session.pending_media.take() {
                session.media_delivered = true;
                events.emit(SessionEvent::RemoteMedia(tracks));
            }
        }
    }

    fn defer_offer(&mut self, from: PartnerId, payload: SdpPayload) {
        let Some(generation) = self.session.as_ref().map(|s| s.key.generation) else {
            return;
        };
        debug!(partner = %from, delay_ms = self.config.retry_delay.as_millis() as u64,
            "queuing deferred offer for retry");
        self.deferred.push_back(DeferredOffer {
            generation,
            from,
            payload,
            attempts: 0,
            due: Instant::now() + self.config.retry_delay,
        });
    }

    fn next_retry_due(&self) -> Option<Instant> {
        self.deferred.iter().map(|entry| entry.due).min()
    }

    /// Reprocesses every deferred offer whose delay has elapsed. Validity
    /// is re-checked against the current session and state here, so a
    /// deferred retry can never overtake a newer message that already moved
    /// the machine onward.
    pub(crate) async fn fire_due_retries(&mut self, now: Instant) {
        let mut rest = VecDeque::new();
        let mut due = Vec::new();
        while let Some(entry) = self.deferred.pop_front() {
            if entry.due <= now {
                due.push(entry);
            } else {
                rest.push_back(entry);
            }
        }
        self.deferred = rest;
        for entry in due {
            self.retry_offer(entry).await;
        }
    }

    async fn retry_offer(&mut self, entry: DeferredOffer) {
        let outcome = {
            let Some(session) = self.session.as_mut() else {
                debug!("dropping deferred offer, session gone");
                return;
            };
            if session.key.generation != entry.generation
                || session.key.partner_id != entry.from
            {
                debug!("dropping deferred offer for a replaced session");
                return;
            }
            session.negotiation.handle_offer(&entry.payload).await
        };
        match outcome {
            OfferOutcome::Handled => self.announce_if_stable(),
            OfferOutcome::Deferred => {
                let attempts = entry.attempts + 1;
                if attempts >= self.config.max_offer_retries {
                    let err = SessionError::RetryExhausted { attempts };
                    warn!(%err, partner = %entry.from, "closing desynchronized session");
                    self.close_current(false).await;
                } else {
                    self.deferred.push_back(DeferredOffer {
                        attempts,
                        due: Instant::now() + self.config.retry_delay,
                        ..entry
                    });
                }
            }
        }
    }

    /// Both teardown paths converge here. Idempotent; queued retries and
    /// the endpoint event channel die with the session. Only a
    /// user-initiated disconnect notifies the relay.
    async fn close_current(&mut self, notify_relay: bool) {
        self.deferred.clear();
        self.endpoint_rx = None;
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.negotiation.close().await;
        self.events.emit(SessionEvent::Disconnected {
            partner_id: session.key.partner_id.clone(),
        });
        if notify_relay {
            if let Err(err) = self.transport.user_disconnect().await {
                warn!(%err, "failed to notify relay of disconnect");
            }
        }
    }
}
