use crate::error::SessionError;
use crate::peer::types::{IceCandidate, PartnerId, RemoteTrackSet, SdpPayload};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Events surfaced by the transport-level connection while a session is
/// live. Delivered on the per-session channel handed to the factory.
#[derive(Debug)]
pub enum EndpointEvent {
    /// A locally gathered network-traversal hint (trickle).
    LocalCandidate(IceCandidate),
    /// Remote media arrived.
    RemoteMedia(RemoteTrackSet),
    /// Connection degraded; a grace timer is running.
    ConnectionProblem,
    ConnectionRecovering,
    ConnectionRecovered,
    /// The grace window elapsed without recovery.
    ConnectionFailed,
}

/// The async negotiation primitives of one transport-level connection.
/// Exactly one endpoint exists per session and is exclusively owned by it;
/// no overlapping invocations of the same primitive are made.
#[async_trait]
pub trait PeerEndpoint: Send + Sync {
    async fn create_offer(&self) -> Result<String, SessionError>;
    async fn create_answer(&self) -> Result<String, SessionError>;
    async fn set_local_description(&self, payload: &SdpPayload) -> Result<(), SessionError>;
    async fn set_remote_description(&self, payload: &SdpPayload) -> Result<(), SessionError>;
    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), SessionError>;
    async fn close(&self) -> Result<(), SessionError>;
}

/// Builds endpoints for new sessions. The factory owns the local media
/// precondition: creation fails with `MediaUnavailable` until the capture
/// collaborator has supplied local tracks.
#[async_trait]
pub trait EndpointFactory: Send + Sync {
    async fn create(
        &self,
        partner_id: &PartnerId,
        events: mpsc::UnboundedSender<EndpointEvent>,
    ) -> Result<Arc<dyn PeerEndpoint>, SessionError>;
}
