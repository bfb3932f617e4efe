//! `webrtc`-backed endpoint. Everything that touches the webrtc crate
//! lives here; the negotiation core only sees the `PeerEndpoint` seam.

use crate::config::NegotiationConfig;
use crate::error::SessionError;
use crate::peer::endpoint::{EndpointEvent, EndpointFactory, PeerEndpoint};
use crate::peer::types::{IceCandidate, PartnerId, RemoteTrackSet, SdpKind, SdpPayload};
use crate::utils::add_ice_url_scheme;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Locally captured tracks, owned by the media collaborator; the factory
/// only holds a shared reference.
pub type LocalTracks = Vec<Arc<dyn TrackLocal + Send + Sync>>;

/// Builds one `RTCPeerConnection` per session. Creation fails with
/// `MediaUnavailable` until `set_local_tracks` has been called.
pub struct RtcEndpointFactory {
    config: NegotiationConfig,
    local_tracks: Mutex<Option<LocalTracks>>,
}

impl RtcEndpointFactory {
    pub fn new(config: NegotiationConfig) -> Self {
        RtcEndpointFactory {
            config,
            local_tracks: Mutex::new(None),
        }
    }

    /// Supplies the local capture tracks; the session precondition.
    pub fn set_local_tracks(&self, tracks: LocalTracks) {
        *self.local_tracks.lock().unwrap() = Some(tracks);
    }
}

#[async_trait]
impl EndpointFactory for RtcEndpointFactory {
    async fn create(
        &self,
        partner_id: &PartnerId,
        events: mpsc::UnboundedSender<EndpointEvent>,
    ) -> Result<Arc<dyn PeerEndpoint>, SessionError> {
        let tracks = self
            .local_tracks
            .lock()
            .unwrap()
            .clone()
            .ok_or(SessionError::MediaUnavailable)?;
        let endpoint = RtcEndpoint::connect(&self.config, partner_id, tracks, events).await?;
        Ok(Arc::new(endpoint))
    }
}

pub struct RtcEndpoint {
    pc: Arc<RTCPeerConnection>,
}

impl RtcEndpoint {
    async fn connect(
        config: &NegotiationConfig,
        partner_id: &PartnerId,
        tracks: LocalTracks,
        events: mpsc::UnboundedSender<EndpointEvent>,
    ) -> Result<Self, SessionError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(SessionError::primitive)?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(SessionError::primitive)?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(
            api.new_peer_connection(rtc_configuration(config))
                .await
                .map_err(SessionError::primitive)?,
        );
        info!(partner = %partner_id, "peer connection created");

        for track in tracks {
            pc.add_track(track).await.map_err(SessionError::primitive)?;
        }

        // Trickle: every locally gathered candidate is handed to the
        // lifecycle, which forwards it through the relay.
        let candidate_events = events.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            if let Some(candidate) = candidate {
                match candidate.to_json() {
                    Ok(init) => {
                        let _ = candidate_events.send(EndpointEvent::LocalCandidate(IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_mline_index: init.sdp_mline_index,
                        }));
                    }
                    Err(err) => warn!(%err, "failed to serialize local candidate"),
                }
            } else {
                debug!("local candidate gathering completed");
            }
            Box::pin(async {})
        }));

        let track_events = events.clone();
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>, _receiver: Arc<RTCRtpReceiver>, _transceiver: Arc<RTCRtpTransceiver>| {
                debug!(stream = %track.stream_id(), kind = %track.kind(), "remote track arrived");
                let _ = track_events.send(EndpointEvent::RemoteMedia(RemoteTrackSet {
                    stream_id: track.stream_id(),
                    tracks: vec![track],
                }));
                Box::pin(async {})
            },
        ));

        attach_state_monitor(&pc, config.grace_period, events);

        Ok(RtcEndpoint { pc })
    }
}

#[async_trait]
impl PeerEndpoint for RtcEndpoint {
    async fn create_offer(&self) -> Result<String, SessionError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(SessionError::primitive)?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String, SessionError> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(SessionError::primitive)?;
        Ok(answer.sdp)
    }

    async fn set_local_description(&self, payload: &SdpPayload) -> Result<(), SessionError> {
        let description = to_rtc_description(payload)?;
        self.pc
            .set_local_description(description)
            .await
            .map_err(SessionError::primitive)
    }

    async fn set_remote_description(&self, payload: &SdpPayload) -> Result<(), SessionError> {
        let description = to_rtc_description(payload)?;
        self.pc
            .set_remote_description(description)
            .await
            .map_err(SessionError::primitive)
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), SessionError> {
        self.pc
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate.clone(),
                sdp_mid: candidate.sdp_mid.clone(),
                sdp_mline_index: candidate.sdp_mline_index,
                username_fragment: None,
            })
            .await
            .map_err(SessionError::primitive)
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.pc.close().await.map_err(SessionError::primitive)
    }
}

fn to_rtc_description(payload: &SdpPayload) -> Result<RTCSessionDescription, SessionError> {
    match payload.kind {
        SdpKind::Offer => RTCSessionDescription::offer(payload.sdp.clone()),
        SdpKind::Answer => RTCSessionDescription::answer(payload.sdp.clone()),
    }
    .map_err(SessionError::primitive)
}

fn rtc_configuration(config: &NegotiationConfig) -> RTCConfiguration {
    let ice_servers = config
        .ice_servers
        .iter()
        .map(|server| RTCIceServer {
            urls: vec![add_ice_url_scheme(server)],
            username: server.username.clone().unwrap_or_default(),
            credential: server.credential.clone().unwrap_or_default(),
        })
        .collect();
    RTCConfiguration {
        ice_servers,
        ice_candidate_pool_size: config.ice_candidate_pool_size,
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

/// Watches the transport-level connection state and reports problems with
/// a grace window: a connection that degrades gets `grace_period` to come
/// back before `ConnectionFailed` is emitted. Advisory only; teardown stays
/// with the lifecycle.
fn attach_state_monitor(
    pc: &Arc<RTCPeerConnection>,
    grace_period: std::time::Duration,
    events: mpsc::UnboundedSender<EndpointEvent>,
) {
    let grace_task: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>> = Arc::new(Mutex::new(None));
    let pc_state = Arc::downgrade(pc);

    pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
        debug!(?state, "peer connection state changed");
        match state {
            RTCPeerConnectionState::Connected => {
                let recovering = grace_task.lock().unwrap().take();
                if let Some(handle) = recovering {
                    handle.abort();
                    let _ = events.send(EndpointEvent::ConnectionRecovered);
                }
            }
            RTCPeerConnectionState::Disconnected | RTCPeerConnectionState::Failed => {
                if grace_task.lock().unwrap().is_some() {
                    return Box::pin(async {});
                }
                let _ = events.send(EndpointEvent::ConnectionProblem);
                let _ = events.send(EndpointEvent::ConnectionRecovering);
                let handle = tokio::spawn({
                    let pc = pc_state.clone();
                    let events = events.clone();
                    async move {
                        sleep(grace_period).await;
                        let recovered = pc
                            .upgrade()
                            .map(|pc| pc.connection_state() == RTCPeerConnectionState::Connected)
                            .unwrap_or(false);
                        if !recovered {
                            let _ = events.send(EndpointEvent::ConnectionFailed);
                        }
                    }
                });
                *grace_task.lock().unwrap() = Some(handle);
            }
            RTCPeerConnectionState::Closed => {
                if let Some(handle) = grace_task.lock().unwrap().take() {
                    handle.abort();
                }
            }
            _ => {}
        }
        Box::pin(async {})
    }));
}
