use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use webrtc::track::track_remote::TrackRemote;

/// Opaque peer identifier assigned by the relay.
pub type PartnerId = String;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Session description with metadata, as carried inside a signal envelope.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SdpPayload {
    pub kind: SdpKind,
    pub sdp: String,
    pub id: String,
    pub ts: i64,
}

impl SdpPayload {
    pub fn new(kind: SdpKind, sdp: String) -> Self {
        SdpPayload {
            kind,
            sdp,
            id: crate::utils::random_id(),
            ts: chrono::Utc::now().timestamp(),
        }
    }
}

/// Network-traversal hint advertised by a peer (trickle ICE).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
}

/// ICE server entry, 'stun' or 'turn'.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// First remote track set delivered by the transport-level connection.
/// Handed to the rendering side once negotiation is stable.
#[derive(Clone, Default)]
pub struct RemoteTrackSet {
    pub stream_id: String,
    pub tracks: Vec<Arc<TrackRemote>>,
}

impl fmt::Debug for RemoteTrackSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrackSet")
            .field("stream_id", &self.stream_id)
            .field("tracks", &self.tracks.len())
            .finish()
    }
}
