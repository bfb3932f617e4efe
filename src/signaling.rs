use crate::error::SessionError;
use crate::peer::types::{IceCandidate, PartnerId, SdpPayload};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One negotiation message, relay-agnostic.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Signal {
    Offer(SdpPayload),
    Answer(SdpPayload),
    Candidate(IceCandidate),
}

impl Signal {
    pub fn kind(&self) -> &'static str {
        match self {
            Signal::Offer(_) => "offer",
            Signal::Answer(_) => "answer",
            Signal::Candidate(_) => "candidate",
        }
    }
}

/// Addressed signaling message as routed by the relay.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignalEnvelope {
    pub to: PartnerId,
    pub from: PartnerId,
    pub signal: Signal,
}

/// Inbound events delivered by the relay adapter.
#[derive(Debug)]
pub enum TransportEvent {
    /// The relay paired us with a partner. Exactly once per new pairing.
    Paired { partner_id: PartnerId },
    /// A negotiation message from the paired partner.
    Signal(SignalEnvelope),
    /// The relay reports loss of the partner or of our own relay link.
    Disconnected,
}

/// Outbound half of the relay adapter. Delivery is fire-and-forget: no
/// acknowledgement and no retries live at this layer.
#[async_trait]
pub trait SignalTransport: Send + Sync {
    async fn send(&self, envelope: SignalEnvelope) -> Result<(), SessionError>;

    /// Explicit local teardown notice, sent only for user-initiated
    /// disconnects.
    async fn user_disconnect(&self) -> Result<(), SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::types::SdpKind;

    #[test]
    fn envelope_wire_shape() {
        let envelope = SignalEnvelope {
            to: "B".into(),
            from: "A".into(),
            signal: Signal::Offer(SdpPayload {
                kind: SdpKind::Offer,
                sdp: "v=0".into(),
                id: "deadbeef".into(),
                ts: 1717171717,
            }),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["to"], "B");
        assert_eq!(value["from"], "A");
        assert_eq!(value["signal"]["type"], "offer");
        assert_eq!(value["signal"]["payload"]["sdp"], "v=0");

        let back: SignalEnvelope = serde_json::from_value(value).unwrap();
        assert_eq!(back.signal.kind(), "offer");
    }

    #[test]
    fn candidate_signal_wire_shape() {
        let envelope = SignalEnvelope {
            to: "A".into(),
            from: "B".into(),
            signal: Signal::Candidate(IceCandidate {
                candidate: "candidate:1 1 udp 2130706431 192.0.2.1 54400 typ host".into(),
                sdp_mid: Some("0".into()),
                sdp_mline_index: Some(0),
            }),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["signal"]["type"], "candidate");
        assert_eq!(value["signal"]["payload"]["sdp_mline_index"], 0);
    }
}
