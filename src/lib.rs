//! Negotiation core for relay-paired peer-to-peer video calls: a relay
//! pairs two peers, the lower id calls, and the state machine in
//! [`peer::negotiation`] drives the offer/answer/candidate exchange until
//! the direct connection is stable.

pub mod config;
pub mod error;
pub mod events;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod utils;

pub use config::NegotiationConfig;
pub use error::SessionError;
pub use events::{SessionEvent, SessionEvents};
pub use peer::rtc::{LocalTracks, RtcEndpointFactory};
pub use peer::{
    IceCandidate, NegotiationState, PartnerId, RemoteTrackSet, Role, SdpKind, SdpPayload,
    ServerConfig,
};
pub use session::SessionLifecycle;
pub use signaling::{Signal, SignalEnvelope, SignalTransport, TransportEvent};
