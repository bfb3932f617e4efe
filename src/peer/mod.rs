pub mod endpoint;
pub mod ice;
pub mod negotiation;
pub mod rtc;
pub mod state;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use endpoint::{EndpointEvent, EndpointFactory, PeerEndpoint};
pub use ice::CandidateBuffer;
pub use negotiation::{Negotiation, OfferOutcome};
pub use state::{NegotiationState, Role, SessionKey};
pub use types::{IceCandidate, PartnerId, RemoteTrackSet, SdpKind, SdpPayload, ServerConfig};
