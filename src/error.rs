use thiserror::Error;

/// Failure taxonomy for a negotiation session. Everything here is handled
/// locally by the session that raised it; only `MediaUnavailable` is meant
/// to reach the user.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Local capture is not available yet; no session can be created.
    #[error("local media unavailable")]
    MediaUnavailable,

    /// An inbound offer/answer arrived in a state that cannot accept it.
    #[error("{signal} received in state {state:?}")]
    StateMismatch { signal: &'static str, state: crate::peer::NegotiationState },

    /// An underlying description/candidate primitive failed. The session
    /// keeps its pre-failure state so a later retry can still succeed.
    #[error("negotiation primitive failed: {0}")]
    Negotiation(String),

    /// The deferred-offer retry cap was exhausted; the session is
    /// desynchronized and has been closed.
    #[error("offer retry cap exhausted after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    /// A signaling message referenced a partner with no active session.
    #[error("no active session for partner {0}")]
    UnknownPartner(String),

    /// The relay rejected or dropped an outbound message.
    #[error("signal transport failed: {0}")]
    Transport(String),

    /// An ICE server entry failed validation.
    #[error("invalid ice server config: {0}")]
    InvalidIceServer(String),
}

impl SessionError {
    /// Wraps a primitive failure, keeping only its message.
    pub fn primitive(err: impl std::fmt::Display) -> Self {
        SessionError::Negotiation(err.to_string())
    }
}
