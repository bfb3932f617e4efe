use crate::peer::types::PartnerId;

/// Who initiates the offer for this pairing. Assigned exactly once per
/// session, before any offer is created, and immutable afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Caller,
    Callee,
}

impl Role {
    /// Both sides derive the same, opposite roles from the pair of relay
    /// ids: the lexicographically lower id calls. This removes any
    /// "whoever is faster" ambiguity, so true glare cannot occur.
    ///
    /// The ids must be distinct; the relay never pairs a peer with itself.
    pub fn derive(local_id: &str, partner_id: &str) -> Role {
        debug_assert_ne!(local_id, partner_id, "relay paired a peer with itself");
        if local_id < partner_id {
            Role::Caller
        } else {
            Role::Callee
        }
    }
}

/// Negotiation progress for one session. `Closed` is terminal: a closed
/// session processes no further messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    CreatingOffer,
    OfferSent,
    OfferReceived,
    AnswerSent,
    Stable,
    Closed,
}

impl NegotiationState {
    /// States in which an inbound offer can be processed. Anywhere else the
    /// offer is deferred, not discarded.
    pub fn accepts_offer(self) -> bool {
        matches!(self, NegotiationState::Idle | NegotiationState::Stable)
    }
}

/// Identifies one live pairing. The generation counter increases every time
/// a session is created, so completions belonging to a replaced session can
/// be recognized and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey {
    pub partner_id: PartnerId,
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_derivation_is_asymmetric() {
        assert_eq!(Role::derive("aaa", "bbb"), Role::Caller);
        assert_eq!(Role::derive("bbb", "aaa"), Role::Callee);
    }

    #[test]
    fn exactly_one_caller_per_pairing() {
        let pairs = [("A", "B"), ("zz", "aa"), ("p1", "p2")];
        for (a, b) in pairs {
            let callers = [Role::derive(a, b), Role::derive(b, a)]
                .iter()
                .filter(|r| **r == Role::Caller)
                .count();
            assert_eq!(callers, 1);
        }
    }

    #[test]
    #[should_panic(expected = "relay paired a peer with itself")]
    fn self_pairing_is_rejected() {
        Role::derive("same", "same");
    }

    #[test]
    fn only_idle_and_stable_accept_offers() {
        assert!(NegotiationState::Idle.accepts_offer());
        assert!(NegotiationState::Stable.accepts_offer());
        for state in [
            NegotiationState::CreatingOffer,
            NegotiationState::OfferSent,
            NegotiationState::OfferReceived,
            NegotiationState::AnswerSent,
            NegotiationState::Closed,
        ] {
            assert!(!state.accepts_offer());
        }
    }
}
