use crate::error::SessionError;
use crate::peer::types::ServerConfig;
use std::time::Duration;

/// Delay before a deferred inbound offer is reprocessed.
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

/// How many times a deferred offer is retried before the session is
/// considered desynchronized and closed.
pub const MAX_OFFER_RETRIES: u32 = 3;

/// Window granted to a degraded connection before it is reported failed.
pub const GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Tuning knobs for one negotiation core instance.
#[derive(Debug, Clone)]
pub struct NegotiationConfig {
    pub retry_delay: Duration,
    pub max_offer_retries: u32,
    pub grace_period: Duration,
    pub ice_servers: Vec<ServerConfig>,
    pub ice_candidate_pool_size: u8,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        NegotiationConfig {
            retry_delay: RETRY_DELAY,
            max_offer_retries: MAX_OFFER_RETRIES,
            grace_period: GRACE_PERIOD,
            ice_servers: default_ice_servers(),
            ice_candidate_pool_size: 10,
        }
    }
}

impl NegotiationConfig {
    /// Replaces the ICE server list after validating each entry. TURN
    /// servers require credentials.
    pub fn with_ice_servers(mut self, servers: Vec<ServerConfig>) -> Result<Self, SessionError> {
        for server in &servers {
            if server.url.is_empty() {
                return Err(SessionError::InvalidIceServer(format!(
                    "server {} has an empty url",
                    server.id
                )));
            }
            if server.kind == "turn" && (server.username.is_none() || server.credential.is_none()) {
                return Err(SessionError::InvalidIceServer(format!(
                    "turn server {} requires username and credential",
                    server.id
                )));
            }
        }
        self.ice_servers = servers;
        Ok(self)
    }
}

pub fn default_ice_servers() -> Vec<ServerConfig> {
    vec![
        ServerConfig {
            id: "default-stun-0".into(),
            kind: "stun".into(),
            url: "stun:stun.l.google.com:19302".into(),
            username: None,
            credential: None,
        },
        ServerConfig {
            id: "default-stun-1".into(),
            kind: "stun".into(),
            url: "stun:stun1.l.google.com:19302".into(),
            username: None,
            credential: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_without_credentials_is_rejected() {
        let servers = vec![ServerConfig {
            id: "t0".into(),
            kind: "turn".into(),
            url: "turn:turn.example.com:3478".into(),
            username: Some("user".into()),
            credential: None,
        }];
        assert!(matches!(
            NegotiationConfig::default().with_ice_servers(servers),
            Err(SessionError::InvalidIceServer(_))
        ));
    }

    #[test]
    fn valid_servers_replace_defaults() {
        let servers = vec![ServerConfig {
            id: "s0".into(),
            kind: "stun".into(),
            url: "stun.example.com".into(),
            username: None,
            credential: None,
        }];
        let config = NegotiationConfig::default().with_ice_servers(servers).unwrap();
        assert_eq!(config.ice_servers.len(), 1);
    }
}
