use crate::peer::types::ServerConfig;
use rand::Rng;

pub fn random_id() -> String {
    hex::encode(rand::rng().random::<[u8; 8]>())
}

// Prefixes the ICE server url with its scheme when the caller supplied a
// bare host:port.
pub fn add_ice_url_scheme(config: &ServerConfig) -> String {
    if config.url.starts_with("turn:") || config.url.starts_with("stun:") {
        config.url.clone()
    } else {
        let scheme = if config.kind == "turn" { "turn:" } else { "stun:" };
        format!("{}{}", scheme, config.url)
    }
}
