pub mod server;

use secrecy::SecretString;

/// Action to be executed by the binary after argument parsing.
#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        redis_url: String,
        user_service_url: String,
        base_url: String,
        jwt_secret: SecretString,
        access_ttl_seconds: u64,
        refresh_ttl_seconds: u64,
        magic_link_access_ttl_seconds: u64,
        trust_ttl_seconds: u64,
        similarity_threshold: f64,
        totp_issuer: String,
    },
}
