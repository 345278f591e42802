use crate::api::{self, AuthConfig};
use crate::cli::actions::Action;
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            redis_url,
            user_service_url,
            base_url,
            jwt_secret,
            access_ttl_seconds,
            refresh_ttl_seconds,
            magic_link_access_ttl_seconds,
            trust_ttl_seconds,
            similarity_threshold,
            totp_issuer,
        } => {
            let auth_config = AuthConfig::new(base_url, jwt_secret)
                .with_access_ttl_seconds(access_ttl_seconds)
                .with_refresh_ttl_seconds(refresh_ttl_seconds)
                .with_magic_link_access_ttl_seconds(magic_link_access_ttl_seconds)
                .with_trust_ttl_seconds(trust_ttl_seconds)
                .with_similarity_threshold(similarity_threshold)
                .with_totp_issuer(totp_issuer);

            api::new(port, &redis_url, &user_service_url, auth_config).await?;
        }
    }

    Ok(())
}
