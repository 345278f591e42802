use crate::cli::actions::Action;
use anyhow::{anyhow, Result};
use secrecy::SecretString;

/// Build the action from parsed arguments.
///
/// # Errors
/// Returns an error when a required argument is missing; clap enforces them
/// first, so this only fires when the matcher was built elsewhere.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let required = |name: &str| -> Result<String> {
        matches
            .get_one::<String>(name)
            .map(String::to_string)
            .ok_or_else(|| anyhow!("missing required argument: --{name}"))
    };

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        redis_url: required("redis-url")?,
        user_service_url: required("user-service-url")?,
        base_url: required("base-url")?,
        jwt_secret: SecretString::from(required("jwt-secret")?),
        access_ttl_seconds: matches
            .get_one::<u64>("access-ttl")
            .copied()
            .unwrap_or(900),
        refresh_ttl_seconds: matches
            .get_one::<u64>("refresh-ttl")
            .copied()
            .unwrap_or(604_800),
        magic_link_access_ttl_seconds: matches
            .get_one::<u64>("magic-link-access-ttl")
            .copied()
            .unwrap_or(86_400),
        trust_ttl_seconds: matches
            .get_one::<u64>("trust-ttl")
            .copied()
            .unwrap_or(2_592_000),
        similarity_threshold: matches
            .get_one::<f64>("similarity-threshold")
            .copied()
            .unwrap_or(0.7),
        totp_issuer: matches
            .get_one::<String>("totp-issuer")
            .map_or_else(|| "gatehouse".to_string(), String::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    #[test]
    fn builds_server_action() {
        let matches = commands::new().get_matches_from(vec![
            "gatehouse",
            "--redis-url",
            "redis://localhost:6379",
            "--user-service-url",
            "http://users.internal:8080",
            "--base-url",
            "https://portal.example.com",
            "--jwt-secret",
            "secret",
            "--port",
            "9999",
        ]);
        let action = handler(&matches).expect("action");
        let Action::Server {
            port,
            redis_url,
            jwt_secret,
            similarity_threshold,
            ..
        } = action;
        assert_eq!(port, 9999);
        assert_eq!(redis_url, "redis://localhost:6379");
        assert_eq!(jwt_secret.expose_secret(), "secret");
        assert!((similarity_threshold - 0.7).abs() < f64::EPSILON);
    }
}
