use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("gatehouse")
        .about("Authentication, session and device trust service")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("GATEHOUSE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("redis-url")
                .short('r')
                .long("redis-url")
                .help("Ephemeral store URL, example: redis://localhost:6379")
                .env("GATEHOUSE_REDIS_URL")
                .required(true),
        )
        .arg(
            Arg::new("user-service-url")
                .long("user-service-url")
                .help("Base URL of the internal user directory service")
                .env("GATEHOUSE_USER_SERVICE_URL")
                .required(true),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .help("Public frontend base URL, used for magic links and CORS")
                .env("GATEHOUSE_BASE_URL")
                .required(true),
        )
        .arg(
            Arg::new("jwt-secret")
                .long("jwt-secret")
                .help("HS256 signing secret for access and refresh tokens")
                .env("GATEHOUSE_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("access-ttl")
                .long("access-ttl")
                .help("Access token lifetime in seconds")
                .default_value("900")
                .env("GATEHOUSE_ACCESS_TTL")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("refresh-ttl")
                .long("refresh-ttl")
                .help("Refresh token lifetime in seconds")
                .default_value("604800")
                .env("GATEHOUSE_REFRESH_TTL")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("magic-link-access-ttl")
                .long("magic-link-access-ttl")
                .help("Access token lifetime in seconds for magic-link sessions")
                .default_value("86400")
                .env("GATEHOUSE_MAGIC_LINK_ACCESS_TTL")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("trust-ttl")
                .long("trust-ttl")
                .help("Trusted-device lifetime in seconds")
                .default_value("2592000")
                .env("GATEHOUSE_TRUST_TTL")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("similarity-threshold")
                .long("similarity-threshold")
                .help("Fingerprint similarity required to redeem a magic link")
                .default_value("0.7")
                .env("GATEHOUSE_SIMILARITY_THRESHOLD")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("totp-issuer")
                .long("totp-issuer")
                .help("Issuer shown in authenticator apps")
                .default_value("gatehouse")
                .env("GATEHOUSE_TOTP_ISSUER"),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("GATEHOUSE_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
