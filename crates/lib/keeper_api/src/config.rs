//! API server configuration.

use chrono::Duration;
use keeper_core::auth::jwt::resolve_jwt_secret;

/// Access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 30 days.
///
/// `Refresh` is itself an authenticated call, and a client drops both tokens
/// once any call is rejected, so this bounds rotation rather than extending a
/// session past an expired access token.
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3200").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Redis connection URL for session bindings.
    pub redis_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Lifetime of access tokens and their session bindings.
    pub access_token_ttl: Duration,
    /// Lifetime of refresh tokens and their session bindings.
    pub refresh_token_ttl: Duration,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                 | Default                            |
    /// |--------------------------|------------------------------------|
    /// | `BIND_ADDR`              | `127.0.0.1:3200`                   |
    /// | `DATABASE_URL`           | `postgres://localhost:5432/keeper` |
    /// | `REDIS_URL`              | `redis://127.0.0.1:6379`           |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file  |
    /// | `ACCESS_TOKEN_TTL_SECS`  | `900`                              |
    /// | `REFRESH_TOKEN_TTL_SECS` | `2592000`                          |
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3200".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/keeper".into()),
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            jwt_secret: resolve_jwt_secret(),
            access_token_ttl: ttl_from_env("ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: ttl_from_env(
                "REFRESH_TOKEN_TTL_SECS",
                DEFAULT_REFRESH_TOKEN_TTL_SECS,
            ),
        }
    }
}

/// Longest accepted token lifetime: one year.
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

fn ttl_from_env(var: &str, default_secs: i64) -> Duration {
    parse_ttl(std::env::var(var).ok().as_deref(), default_secs)
}

/// Positive seconds up to [`MAX_TOKEN_TTL_SECS`]; anything else falls back to the default.
fn parse_ttl(raw: Option<&str>, default_secs: i64) -> Duration {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|s| (1..=MAX_TOKEN_TTL_SECS).contains(s))
        .and_then(Duration::try_seconds)
        .unwrap_or_else(|| Duration::seconds(default_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_parses_positive_seconds() {
        assert_eq!(parse_ttl(Some("60"), 900), Duration::seconds(60));
        assert_eq!(parse_ttl(Some(" 120 "), 900), Duration::seconds(120));
    }

    #[test]
    fn ttl_falls_back_on_bad_values() {
        assert_eq!(parse_ttl(None, 900), Duration::seconds(900));
        assert_eq!(parse_ttl(Some("soon"), 900), Duration::seconds(900));
        assert_eq!(parse_ttl(Some("0"), 900), Duration::seconds(900));
        assert_eq!(parse_ttl(Some("-5"), 900), Duration::seconds(900));
    }

    #[test]
    fn huge_ttl_is_rejected() {
        assert_eq!(
            parse_ttl(Some(&i64::MAX.to_string()), 900),
            Duration::seconds(900)
        );
        let over = (MAX_TOKEN_TTL_SECS + 1).to_string();
        assert_eq!(parse_ttl(Some(&over), 900), Duration::seconds(900));
        let max = MAX_TOKEN_TTL_SECS.to_string();
        assert_eq!(
            parse_ttl(Some(&max), 900),
            Duration::seconds(MAX_TOKEN_TTL_SECS)
        );
    }
}
