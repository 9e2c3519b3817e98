//! Environment-variable configuration, parsed once at startup with
//! documented fallback defaults on any parse failure.

use std::env;
use std::time::Duration;
use tracing::warn;

fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(var = key, value = %raw, "failed to parse env var, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_secs(key: &str, default_secs: u64) -> Duration {
    Duration::from_secs(env_or_default(key, default_secs))
}

/// All tunables the gateway reads from the process environment.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub pool_capacity: usize,
    pub browser_idle_timeout: Duration,
    pub browser_max_age: Duration,
    pub browser_max_requests: u32,
    pub challenge_timeout: Duration,
    pub challenge_wait: Duration,
    pub session_max_idle: Duration,
    pub session_db_path: String,
    pub idle_shutdown: Duration,
    pub allow_unauthenticated: bool,
    pub required_feature: Option<String>,
    pub driver_path: Option<String>,
    pub disable_stealth: bool,
    pub hmac_secret: Option<String>,
    pub jwks_issuer: Option<String>,
    pub jwks_url: Option<String>,
    pub captcha_providers: Vec<ProviderConfig>,
}

/// One configured external CAPTCHA-solving provider, in the order its
/// API key was found (constructor order determines chain-dispatch order).
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub api_key: String,
    pub base_url: String,
}

impl GatewayConfig {
    /// Parses configuration from the process environment, falling back to
    /// documented defaults on any parse failure rather than aborting.
    pub fn from_env() -> Self {
        let mut captcha_providers = Vec::new();
        if let Ok(key) = env::var("GATEWAY_2CAPTCHA_API_KEY") {
            captcha_providers.push(ProviderConfig {
                name: "2captcha".to_string(),
                api_key: key,
                base_url: env::var("GATEWAY_2CAPTCHA_BASE_URL")
                    .unwrap_or_else(|_| "https://api.2captcha.com".to_string()),
            });
        }
        if let Ok(key) = env::var("GATEWAY_CAPMONSTER_API_KEY") {
            captcha_providers.push(ProviderConfig {
                name: "capmonster".to_string(),
                api_key: key,
                base_url: env::var("GATEWAY_CAPMONSTER_BASE_URL")
                    .unwrap_or_else(|_| "https://api.capmonster.cloud".to_string()),
            });
        }

        Self {
            port: env_or_default("GATEWAY_PORT", 8191),
            pool_capacity: env_or_default("GATEWAY_POOL_CAPACITY", 10),
            browser_idle_timeout: env_secs("GATEWAY_BROWSER_IDLE_TIMEOUT_SECS", 300),
            browser_max_age: env_secs("GATEWAY_BROWSER_MAX_AGE_SECS", 1800),
            browser_max_requests: env_or_default("GATEWAY_BROWSER_MAX_REQUESTS", 100),
            challenge_timeout: env_secs("GATEWAY_CHALLENGE_TIMEOUT_SECS", 60),
            challenge_wait: env_secs("GATEWAY_CHALLENGE_WAIT_SECS", 30),
            session_max_idle: env_secs("GATEWAY_SESSION_MAX_IDLE_SECS", 600),
            session_db_path: env::var("GATEWAY_SESSION_DB_PATH")
                .unwrap_or_else(|_| ":memory:".to_string()),
            idle_shutdown: env_secs("GATEWAY_IDLE_SHUTDOWN_SECS", 0),
            allow_unauthenticated: env_or_default("GATEWAY_ALLOW_UNAUTHENTICATED", false),
            required_feature: env::var("GATEWAY_REQUIRED_FEATURE").ok(),
            driver_path: env::var("GATEWAY_DRIVER_PATH").ok(),
            disable_stealth: env_or_default("GATEWAY_DISABLE_STEALTH", false),
            hmac_secret: env::var("GATEWAY_HMAC_SECRET").ok(),
            jwks_issuer: env::var("GATEWAY_JWKS_ISSUER").ok(),
            jwks_url: env::var("GATEWAY_JWKS_URL").ok(),
            captcha_providers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_table_when_env_unset() {
        // Use keys that are extremely unlikely to be set in a test runner.
        let cfg = GatewayConfig {
            port: env_or_default("GATEWAY_PORT_UNSET_PROBE", 8191),
            pool_capacity: env_or_default("GATEWAY_POOL_CAPACITY_UNSET_PROBE", 10),
            browser_idle_timeout: env_secs("GATEWAY_BROWSER_IDLE_TIMEOUT_SECS_UNSET_PROBE", 300),
            browser_max_age: env_secs("GATEWAY_BROWSER_MAX_AGE_SECS_UNSET_PROBE", 1800),
            browser_max_requests: env_or_default("GATEWAY_BROWSER_MAX_REQUESTS_UNSET_PROBE", 100),
            challenge_timeout: env_secs("GATEWAY_CHALLENGE_TIMEOUT_SECS_UNSET_PROBE", 60),
            challenge_wait: env_secs("GATEWAY_CHALLENGE_WAIT_SECS_UNSET_PROBE", 30),
            session_max_idle: env_secs("GATEWAY_SESSION_MAX_IDLE_SECS_UNSET_PROBE", 600),
            session_db_path: ":memory:".to_string(),
            idle_shutdown: env_secs("GATEWAY_IDLE_SHUTDOWN_SECS_UNSET_PROBE", 0),
            allow_unauthenticated: false,
            required_feature: None,
            driver_path: None,
            disable_stealth: false,
            hmac_secret: None,
            jwks_issuer: None,
            jwks_url: None,
            captcha_providers: Vec::new(),
        };

        assert_eq!(cfg.port, 8191);
        assert_eq!(cfg.pool_capacity, 10);
        assert_eq!(cfg.browser_idle_timeout, Duration::from_secs(300));
        assert_eq!(cfg.browser_max_age, Duration::from_secs(1800));
        assert_eq!(cfg.browser_max_requests, 100);
        assert_eq!(cfg.challenge_timeout, Duration::from_secs(60));
        assert_eq!(cfg.challenge_wait, Duration::from_secs(30));
        assert_eq!(cfg.session_max_idle, Duration::from_secs(600));
        assert_eq!(cfg.idle_shutdown, Duration::from_secs(0));
        assert!(!cfg.allow_unauthenticated);
    }
}
