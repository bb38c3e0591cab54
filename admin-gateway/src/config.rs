use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use common_auth::{AuthConfig, Environment};
use common_security::RateLimitPolicy;

use crate::client_ip::TrustedProxies;

const DEFAULT_ORIGINS: &str = "http://localhost:3000,http://localhost:3001,http://localhost:5173";

#[derive(Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub session_cookie: String,
    pub dev_cookie: String,
    pub login_path: String,
    pub hs256_secret: Option<String>,
    pub jwks_url: Option<String>,
    pub jwks_refresh_secs: u64,
    pub internal_token: Option<String>,
    pub unlock_secret: Option<String>,
    pub unlock_redirect: String,
    pub unlock_rate_limit: RateLimitPolicy,
    pub redis_url: Option<String>,
    pub rate_limit_prefix: String,
    pub trusted_proxies: TrustedProxies,
    pub allowed_origins: Vec<String>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match var("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT is not a valid port: {raw}"))?,
            None => 8090,
        };
        let hs256_secret = var("AUTH_HS256_SECRET");
        let jwks_url = var("JWT_JWKS_URL");
        if hs256_secret.is_none() && jwks_url.is_none() {
            bail!("AUTH_HS256_SECRET or JWT_JWKS_URL must be set");
        }

        let max = parse_or(var("UNLOCK_RATE_LIMIT_MAX"), "UNLOCK_RATE_LIMIT_MAX", 10u32)?;
        let window_ms = parse_or(
            var("UNLOCK_RATE_LIMIT_WINDOW_MS"),
            "UNLOCK_RATE_LIMIT_WINDOW_MS",
            60_000u64,
        )?;
        let jwks_refresh_secs =
            parse_or(var("JWKS_REFRESH_SECONDS"), "JWKS_REFRESH_SECONDS", 300u64)?;
        let trusted_proxies = match var("TRUSTED_PROXIES") {
            Some(raw) => TrustedProxies::parse(&raw)
                .with_context(|| format!("TRUSTED_PROXIES is not a list of IPs: {raw}"))?,
            None => TrustedProxies::default(),
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            environment: Environment::parse(var("APP_ENV").as_deref()),
            session_cookie: var("AUTH_SESSION_COOKIE").unwrap_or_else(|| "session".to_string()),
            dev_cookie: var("AUTH_DEV_COOKIE").unwrap_or_else(|| "dev_session".to_string()),
            login_path: var("AUTH_LOGIN_PATH").unwrap_or_else(|| "/login".to_string()),
            hs256_secret,
            jwks_url,
            jwks_refresh_secs: jwks_refresh_secs.max(60),
            internal_token: var("AUTH_INTERNAL_TOKEN"),
            unlock_secret: var("UNLOCK_SECRET"),
            unlock_redirect: var("UNLOCK_REDIRECT").unwrap_or_else(|| "/godmode".to_string()),
            unlock_rate_limit: RateLimitPolicy::new(
                max,
                Duration::from_millis(window_ms.max(1_000)),
            ),
            redis_url: var("REDIS_URL"),
            rate_limit_prefix: var("RATE_LIMIT_PREFIX")
                .unwrap_or_else(|| "admin-gateway:rate".to_string()),
            trusted_proxies,
            allowed_origins: var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|| DEFAULT_ORIGINS.to_string())
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
        })
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(self.environment)
            .with_session_cookie(self.session_cookie.clone())
            .with_dev_cookie(self.dev_cookie.clone())
            .with_login_path(self.login_path.clone())
            .with_internal_token(self.internal_token.clone())
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{key} is not a valid number: {value}")),
        None => Ok(default),
    }
}

fn redacted(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "<redacted>")
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("session_cookie", &self.session_cookie)
            .field("dev_cookie", &self.dev_cookie)
            .field("login_path", &self.login_path)
            .field("hs256_secret", &redacted(&self.hs256_secret))
            .field("jwks_url", &self.jwks_url)
            .field("jwks_refresh_secs", &self.jwks_refresh_secs)
            .field("internal_token", &redacted(&self.internal_token))
            .field("unlock_secret", &redacted(&self.unlock_secret))
            .field("unlock_redirect", &self.unlock_redirect)
            .field("unlock_rate_limit", &self.unlock_rate_limit)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "<set>"))
            .field("rate_limit_prefix", &self.rate_limit_prefix)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("allowed_origins", &self.allowed_origins)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<GatewayConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn requires_a_verification_key_source() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("AUTH_HS256_SECRET"));
        assert!(load(&[("AUTH_HS256_SECRET", "  ")]).is_err());
        assert!(load(&[("JWT_JWKS_URL", "https://idp.example.com/jwks")]).is_ok());
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("AUTH_HS256_SECRET", "s")]).unwrap();
        assert_eq!(config.port, 8090);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.session_cookie, "session");
        assert_eq!(config.dev_cookie, "dev_session");
        assert_eq!(config.login_path, "/login");
        assert_eq!(config.unlock_redirect, "/godmode");
        assert_eq!(config.unlock_rate_limit, RateLimitPolicy { max: 10, window_ms: 60_000 });
        assert!(config.unlock_secret.is_none());
        assert!(config.redis_url.is_none());
        assert!(config.trusted_proxies.is_empty());
        assert_eq!(config.allowed_origins.len(), 3);
    }

    #[test]
    fn unknown_app_env_is_production() {
        let config = load(&[("AUTH_HS256_SECRET", "s"), ("APP_ENV", "qa")]).unwrap();
        assert!(!config.environment.is_development());
        let config = load(&[("AUTH_HS256_SECRET", "s"), ("APP_ENV", "development")]).unwrap();
        assert!(config.environment.is_development());
    }

    #[test]
    fn window_is_clamped_and_bad_numbers_rejected() {
        let config =
            load(&[("AUTH_HS256_SECRET", "s"), ("UNLOCK_RATE_LIMIT_WINDOW_MS", "5")]).unwrap();
        assert_eq!(config.unlock_rate_limit.window_ms, 1_000);
        assert!(load(&[("AUTH_HS256_SECRET", "s"), ("UNLOCK_RATE_LIMIT_MAX", "ten")]).is_err());
        assert!(load(&[("AUTH_HS256_SECRET", "s"), ("PORT", "http")]).is_err());
    }

    #[test]
    fn trusted_proxies_are_parsed() {
        let config =
            load(&[("AUTH_HS256_SECRET", "s"), ("TRUSTED_PROXIES", "10.0.0.1, ::1")]).unwrap();
        assert_eq!(config.trusted_proxies, TrustedProxies::parse("10.0.0.1,::1").unwrap());
        assert!(load(&[("AUTH_HS256_SECRET", "s"), ("TRUSTED_PROXIES", "proxy.local")]).is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = load(&[
            ("AUTH_HS256_SECRET", "hs-secret"),
            ("UNLOCK_SECRET", "unlock-secret"),
            ("AUTH_INTERNAL_TOKEN", "internal-secret"),
        ])
        .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hs-secret"));
        assert!(!rendered.contains("unlock-secret"));
        assert!(!rendered.contains("internal-secret"));
    }
}
