/// Deployment mode. Anything not explicitly development is treated as production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|raw| raw.trim().to_ascii_lowercase()) {
            Some(mode) if matches!(mode.as_str(), "development" | "dev" | "local") => {
                Environment::Development
            }
            _ => Environment::Production,
        }
    }

    pub fn from_env() -> Self {
        Self::parse(std::env::var("APP_ENV").ok().as_deref())
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Settings for credential discovery and the login redirect.
#[derive(Clone)]
pub struct AuthConfig {
    pub environment: Environment,
    /// Primary session cookie.
    pub session_cookie: String,
    /// Fallback cookie, consulted only in development.
    pub dev_cookie: String,
    /// Login surface unauthenticated requests are sent to.
    pub login_path: String,
    /// Static token accepted as godmode in development only.
    pub internal_token: Option<String>,
}

impl AuthConfig {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            session_cookie: "session".to_string(),
            dev_cookie: "dev_session".to_string(),
            login_path: "/login".to_string(),
            internal_token: None,
        }
    }

    pub fn with_session_cookie(mut self, name: impl Into<String>) -> Self {
        self.session_cookie = name.into();
        self
    }

    pub fn with_dev_cookie(mut self, name: impl Into<String>) -> Self {
        self.dev_cookie = name.into();
        self
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn with_internal_token(mut self, token: Option<String>) -> Self {
        self.internal_token = token.filter(|value| !value.trim().is_empty());
        self
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("environment", &self.environment)
            .field("session_cookie", &self.session_cookie)
            .field("dev_cookie", &self.dev_cookie)
            .field("login_path", &self.login_path)
            .field("internal_token", &self.internal_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_defaults_to_production() {
        assert_eq!(Environment::parse(None), Environment::Production);
        assert_eq!(Environment::parse(Some("")), Environment::Production);
        assert_eq!(Environment::parse(Some("staging")), Environment::Production);
        assert_eq!(Environment::parse(Some("prod")), Environment::Production);
    }

    #[test]
    fn environment_recognises_development() {
        assert_eq!(Environment::parse(Some("Development")), Environment::Development);
        assert_eq!(Environment::parse(Some(" dev ")), Environment::Development);
    }

    #[test]
    fn debug_redacts_internal_token() {
        let config = AuthConfig::new(Environment::Development)
            .with_internal_token(Some("hunter2".into()));
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
