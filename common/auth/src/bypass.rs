use common_security::constant_time_eq;

use crate::config::Environment;

/// Static internal token accepted in place of a signed credential, development only.
#[derive(Clone)]
pub struct DevBypass {
    environment: Environment,
    token: Option<String>,
}

impl DevBypass {
    pub fn new(environment: Environment, token: Option<String>) -> Self {
        Self {
            environment,
            token: token.filter(|value| !value.is_empty()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Environment::Production, None)
    }

    pub fn is_active(&self) -> bool {
        self.environment.is_development() && self.token.is_some()
    }

    pub fn accepts(&self, credential: &str) -> bool {
        // The mode check must come first: in production the token is never even compared.
        if !self.environment.is_development() {
            return false;
        }
        match self.token.as_deref() {
            Some(expected) => constant_time_eq(credential.as_bytes(), expected.as_bytes()),
            None => false,
        }
    }
}

impl std::fmt::Debug for DevBypass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevBypass")
            .field("environment", &self.environment)
            .field("active", &self.is_active())
            .finish()
    }
}
