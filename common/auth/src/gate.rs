use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use common_security::{Clock, SystemClock};
use serde::Serialize;
use tracing::{debug, warn};

use crate::bypass::DevBypass;
use crate::claims::{Claims, ClaimsDecoder};
use crate::config::AuthConfig;
use crate::credentials::CredentialExtractor;
use crate::error::{AuthError, CredentialError};
use crate::roles::Role;
use crate::verifier::SignatureVerifier;

/// Identity handed to route handlers once a request has been allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub id: String,
    pub email: Option<String>,
    pub role: Role,
    pub tiers: Vec<String>,
    pub scopes: Vec<String>,
}

impl AuthenticatedUser {
    /// Identity used for the development bypass token.
    pub fn internal() -> Self {
        Self {
            id: "internal".to_string(),
            email: None,
            role: Role::Godmode,
            tiers: Vec::new(),
            scopes: Vec::new(),
        }
    }
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.subject,
            email: claims.email,
            role: claims.role,
            tiers: claims.tiers,
            scopes: claims.scopes,
        }
    }
}

/// Coarse, machine-readable reason attached to a login redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCode {
    MissingCredential,
    InvalidCredential,
    ExpiredCredential,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::MissingCredential => "missing_credential",
            ReasonCode::InvalidCredential => "invalid_credential",
            ReasonCode::ExpiredCredential => "expired_credential",
        }
    }
}

impl From<&CredentialError> for ReasonCode {
    fn from(value: &CredentialError) -> Self {
        match value {
            CredentialError::Expired => ReasonCode::ExpiredCredential,
            CredentialError::Malformed(_) | CredentialError::InvalidSignature => {
                ReasonCode::InvalidCredential
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthzVerdict {
    Allowed(AuthenticatedUser),
    Unauthenticated(ReasonCode),
    /// Valid identity, insufficient role. Carries only the minimum role required.
    Forbidden { required: Role },
}

/// Extract, decode and rank-check in one place.
pub struct AuthorizationGate {
    extractor: CredentialExtractor,
    decoder: ClaimsDecoder,
    bypass: DevBypass,
    clock: Arc<dyn Clock>,
}

impl AuthorizationGate {
    pub fn new(config: &AuthConfig, verifier: Arc<dyn SignatureVerifier>) -> Self {
        let mut extractor = CredentialExtractor::new(config.session_cookie.clone());
        if config.environment.is_development() {
            extractor = extractor.with_dev_cookie(config.dev_cookie.clone());
        }

        Self {
            extractor,
            decoder: ClaimsDecoder::new(verifier),
            bypass: DevBypass::new(config.environment, config.internal_token.clone()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn bypass(&self) -> &DevBypass {
        &self.bypass
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedUser, ReasonCode> {
        let credential = self
            .extractor
            .extract(headers)
            .ok_or(ReasonCode::MissingCredential)?;

        if self.bypass.accepts(&credential.token) {
            warn!(source = ?credential.source, "development bypass token accepted");
            return Ok(AuthenticatedUser::internal());
        }

        self.decoder
            .decode(&credential.token, self.clock.now())
            .map(AuthenticatedUser::from)
            .map_err(|err| {
                debug!(error = %err, source = ?credential.source, "credential rejected");
                ReasonCode::from(&err)
            })
    }

    pub fn evaluate(&self, headers: &HeaderMap, required: &Role) -> AuthzVerdict {
        match self.authenticate(headers) {
            Ok(user) => authorize(user, required),
            Err(reason) => AuthzVerdict::Unauthenticated(reason),
        }
    }
}

pub fn authorize(user: AuthenticatedUser, required: &Role) -> AuthzVerdict {
    if user.role.satisfies(required) {
        AuthzVerdict::Allowed(user)
    } else {
        debug!(user = %user.id, role = %user.role, required = %required, "insufficient role");
        AuthzVerdict::Forbidden {
            required: required.clone(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AuthError::MissingIdentity)
    }
}
