use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Why a credential could not be turned into trusted claims.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("malformed credential: {0}")]
    Malformed(MalformedReason),
    #[error("credential signature rejected")]
    InvalidSignature,
    #[error("credential expired")]
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReason {
    #[error("expected 3 segments, found {0}")]
    SegmentCount(usize),
    #[error("header segment is not a valid token header")]
    Header,
    #[error("payload segment is not base64url")]
    Encoding,
    #[error("payload is not a claims object: {0}")]
    Json(String),
    #[error("missing required claim '{0}'")]
    MissingClaim(&'static str),
    #[error("invalid claim '{0}'")]
    InvalidClaim(&'static str),
}

impl From<MalformedReason> for CredentialError {
    fn from(value: MalformedReason) -> Self {
        Self::Malformed(value)
    }
}

/// Setup and key-management failures, plus the extractor rejection for handlers.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no verification key configured")]
    NoVerificationKeys,
    #[error("failed to parse decoding key for kid '{0}': {1}")]
    KeyParse(String, String),
    #[error("failed to fetch JWKS: {0}")]
    JwksFetch(String),
    #[error("failed to parse JWKS response: {0}")]
    JwksDecode(String),
    #[error("request carries no authenticated identity")]
    MissingIdentity,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Internal detail never leaves the process; callers only see a coarse code.
        let (status, code) = match &self {
            AuthError::MissingIdentity => (StatusCode::UNAUTHORIZED, "missing_credential"),
            AuthError::NoVerificationKeys
            | AuthError::KeyParse(_, _)
            | AuthError::JwksFetch(_)
            | AuthError::JwksDecode(_) => (StatusCode::SERVICE_UNAVAILABLE, "auth_unavailable"),
        };
        tracing::warn!(error = %self, code, "auth error response");
        (status, Json(ErrorBody { code })).into_response()
    }
}
