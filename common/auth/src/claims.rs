use std::sync::Arc;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CredentialError, MalformedReason};
use crate::roles::Role;
use crate::verifier::SignatureVerifier;

// Issuers differ on whether they pad; accept both.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Identity and permissions carried by a credential, after validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Claims {
    pub subject: String,
    pub email: Option<String>,
    pub role: Role,
    pub tiers: Vec<String>,
    pub scopes: Vec<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    /// Parses a base64url payload segment. Expiry is checked by the decoder, not here.
    pub fn from_payload(segment: &str) -> Result<Self, MalformedReason> {
        let claims = Self::parse_fields(segment)?;
        claims.check_lifetime()?;
        Ok(claims)
    }

    fn parse_fields(segment: &str) -> Result<Self, MalformedReason> {
        let bytes = PAYLOAD_ENGINE
            .decode(segment)
            .map_err(|_| MalformedReason::Encoding)?;
        let repr: ClaimsRepr =
            serde_json::from_slice(&bytes).map_err(|err| MalformedReason::Json(err.to_string()))?;
        Claims::try_from(repr)
    }

    /// `exp` must come strictly after `iat` when both are present.
    fn check_lifetime(&self) -> Result<(), MalformedReason> {
        match self.issued_at {
            Some(issued_at) if self.expires_at <= issued_at => {
                Err(MalformedReason::InvalidClaim("exp"))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    tiers: Option<Vec<String>>,
    #[serde(default)]
    scopes: Option<Vec<String>>,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    exp: Option<i64>,
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = MalformedReason;

    fn try_from(value: ClaimsRepr) -> Result<Self, Self::Error> {
        let subject = value
            .sub
            .filter(|sub| !sub.trim().is_empty())
            .ok_or(MalformedReason::MissingClaim("sub"))?;
        let role = value
            .role
            .filter(|role| !role.trim().is_empty())
            .map(|role| Role::parse(&role))
            .ok_or(MalformedReason::MissingClaim("role"))?;
        let exp = value.exp.ok_or(MalformedReason::MissingClaim("exp"))?;

        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or(MalformedReason::InvalidClaim("exp"))?;
        let issued_at = match value.iat {
            Some(iat) => Some(
                Utc.timestamp_opt(iat, 0)
                    .single()
                    .ok_or(MalformedReason::InvalidClaim("iat"))?,
            ),
            None => None,
        };

        Ok(Self {
            subject,
            email: value.email.filter(|email| !email.trim().is_empty()),
            role,
            tiers: value.tiers.unwrap_or_default(),
            scopes: value.scopes.unwrap_or_default(),
            issued_at,
            expires_at,
        })
    }
}

/// The three dot-separated segments of a credential.
#[derive(Debug, Clone, Copy)]
pub struct CredentialParts<'a> {
    raw: &'a str,
    pub header: &'a str,
    pub payload: &'a str,
    pub signature: &'a str,
}

impl<'a> CredentialParts<'a> {
    pub fn split(token: &'a str) -> Result<Self, MalformedReason> {
        let segments: Vec<&str> = token.split('.').collect();
        match segments.as_slice() {
            &[header, payload, signature] => Ok(Self {
                raw: token,
                header,
                payload,
                signature,
            }),
            other => Err(MalformedReason::SegmentCount(other.len())),
        }
    }

    pub fn raw(&self) -> &'a str {
        self.raw
    }

    /// `header.payload`, the bytes the signature covers.
    pub fn signing_input(&self) -> &'a str {
        &self.raw[..self.header.len() + 1 + self.payload.len()]
    }
}

/// Turns a raw credential into trusted claims: split, verify signature, parse, check expiry.
#[derive(Clone)]
pub struct ClaimsDecoder {
    verifier: Arc<dyn SignatureVerifier>,
}

impl ClaimsDecoder {
    pub fn new(verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self { verifier }
    }

    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, CredentialError> {
        let parts = CredentialParts::split(token)?;
        self.verifier.verify(&parts)?;
        let claims = Claims::parse_fields(parts.payload)?;
        if claims.expires_at <= now {
            return Err(CredentialError::Expired);
        }
        claims.check_lifetime()?;
        Ok(claims)
    }
}
