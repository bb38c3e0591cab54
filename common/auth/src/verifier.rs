use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use jsonwebtoken::{crypto, decode_header, Algorithm, DecodingKey};
use tracing::debug;

use crate::claims::CredentialParts;
use crate::error::{AuthError, AuthResult, CredentialError, MalformedReason};
use crate::jwks::JwksFetcher;

/// Key id used when a credential header carries no `kid`.
pub const DEFAULT_KID: &str = "default";

/// Mandatory step between splitting a credential and trusting its payload.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, parts: &CredentialParts<'_>) -> Result<(), CredentialError>;
}

/// Key family a stored key belongs to. A credential's `alg` must name the same family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Hmac,
    Rsa,
}

impl KeyFamily {
    pub fn of(algorithm: Algorithm) -> Option<Self> {
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Some(Self::Hmac),
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => Some(Self::Rsa),
            _ => None,
        }
    }
}

#[derive(Clone)]
struct StoredKey {
    family: KeyFamily,
    key: DecodingKey,
}

/// Thread-safe store for decoding keys loaded from secrets, PEM or JWKS.
#[derive(Clone, Default)]
pub struct InMemoryKeyStore {
    inner: Arc<RwLock<HashMap<String, StoredKey>>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, kid: String, family: KeyFamily, key: DecodingKey) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(kid, StoredKey { family, key });
    }

    pub fn insert_hmac_secret(&self, kid: impl Into<String>, secret: &[u8]) {
        self.insert(kid.into(), KeyFamily::Hmac, DecodingKey::from_secret(secret));
    }

    /// Stores an RSA key already built from PEM or JWK components.
    pub fn insert_rsa_key(&self, kid: impl Into<String>, key: DecodingKey) {
        self.insert(kid.into(), KeyFamily::Rsa, key);
    }

    pub fn insert_rsa_pem(&self, kid: impl Into<String>, pem: &[u8]) -> AuthResult<()> {
        let kid = kid.into();
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|err| AuthError::KeyParse(kid.clone(), err.to_string()))?;
        self.insert_rsa_key(kid, key);
        Ok(())
    }

    pub fn family(&self, kid: &str) -> Option<KeyFamily> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(kid).map(|stored| stored.family)
    }

    pub fn contains(&self, kid: &str) -> bool {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.contains_key(kid)
    }

    pub fn is_empty(&self) -> bool {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.is_empty()
    }

    /// Finds the key for `kid` if it belongs to `family`.
    ///
    /// The default key is only consulted when `kid` is absent or unknown. A `kid` stored
    /// under the other family resolves to nothing.
    pub fn resolve(&self, kid: Option<&str>, family: KeyFamily) -> Option<DecodingKey> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let stored = match kid.and_then(|kid| guard.get(kid)) {
            Some(stored) => stored,
            None => guard.get(DEFAULT_KID)?,
        };
        (stored.family == family).then(|| stored.key.clone())
    }

    /// Swaps in a fresh RSA key set, keeping the locally configured default key.
    pub fn replace_fetched<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, DecodingKey)>,
    {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let default = guard.remove(DEFAULT_KID);
        guard.clear();
        guard.extend(entries.into_iter().map(|(kid, key)| {
            let stored = StoredKey {
                family: KeyFamily::Rsa,
                key,
            };
            (kid, stored)
        }));
        if let Some(stored) = default {
            guard.insert(DEFAULT_KID.to_string(), stored);
        }
    }
}

/// Verifies JWS signatures against keys held in an [`InMemoryKeyStore`].
///
/// Only algorithms on the allow-list are accepted, so a token cannot pick a weaker
/// algorithm than the deployment configured.
#[derive(Clone)]
pub struct JwtSignatureVerifier {
    store: InMemoryKeyStore,
    algorithms: Vec<Algorithm>,
    jwks: Option<JwksFetcher>,
}

impl JwtSignatureVerifier {
    pub fn builder() -> JwtSignatureVerifierBuilder {
        JwtSignatureVerifierBuilder::new()
    }

    /// Shared-secret verifier, mostly for local setups and tests.
    pub fn hs256(secret: &[u8]) -> Self {
        let store = InMemoryKeyStore::new();
        store.insert_hmac_secret(DEFAULT_KID, secret);
        Self {
            store,
            algorithms: vec![Algorithm::HS256],
            jwks: None,
        }
    }

    pub fn store(&self) -> &InMemoryKeyStore {
        &self.store
    }

    pub fn jwks_fetcher(&self) -> Option<&JwksFetcher> {
        self.jwks.as_ref()
    }

    pub async fn refresh_jwks(&self) -> AuthResult<usize> {
        let fetcher = match &self.jwks {
            Some(fetcher) => fetcher,
            None => return Ok(0),
        };

        let keys = fetcher.fetch().await?;
        let count = keys.len();
        if count > 0 {
            self.store.replace_fetched(keys);
        }
        Ok(count)
    }
}

impl SignatureVerifier for JwtSignatureVerifier {
    fn verify(&self, parts: &CredentialParts<'_>) -> Result<(), CredentialError> {
        let header =
            decode_header(parts.raw()).map_err(|_| CredentialError::from(MalformedReason::Header))?;
        if !self.algorithms.contains(&header.alg) {
            debug!(alg = ?header.alg, "credential uses an algorithm outside the allow-list");
            return Err(CredentialError::InvalidSignature);
        }

        let family = KeyFamily::of(header.alg).ok_or(CredentialError::InvalidSignature)?;
        let Some(key) = self.store.resolve(header.kid.as_deref(), family) else {
            debug!(alg = ?header.alg, kid = ?header.kid, "no key of the credential's family");
            return Err(CredentialError::InvalidSignature);
        };

        match crypto::verify(parts.signature, parts.signing_input().as_bytes(), &key, header.alg) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CredentialError::InvalidSignature),
            Err(err) => {
                debug!(error = %err, "signature check errored");
                Err(CredentialError::InvalidSignature)
            }
        }
    }
}

pub struct JwtSignatureVerifierBuilder {
    store: InMemoryKeyStore,
    algorithms: Vec<Algorithm>,
    jwks: Option<JwksFetcher>,
}

impl JwtSignatureVerifierBuilder {
    fn new() -> Self {
        Self {
            store: InMemoryKeyStore::new(),
            algorithms: Vec::new(),
            jwks: None,
        }
    }

    fn allow(&mut self, algorithm: Algorithm) {
        if !self.algorithms.contains(&algorithm) {
            self.algorithms.push(algorithm);
        }
    }

    pub fn with_hs256_secret(mut self, secret: &[u8]) -> Self {
        self.store.insert_hmac_secret(DEFAULT_KID, secret);
        self.allow(Algorithm::HS256);
        self
    }

    pub fn with_rsa_pem(mut self, kid: impl Into<String>, pem: &[u8]) -> AuthResult<Self> {
        self.store.insert_rsa_pem(kid, pem)?;
        self.allow(Algorithm::RS256);
        Ok(self)
    }

    pub fn with_jwks_url(self, url: impl Into<String>) -> Self {
        self.with_jwks_fetcher(JwksFetcher::new(url))
    }

    pub fn with_jwks_fetcher(mut self, fetcher: JwksFetcher) -> Self {
        self.jwks = Some(fetcher);
        self.allow(Algorithm::RS256);
        self
    }

    pub async fn build(self) -> AuthResult<JwtSignatureVerifier> {
        let verifier = JwtSignatureVerifier {
            store: self.store,
            algorithms: self.algorithms,
            jwks: self.jwks,
        };

        if verifier.jwks.is_some() {
            verifier.refresh_jwks().await?;
        }

        if verifier.store.is_empty() {
            return Err(AuthError::NoVerificationKeys);
        }

        Ok(verifier)
    }
}
