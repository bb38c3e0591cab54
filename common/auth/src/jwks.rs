use jsonwebtoken::DecodingKey;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{AuthError, AuthResult};

/// Pulls RS256 verification keys from a JWKS endpoint.
#[derive(Clone)]
pub struct JwksFetcher {
    client: Client,
    url: String,
}

impl JwksFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> AuthResult<Vec<(String, DecodingKey)>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| AuthError::JwksFetch(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::JwksFetch(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body: JwkSet = response
            .json()
            .await
            .map_err(|err| AuthError::JwksDecode(err.to_string()))?;
        body.into_rs256_keys()
    }
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: Option<String>,
    kty: Option<String>,
    alg: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

impl JwkSet {
    /// Keeps usable RSA signing keys; anything else in the set is skipped, not fatal.
    fn into_rs256_keys(self) -> AuthResult<Vec<(String, DecodingKey)>> {
        let mut keys = Vec::new();
        for key in self.keys {
            let Some(kid) = key.kid else {
                debug!("skipping JWKS entry without kid");
                continue;
            };
            if key.kty.as_deref().unwrap_or("RSA") != "RSA" {
                debug!(kid = %kid, kty = ?key.kty, "skipping non-RSA JWKS entry");
                continue;
            }
            if key.alg.as_deref().is_some_and(|alg| alg != "RS256") {
                debug!(kid = %kid, alg = ?key.alg, "skipping JWKS entry with unsupported alg");
                continue;
            }
            let (Some(modulus), Some(exponent)) = (key.n, key.e) else {
                debug!(kid = %kid, "skipping JWKS entry missing RSA components");
                continue;
            };

            let decoding_key = DecodingKey::from_rsa_components(&modulus, &exponent)
                .map_err(|err| AuthError::KeyParse(kid.clone(), err.to_string()))?;
            keys.push((kid, decoding_key));
        }
        Ok(keys)
    }
}
