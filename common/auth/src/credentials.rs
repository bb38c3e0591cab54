use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};
use headers::{Cookie, HeaderMapExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    AuthorizationHeader,
    SessionCookie,
    DevCookie,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub source: CredentialSource,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Finds the bearer credential on a request.
///
/// Priority is fixed: `Authorization: Bearer` beats the session cookie, which beats the
/// development cookie, so programmatic callers are never overridden by a stale cookie.
#[derive(Debug, Clone)]
pub struct CredentialExtractor {
    session_cookie: String,
    dev_cookie: Option<String>,
}

impl CredentialExtractor {
    pub fn new(session_cookie: impl Into<String>) -> Self {
        Self {
            session_cookie: session_cookie.into(),
            dev_cookie: None,
        }
    }

    pub fn with_dev_cookie(mut self, name: impl Into<String>) -> Self {
        self.dev_cookie = Some(name.into());
        self
    }

    pub fn extract(&self, headers: &HeaderMap) -> Option<Credential> {
        if let Some(token) = headers.get(AUTHORIZATION).and_then(parse_bearer) {
            return Some(Credential {
                token,
                source: CredentialSource::AuthorizationHeader,
            });
        }

        let cookies = headers.typed_get::<Cookie>()?;
        if let Some(token) = cookie_value(&cookies, &self.session_cookie) {
            return Some(Credential {
                token,
                source: CredentialSource::SessionCookie,
            });
        }

        let dev_cookie = self.dev_cookie.as_deref()?;
        cookie_value(&cookies, dev_cookie).map(|token| Credential {
            token,
            source: CredentialSource::DevCookie,
        })
    }
}

fn cookie_value(cookies: &Cookie, name: &str) -> Option<String> {
    cookies
        .get(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn parse_bearer(value: &HeaderValue) -> Option<String> {
    let raw = value.to_str().ok()?.trim();
    let token = raw.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_owned())
}
