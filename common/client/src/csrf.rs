use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;

/// Reads the CSRF token the server planted in the cookie jar for `url`, if any.
pub fn csrf_token(jar: &Jar, url: &Url, cookie_name: &str) -> Option<String> {
    let header = jar.cookies(url)?;
    let raw = header.to_str().ok()?;
    find_cookie(raw, cookie_name)
}

/// Looks up one cookie in a `Cookie` header value. Percent-encoded values are decoded.
pub fn find_cookie(raw: &str, name: &str) -> Option<String> {
    raw.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| {
            urlencoding::decode(value)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
        .filter(|value| !value.is_empty())
}
