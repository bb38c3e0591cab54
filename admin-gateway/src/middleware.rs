use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Request, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use common_auth::{AuthenticatedUser, AuthzVerdict, ReasonCode};
use common_http_errors::ApiError;
use common_security::apply_hardening_headers;
use tracing::{debug, warn};

use crate::app_state::AppState;

pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");
pub const USER_EMAIL_HEADER: HeaderName = HeaderName::from_static("x-user-email");
pub const USER_ROLE_HEADER: HeaderName = HeaderName::from_static("x-user-role");

/// Gate every request whose path the route policy protects.
pub async fn authorize(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // Identity headers are only ever set here; anything the caller sent is a spoof.
    strip_identity_headers(request.headers_mut());

    let Some(required) = state.policy.required_role(request.uri().path()).cloned() else {
        return next.run(request).await;
    };

    let verdict = state.gate.evaluate(request.headers(), &required);
    state.metrics.record_verdict(&verdict);

    let mut response = match verdict {
        AuthzVerdict::Allowed(user) => {
            debug!(
                path = %request.uri().path(),
                user = %user.id,
                role = %user.role,
                "request authorized"
            );
            attach_identity(request.headers_mut(), &user);
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        AuthzVerdict::Unauthenticated(reason) => {
            warn!(
                path = %request.uri().path(),
                reason = reason.as_str(),
                "authentication required"
            );
            login_redirect(&state.config.login_path, request.uri(), reason).into_response()
        }
        AuthzVerdict::Forbidden { required } => {
            warn!(path = %request.uri().path(), required = %required, "insufficient role");
            ApiError::missing_role(required.as_str()).into_response()
        }
    };
    apply_hardening_headers(response.headers_mut());
    response
}

fn strip_identity_headers(headers: &mut HeaderMap) {
    for name in [USER_ID_HEADER, USER_EMAIL_HEADER, USER_ROLE_HEADER] {
        headers.remove(name);
    }
}

fn attach_identity(headers: &mut HeaderMap, user: &AuthenticatedUser) {
    let mut set = |name: HeaderName, value: &str| {
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(name, value);
        }
    };
    set(USER_ID_HEADER, &user.id);
    if let Some(email) = &user.email {
        set(USER_EMAIL_HEADER, email);
    }
    set(USER_ROLE_HEADER, user.role.as_str());
}

/// `307` to the login surface with the original path and query preserved.
pub fn login_redirect(login_path: &str, original: &Uri, reason: ReasonCode) -> Redirect {
    let original = original
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");
    let target = format!(
        "{login_path}?redirect={}&error={}",
        urlencoding::encode(original),
        reason.as_str()
    );
    Redirect::temporary(&target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;

    #[test]
    fn redirect_preserves_path_and_query() {
        let uri: Uri = "/admin/users?tab=active&page=2".parse().unwrap();
        let response =
            login_redirect("/login", &uri, ReasonCode::ExpiredCredential).into_response();
        assert_eq!(response.status(), axum::http::StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "/login?redirect=%2Fadmin%2Fusers%3Ftab%3Dactive%26page%3D2&error=expired_credential"
        );
    }
}
