use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

pub const ERROR_CODE_HEADER: &str = "X-Error-Code";

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    fn with_code(code: &str) -> Self {
        Self {
            code: code.to_string(),
            missing_role: None,
            retry_after_secs: None,
            trace_id: None,
            message: None,
        }
    }
}

/// Error surface shared by every HTTP handler. The `code` also travels in `X-Error-Code`.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized { code: &'static str, trace_id: Option<Uuid> },
    ForbiddenMissingRole { role: String, trace_id: Option<Uuid> },
    Forbidden { trace_id: Option<Uuid> },
    BadRequest { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    NotFound { code: &'static str, trace_id: Option<Uuid> },
    TooManyRequests { retry_after_secs: u64, trace_id: Option<Uuid> },
    ServiceUnavailable { code: &'static str, trace_id: Option<Uuid> },
    Internal { trace_id: Option<Uuid>, message: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E, trace_id: Option<Uuid>) -> Self {
        Self::Internal { trace_id, message: Some(e.to_string()) }
    }

    pub fn bad_request(code: &'static str, trace_id: Option<Uuid>) -> Self {
        Self::BadRequest { code, trace_id, message: None }
    }

    pub fn unauthorized(code: &'static str) -> Self {
        Self::Unauthorized { code, trace_id: None }
    }

    pub fn missing_role(role: impl Into<String>) -> Self {
        Self::ForbiddenMissingRole { role: role.into(), trace_id: None }
    }

    pub fn too_many_requests(retry_after_secs: u64) -> Self {
        Self::TooManyRequests { retry_after_secs, trace_id: None }
    }

    pub fn unavailable(code: &'static str) -> Self {
        Self::ServiceUnavailable { code, trace_id: None }
    }

    /// Machine-readable code, identical to the `X-Error-Code` header value.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized { code, .. }
            | ApiError::BadRequest { code, .. }
            | ApiError::NotFound { code, .. }
            | ApiError::ServiceUnavailable { code, .. } => *code,
            ApiError::ForbiddenMissingRole { .. } => "missing_role",
            ApiError::Forbidden { .. } => "forbidden",
            ApiError::TooManyRequests { .. } => "rate_limited",
            ApiError::Internal { .. } => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::ForbiddenMissingRole { .. } | ApiError::Forbidden { .. } => {
                StatusCode::FORBIDDEN
            }
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_code = self.code();
        let base = ErrorBody::with_code(error_code);
        let mut retry_after = None;
        let body = match self {
            ApiError::ForbiddenMissingRole { role, trace_id } => ErrorBody {
                missing_role: Some(role),
                trace_id,
                ..base
            },
            ApiError::BadRequest {
                trace_id, message, ..
            }
            | ApiError::Internal { trace_id, message } => {
                ErrorBody { trace_id, message, ..base }
            }
            ApiError::TooManyRequests { retry_after_secs, trace_id } => {
                retry_after = Some(retry_after_secs);
                ErrorBody {
                    retry_after_secs: Some(retry_after_secs),
                    trace_id,
                    ..base
                }
            }
            ApiError::Unauthorized { trace_id, .. }
            | ApiError::Forbidden { trace_id }
            | ApiError::NotFound { trace_id, .. }
            | ApiError::ServiceUnavailable { trace_id, .. } => ErrorBody { trace_id, ..base },
        };

        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert(ERROR_CODE_HEADER, val);
        }
        if let Some(secs) = retry_after {
            resp.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
