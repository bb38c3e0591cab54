use reqwest::StatusCode;
use thiserror::Error;

use crate::request::ResponseBody;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(#[source] BoxError),
    #[error("request failed with status {status}")]
    Status { status: StatusCode, body: ResponseBody },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl ClientError {
    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ClientError::InvalidRequest(err.to_string())
        } else {
            ClientError::Network(Box::new(err))
        }
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid channel endpoint: {0}")]
    Endpoint(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed frame: {0}")]
    Protocol(String),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("channel closed")]
    Closed,
}
