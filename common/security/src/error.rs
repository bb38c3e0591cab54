use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("rate limit store failure: {0}")]
    Store(String),
    #[error("rate limit record for '{0}' is corrupt: {1}")]
    CorruptRecord(String, String),
}

impl From<redis::RedisError> for SecurityError {
    fn from(value: redis::RedisError) -> Self {
        Self::Store(value.to_string())
    }
}
