pub mod clock;
pub mod error;
pub mod headers;
pub mod rate_limit;
pub mod secret;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SecurityError;
pub use headers::apply_hardening_headers;
pub use rate_limit::{RateDecision, RateLimitPolicy, RateLimiter, RateRecord};
pub use secret::constant_time_eq;
pub use store::{InMemoryRateStore, RateLimitStore, RedisRateStore};
