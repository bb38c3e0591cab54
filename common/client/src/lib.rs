pub mod backoff;
pub mod cancel;
pub mod config;
pub mod csrf;
pub mod error;
pub mod realtime;
pub mod request;
pub mod retry;

pub use backoff::Backoff;
pub use cancel::CancelToken;
pub use config::{ClientConfig, RealtimeConfig};
pub use error::{ChannelError, ClientError};
pub use realtime::{
    ChannelAnalytics, ChannelConnection, ChannelEvent, ChannelRegistry, ChannelStatus,
    ChannelTransport, HttpAnalytics, NoopAnalytics, RealtimeChannel, WebSocketTransport,
};
pub use request::{ApiClient, RequestSpec, ResponseBody};
pub use retry::{is_idempotent, run_with_retry, RetryPolicy};
