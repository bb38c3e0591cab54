//! Long-lived, reconnecting, order-preserving realtime channels.

mod analytics;
mod channel;
mod registry;
mod transport;

pub use analytics::{ChannelAnalytics, ChannelEvent, HttpAnalytics, NoopAnalytics};
pub use channel::{ChannelStatus, RealtimeChannel};
pub use registry::ChannelRegistry;
pub use transport::{ChannelConnection, ChannelTransport, WebSocketTransport};
