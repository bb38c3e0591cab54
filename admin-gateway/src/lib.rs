pub mod app;
pub mod app_state;
pub mod client_ip;
pub mod config;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod route_policy;
pub mod unlock;

pub use crate::app::build_router;
pub use crate::app_state::AppState;
pub use crate::config::GatewayConfig;
pub use crate::metrics::GatewayMetrics;
pub use crate::route_policy::RoutePolicy;
