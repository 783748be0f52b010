pub mod handle;
pub mod settings;
pub mod targets;

pub use handle::{ConfigHandle, LoadedConfiguration};
pub use settings::{AppConfig, CacheConfig, LoggingConfig, MonitorConfig, ServerConfig};
pub use targets::{
    resolve_endpoint_url, AuthorizationSettings, Configuration, Endpoint, Group, TargetStatus,
    MIN_REFRESH_INTERVAL_SECONDS,
};
