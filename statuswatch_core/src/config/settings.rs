use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub monitor: MonitorConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub config_file: PathBuf,
    pub tick_interval_seconds: u64,
    pub request_timeout_seconds: u64,
    pub max_body_bytes: usize,
    pub max_concurrent_probes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Empty disables persistence.
    pub file: String,
    pub persist_interval_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub debug: bool,
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from("./config.yaml"),
            tick_interval_seconds: 10,
            request_timeout_seconds: 15,
            max_body_bytes: 1024 * 1024,
            max_concurrent_probes: 8,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            file: "./cache.json".to_string(),
            persist_interval_seconds: 2,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("statuswatch").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Ok(port) = std::env::var("PORT") {
            let port: u16 = port.parse().map_err(|e| {
                ConfigError::Message(format!("Invalid Environment Value 'PORT': {}", e))
            })?;
            builder = builder.set_override("server.port", i64::from(port))?;
        }

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        if self.monitor.tick_interval_seconds == 0 {
            return Err(ConfigError::Message(
                "Scheduler tick interval must be greater than 0".to_string(),
            ));
        }

        if self.monitor.request_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.monitor.max_body_bytes == 0 {
            return Err(ConfigError::Message(
                "Maximum response body size must be greater than 0".to_string(),
            ));
        }

        if self.monitor.max_concurrent_probes == 0 {
            return Err(ConfigError::Message(
                "Concurrent probes must be greater than 0".to_string(),
            ));
        }

        if self.cache.persist_interval_seconds == 0 {
            return Err(ConfigError::Message(
                "Cache persist interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn cache_path(&self) -> Option<PathBuf> {
        let file = self.cache.file.trim();
        if file.is_empty() {
            None
        } else {
            Some(PathBuf::from(file))
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.tick_interval_seconds)
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.cache.persist_interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.monitor.request_timeout_seconds)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_seconds)
    }
}
