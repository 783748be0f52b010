//! Main entry point for the statuswatch binary

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use statuswatch_core::{
    config::LoggingConfig, create_app, run_server, shutdown_signal, AppConfig, AppState,
    BackgroundTasks, CachePersister, ConfigHandle, LoadedConfiguration, Monitor, ReqwestTransport,
    ResultStore, SystemClock,
};
#[cfg(unix)]
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "statuswatch", version, about = "Monitors HTTP endpoints and serves their latest status")]
struct Cli {
    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind to.
    #[arg(long)]
    host: Option<String>,

    /// Target model (YAML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Result cache file. An empty value disables persistence.
    #[arg(long)]
    cache: Option<String>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn apply(self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(path) = self.config {
            config.monitor.config_file = path;
        }
        if let Some(cache) = self.cache {
            config.cache.file = cache;
        }
        if self.debug {
            config.logging.debug = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    cli.apply(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    init_tracing(&config.logging);

    let loaded = LoadedConfiguration::load(&config.monitor.config_file).with_context(|| {
        format!(
            "Failed to load target configuration from {}",
            config.monitor.config_file.display()
        )
    })?;
    info!(
        title = %loaded.targets.title,
        groups = loaded.targets.groups.len(),
        authorization = loaded.authorizer.mode(),
        "Target configuration loaded"
    );

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let store = ResultStore::new();
    let persister = CachePersister::new(config.cache_path(), config.persist_interval());
    match persister.path() {
        Some(path) => info!("Using cache file {}", path.display()),
        None => info!("Result persistence disabled"),
    }
    persister.load_into(&store);

    let transport = ReqwestTransport::new(config.request_timeout(), config.monitor.max_body_bytes)?;
    let monitor = Arc::new(Monitor::new(
        ConfigHandle::new(loaded),
        store,
        Arc::new(transport),
        Arc::new(SystemClock),
        config.monitor.max_concurrent_probes,
    ));

    #[cfg_attr(not(unix), allow(unused_mut))]
    let mut tasks = BackgroundTasks::start(monitor.clone(), persister, config.tick_interval());

    #[cfg(unix)]
    {
        let reload = reload_on_signal(
            monitor.clone(),
            config.monitor.config_file.clone(),
            tasks.probe_shutdown(),
        );
        tasks.track(tokio::spawn(reload));
    }

    let state = AppState::new(monitor);
    info!("{} v{}", state.app_name, state.version);

    let served = run_server(create_app(state), addr, shutdown_signal()).await;
    if let Err(e) = &served {
        error!("Server error: {}", e);
    }

    if tokio::time::timeout(config.shutdown_timeout(), tasks.shutdown())
        .await
        .is_err()
    {
        warn!(
            "Background tasks did not stop within {}s",
            config.shutdown_timeout().as_secs()
        );
    }

    info!("Server shutdown complete");
    served.map_err(Into::into)
}

/// Re-reads the target model on SIGUSR1. A broken file keeps the current
/// model in place.
#[cfg(unix)]
async fn reload_on_signal(monitor: Arc<Monitor>, path: PathBuf, mut shutdown: watch::Receiver<bool>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut reload = match signal(SignalKind::user_defined1()) {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to install SIGUSR1 handler: {}", e);
            return;
        }
    };

    loop {
        tokio::select! {
            received = reload.recv() => {
                if received.is_none() {
                    break;
                }
            }
            _ = shutdown.changed() => break,
        }

        info!("Received SIGUSR1, reloading {}", path.display());
        match LoadedConfiguration::load(&path) {
            Ok(loaded) => {
                monitor.reload(loaded).await;
            }
            Err(e) => error!("Configuration reload failed, keeping current configuration: {}", e),
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_level = if logging.debug { "debug" } else { "info" };

        format!(
            "statuswatch={level},statuswatch_core={level},tower_http={level}",
            level = default_level
        )
        .into()
    });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_file(logging.debug)
        .with_line_number(logging.debug);

    let is_json = logging.json
        || std::env::var("LOG_FORMAT")
            .map(|v| v.to_lowercase() == "json")
            .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
