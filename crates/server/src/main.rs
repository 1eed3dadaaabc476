use anyhow::Result;
use clap::Parser;
use matchday_core::{config::AppConfig, runtime::MatchdayRuntime};
use std::path::PathBuf;
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "matchday")]
#[command(about = "Matchday resilience core: response cache, provider fallback, metrics and alerting")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "MATCHDAY_CONFIG", default_value = "config/config.toml")]
    config: PathBuf,

    /// Write a JSON snapshot of the system state here on shutdown
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

fn init_logging(config: &AppConfig) {
    let default_directives =
        format!("warn,matchday_core={level},matchday={level}", level = config.logging.level);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::from_file(&cli.config)
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;
    config.validate().map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;

    if cli.check {
        println!("configuration OK: {} provider(s)", config.providers.providers.len());
        return Ok(());
    }

    init_logging(&config);
    info!(environment = %config.environment, "starting matchday");
    debug!(
        providers_count = config.providers.providers.len(),
        cache_max_size = config.cache.max_size,
        alert_rules = config.alerts.rules.len(),
        "configuration loaded"
    );

    let snapshot_path = cli.snapshot.or_else(|| config.snapshot.path.as_ref().map(PathBuf::from));

    let mut runtime = MatchdayRuntime::builder().with_config(config).build()?;
    runtime.start();

    shutdown_signal().await;

    if let Some(path) = snapshot_path {
        if let Err(e) = runtime.snapshot().write_json(&path) {
            error!(error = %e, path = %path.display(), "failed to write snapshot");
        }
    }

    runtime.shutdown().await;
    info!("matchday shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install signal handler");
                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}
