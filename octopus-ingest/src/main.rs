use std::path::PathBuf;

use anyhow::Result;
use octopus_ingest::{
    config::AppConfig, metrics_server, observability, scheduler::Poller, sinks::InfluxDbSink,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Configuration problems at startup are the only fatal errors.
    let path = AppConfig::path();
    let cfg = AppConfig::load_from(&path)?;
    tracing::info!(config = %path.display(), "configuration loaded");

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let sink = InfluxDbSink::new(&cfg.influxdb)?;
    let poller = Poller::new(cfg, sink)?;

    let shutdown = CancellationToken::new();
    let (reload_tx, reload_rx) = mpsc::channel(1);

    tokio::spawn(shutdown_on_signal(shutdown.clone()));
    tokio::spawn(reload_on_hangup(path, reload_tx));

    tokio::spawn(poller.run(shutdown, reload_rx)).await?;

    Ok(())
}

async fn shutdown_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    shutdown.cancel();
}

/// Re-read the configuration file on SIGHUP. A file that fails to load is
/// logged and the running configuration is kept.
#[cfg(unix)]
async fn reload_on_hangup(path: PathBuf, reloads: mpsc::Sender<AppConfig>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to install SIGHUP handler");
            return;
        }
    };

    while hangup.recv().await.is_some() {
        match AppConfig::load_from(&path) {
            Ok(cfg) => {
                if reloads.send(cfg).await.is_err() {
                    return;
                }
            }
            Err(e) => tracing::error!(
                error = %format!("{e:#}"),
                "config reload failed, keeping current configuration"
            ),
        }
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup(_path: PathBuf, _reloads: mpsc::Sender<AppConfig>) {}
