use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LoggingConfig, MetricsConfig};

/// Keeps the background log writer alive; drop it only at process exit.
pub struct TelemetryGuard {
    _file_writer: Option<WorkerGuard>,
}

/// Stdout logging plus an optional daily rolling file. `RUST_LOG` overrides
/// the configured filter.
pub fn init_tracing(config: &LoggingConfig) -> Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.filter))?;

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()?;

    Ok(TelemetryGuard { _file_writer: guard })
}

/// Installs the Prometheus exporter when enabled. Counters recorded before
/// this call, or when disabled, go to the no-op recorder.
pub fn init_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}
