//! Autonomic Service - host process for the self-healing control loop
//!
//! Loads the YAML config, wires a metrics source, the remediation actions and
//! the report sinks into a monitor loop, then serves the status surface until
//! ctrl-c. The loop is stopped after the HTTP server drains.

mod config;
mod http;
mod mqtt;

use anyhow::{Context, Result};
use autonomic_core::{
    default_actions, AnomalyDetector, FanoutSink, HostMetricsSource, MetricWriter, MetricsSource,
    MonitorLoop, ReportSink, SimulatedMetricsSource, TracingSink,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{load_config, ServiceConfig, SourceMode};
use crate::http::AppState;
use crate::mqtt::MqttReportSink;

const DEFAULT_LOG_FILTER: &str = "autonomic_core=info,autonomic_service=info";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Autonomic service starting...");

    let cfg: ServiceConfig = load_config().await.context("Failed to load configuration")?;
    cfg.validate().context("Invalid configuration")?;

    let detector = AnomalyDetector::from_config(&cfg.detection)
        .context("Failed to build anomaly detector")?;

    // simulated mode keeps a typed handle for /simulate
    let (source, writer, simulator) = match cfg.source {
        SourceMode::Simulated => {
            let simulated = Arc::new(SimulatedMetricsSource::new());
            (
                simulated.clone() as Arc<dyn MetricsSource>,
                simulated.clone() as Arc<dyn MetricWriter>,
                Some(simulated),
            )
        }
        SourceMode::Host => {
            let host = Arc::new(HostMetricsSource::new());
            (
                host.clone() as Arc<dyn MetricsSource>,
                host as Arc<dyn MetricWriter>,
                None,
            )
        }
    };
    info!("Metrics source: {:?}", cfg.source);

    let mut sinks = FanoutSink::new().with(Arc::new(TracingSink));
    if let Some(mqtt_conf) = &cfg.mqtt {
        let mqtt_sink = MqttReportSink::spawn(mqtt_conf);
        info!(
            "Publishing heal events to MQTT {}:{} on {}",
            mqtt_conf.host,
            mqtt_conf.port,
            mqtt_sink.topic()
        );
        sinks = sinks.with(Arc::new(mqtt_sink));
    }
    let sink: Arc<dyn ReportSink> = Arc::new(sinks);

    let monitor = MonitorLoop::builder(source)
        .detector(detector)
        .register_all(default_actions(writer))
        .sink(sink)
        .action_timeout(cfg.monitor.action_timeout())
        .build()
        .context("Failed to build remediation registry")?;

    let handle = monitor.start(cfg.monitor.period());

    let app = http::build_router(AppState {
        snapshots: handle.snapshots(),
        stats: handle.stats(),
        simulator,
    });

    let listener = TcpListener::bind(&cfg.http.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.http.bind))?;
    info!("Status surface listening on http://{}", cfg.http.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    let monitor = handle.stop().await.context("Monitor loop did not stop cleanly")?;
    info!("Autonomic service stopped: {:?}", monitor.stats().view());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
    }
    info!("Shutdown requested");
}
