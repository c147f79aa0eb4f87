//! prom-reporter - Entry Point
//!
//! Standalone metrics process: serves the scrape endpoint and, when a
//! Pushgateway is configured, pushes the registry on a fixed interval.
//! Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml (or the path given as first argument) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Build the MetricsModule (registry, service, push client)
//! 4. Install the process-wide Reporter
//! 5. Spawn the scrape server (/metrics + /live)
//! 6. Spawn the periodic push task if a gateway is configured
//! 7. Wait for SIGINT, broadcast shutdown, final push, exit

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use prom_reporter::adapters::metrics::MetricsServer;
use prom_reporter::config::{self, PushScheduleConfig};
use prom_reporter::domain::LabelSet;
use prom_reporter::{MetricsModule, PushClient, reporter};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level)),
        )
        .json()
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path,
        bind_address = %config.server.bind_address,
        "Starting prom-reporter"
    );

    // ── 3. Metrics module ───────────────────────────────────
    let module = MetricsModule::for_root(config.metrics.clone())
        .context("Failed to initialize metrics module")?;

    // ── 4. Process-wide reporter ────────────────────────────
    reporter::init(module.service().clone(), &config.reporter)
        .context("Failed to install metrics reporter")?;

    // ── 5. Shutdown channel + scrape server ─────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    let server = MetricsServer::new(
        std::sync::Arc::clone(module.registry()),
        config.server.bind_address.clone(),
    );
    let server_shutdown = shutdown_tx.subscribe();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run(server_shutdown).await {
            error!(error = %e, "Metrics server failed");
        }
    });

    // ── 6. Periodic push ────────────────────────────────────
    let push_handle = if module.push_client().is_enabled() {
        let client = module.push_client().clone();
        let schedule = config.push.clone();
        let push_shutdown = shutdown_tx.subscribe();
        Some(tokio::spawn(run_push_loop(client, schedule, push_shutdown)))
    } else {
        info!("No push gateway configured, push task disabled");
        None
    };

    // ── 7. Wait for SIGINT ──────────────────────────────────
    signal::ctrl_c()
        .await
        .context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    let _ = shutdown_tx.send(());

    if let Some(handle) = push_handle {
        let _ = tokio::time::timeout(Duration::from_secs(15), handle).await;
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), server_handle).await;

    info!("Shutdown complete");
    Ok(())
}

/// Push the registry every `interval_seconds` until shutdown, then push
/// once more so the gateway holds the final values.
async fn run_push_loop(
    client: PushClient,
    schedule: PushScheduleConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(schedule.interval_seconds));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(
        job = %schedule.job_name,
        interval_seconds = schedule.interval_seconds,
        "Push task started"
    );

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => push_once(&client, &schedule.job_name).await,
        }
    }

    push_once(&client, &schedule.job_name).await;
    info!("Push task stopped");
}

async fn push_once(client: &PushClient, job: &str) {
    let response = client.push(job).await;
    if !response.success {
        warn!(
            job,
            status = response.status,
            message = response.message.as_deref().unwrap_or_default(),
            "Scheduled push failed"
        );
    }

    let outcome = LabelSet::new().with("status", response.status);
    if let Err(e) = reporter::counter("prom_reporter_pushes_total", Some(&outcome)) {
        error!(error = %e, "Reporter unavailable");
    }
}
