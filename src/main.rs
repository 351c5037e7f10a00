use anyhow::{Context, Result};
use docload::{config, pipeline, telemetry};
use config::Config;
use pipeline::ShutdownCoordinator;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cfg = Config::load()?;
    init_tracing(&cfg.log)?;
    info!(
        workers = cfg.run.workers,
        budget_secs = cfg.run.worker_duration_seconds,
        backend = %cfg.store.backend,
        "starting"
    );

    let coordinator = ShutdownCoordinator::from_config(&cfg)
        .await
        .context("bootstrap failed")?;

    tokio::select! {
        summary = coordinator.run() => {
            let summary = summary?;
            info!(
                workers = summary.workers.len(),
                requests = summary.metrics.requests,
                insert_errors = summary.metrics.insert_errors,
                templates_generated = summary.producer.rendered,
                metrics_exported = summary.metrics_exported,
                "done"
            );
        }
        signal = telemetry::shutdown_signal() => {
            warn!(%signal, "run interrupted before all workers finished; metrics were not pushed");
            anyhow::bail!("run interrupted by {signal}");
        }
    }
    Ok(())
}
