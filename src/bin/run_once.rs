//! Single run from the command line (cron, Cloud Scheduler job, CI).
//! Exits non-zero on startup errors or an unexpected failure.

use anyhow::Result;
use screener_alerts::{build_runner, telemetry, AppConfig, RunOutcome, ScreenerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let app = AppConfig::from_env()?;
    telemetry::init_tracing(app.log_format);

    tracing::info!("=== screener alert run starting ===");
    let runner = build_runner(&app, ScreenerConfig::from_env())?;
    match runner.run_once().await {
        Ok(RunOutcome::MarketClosed) => tracing::info!("run skipped, market closed"),
        Ok(RunOutcome::Completed { alerts_sent, .. }) => {
            tracing::info!(alerts_sent, "=== run completed ===")
        }
        Err(e) => {
            tracing::error!("critical error in run: {e:#}");
            return Err(e);
        }
    }
    Ok(())
}
