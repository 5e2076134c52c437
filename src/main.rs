//! Screener alerts — HTTP entrypoint.
//! One run per request on `/`, plus `/health` and `/metrics`.

use screener_alerts::{api, build_runner, metrics::Metrics, telemetry, AppConfig, ScreenerConfig};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    // Missing credentials: refuse to start.
    let app = AppConfig::from_env()?;
    telemetry::init_tracing(app.log_format);

    let runner = build_runner(&app, ScreenerConfig::from_env())?;
    tracing::info!(state = %app.state_path.display(), "screener alerts ready");

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!("metrics disabled: {e:#}");
            None
        }
    };

    let router = api::router(api::AppState::new(runner), metrics.as_ref());
    Ok(router.into())
}
