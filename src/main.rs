//! SovereignSeas Platform Backend
//!
//! HTTP API server wrapping an in-process simulation of the SovereignSeas
//! module platform. Reference modules are deployed, registered and
//! initialized at startup unless `SEAS_BOOTSTRAP=false`.

use anyhow::Context;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sovereign_seas_backend::api;
use sovereign_seas_backend::config::PlatformConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();
    let config = PlatformConfig::from_env().context("loading configuration")?;
    tracing::info!(
        "Config: deployer {}, health threshold {} bps, bootstrap {}, {} oracle seeds",
        config.deployer,
        config.health_failure_bps,
        config.bootstrap,
        config.oracle_rates.len()
    );

    // Build platform state (and bootstrap reference modules)
    let (platform, oracle) = config.build()?;
    {
        let modules = platform.get_registered_modules();
        let active = modules.iter().filter(|id| platform.module_active(id)).count();
        tracing::info!(
            "Platform ready: {}/{} modules active, {} events",
            active,
            modules.len(),
            platform.events().len()
        );
    }
    let platform = Arc::new(RwLock::new(platform));

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api::router(platform, oracle))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    let addr = config.bind_addr;
    tracing::info!("Starting server on {}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET  /health                              - Health check");
    tracing::info!("  GET  /api/status                          - Platform overview");
    tracing::info!("  GET  /api/events?since=N                  - Event log");
    tracing::info!("  GET  /api/implementations                 - Deployed implementations");
    tracing::info!("  GET  /api/modules                         - List modules");
    tracing::info!("  POST /api/modules                         - Register module");
    tracing::info!("  GET  /api/modules/:id                     - Module info & lifecycle");
    tracing::info!("  POST /api/modules/:id/initialize          - Initialize module");
    tracing::info!("  POST /api/modules/:id/call                - Routed call");
    tracing::info!("  POST /api/modules/:id/static-call         - Read-only routed call");
    tracing::info!("  POST /api/batch/initialize                - Batch initialization");
    tracing::info!("  POST /api/batch/status                    - Initialization status");
    tracing::info!("  GET  /api/roles/check                     - Role membership");
    tracing::info!("  POST /api/roles/grant                     - Grant role");
    tracing::info!("  GET  /api/pause                           - Pause flag");
    tracing::info!("  GET  /api/tokens/:token/quote             - Native equivalent");
    tracing::info!("  POST /api/tokens/:token/convert           - Native equivalent (logged)");
    tracing::info!("  GET  /api/tokens/:token/health            - Conversion health");
    tracing::info!("  POST /api/tokens/:token/manual-rate       - Set manual rate");
    tracing::info!("  POST /api/tokens/:token/emergency-rate    - Emergency rate override");
    tracing::info!("  POST /api/debug/oracle/:token             - Drive simulated oracle");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}
