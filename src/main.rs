use tracing::info;
use tracing_subscriber::EnvFilter;

use fleetdeck_controller::{build_router, AppState, Config, SyncEngine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("🚀 Starting FleetDeck controller...");
    info!(
        "✅ Configuration loaded: backend {}, source mode {:?}, poll every {}s",
        config.backend_url, config.source_mode, config.poll_interval_secs
    );

    let engine = match SyncEngine::from_config(&config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("❌ Failed to initialize sync engine: {}", e);
            return Err(e.into());
        }
    };
    let poller = engine.start();

    let app_state = AppState {
        config: config.clone(),
        engine: engine.clone(),
    };
    let app = build_router(app_state);

    let listener = match tokio::net::TcpListener::bind(&config.server_address).await {
        Ok(listener) => {
            info!("🌐 View API listening on {}", config.server_address);
            listener
        }
        Err(e) => {
            eprintln!("❌ Failed to bind to {}: {}", config.server_address, e);
            return Err(e.into());
        }
    };

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await;

    poller.shutdown().await;
    engine.shutdown();

    if let Err(e) = served {
        eprintln!("❌ Server error: {}", e);
        return Err(e.into());
    }

    info!("✅ Controller stopped gracefully");
    Ok(())
}
