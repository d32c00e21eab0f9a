use anyhow::Result;
use seatrack::config::{self, TrackerConfig};
use seatrack::regions::RegionIndex;
use seatrack::state::StateService;
use seatrack::store::AsyncVesselStore;
use seatrack::stream::{StreamClient, VesselListener};
use seatrack::Vessel;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Forwards every processed report into the state service.
struct StateListener {
    state: Arc<StateService>,
}

#[async_trait]
impl VesselListener for StateListener {
    async fn on_position(&self, vessel: &Vessel) {
        self.state.update(vessel.clone()).await;
    }

    async fn on_static(&self, vessel: &Vessel) {
        self.state.update(vessel.clone()).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seatrack=info".into()),
        )
        .init();

    info!("Seatrack starting...");

    let config_path =
        std::env::var("SEATRACK_CONFIG").unwrap_or_else(|_| "seatrack.toml".to_string());
    let config = if Path::new(&config_path).exists() {
        info!(path = %config_path, "Loading configuration");
        config::load_config(&config_path)?
    } else {
        info!("No config file found; using defaults");
        TrackerConfig::default()
    };

    if let Some(parent) = Path::new(&config.store.path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let store = AsyncVesselStore::open(
        &config.store.path,
        Duration::from_secs(config.store.op_timeout_secs),
    )?;
    let regions = Arc::new(RegionIndex::new(config.regions.clone()));
    let state = Arc::new(StateService::new(store, regions));
    state.rehydrate().await?;

    let listener = Arc::new(StateListener {
        state: Arc::clone(&state),
    });
    let client = StreamClient::new(config.stream.clone(), &config.regions, listener);

    let runner = tokio::spawn(client.clone().run());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    client.stop();
    match runner.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Stream client exited with error"),
        Err(e) => error!(error = %e, "Stream client task panicked"),
    }

    state.close().await?;
    info!("Seatrack stopped");
    Ok(())
}
