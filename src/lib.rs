pub mod config;
pub mod db;
pub mod estimates;
pub mod models;
pub mod sensor;
pub mod session;
pub mod settings;
pub mod shake;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::{io::BufReader, sync::broadcast::error::RecvError};

use config::{AppConfig, SensorKind};
use db::{Database, HistoryStore};
use estimates::{EstimatePools, EstimateSelector};
use sensor::{ReplaySensor, SensorSource, SimulatedSensor, UnsupportedSensor};
use session::{SessionCoordinator, SessionEvent};
use settings::SettingsStore;

pub fn run() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("shakecast: invalid configuration: {err:#}");
            std::process::exit(2);
        }
    };

    // RUST_LOG wins; otherwise info, or debug with SHAKECAST_DEBUG=1
    let default_level = if config.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    info!("Shakecast starting up...");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed to build async runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(run_app(config)) {
        error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run_app(config: AppConfig) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("failed to create data directory {}", config.data_dir.display())
    })?;

    let database = Database::new(config.db_path())?;
    let settings = Arc::new(SettingsStore::new(config.settings_path())?);

    let pools = match &config.catalog_path {
        Some(path) => {
            info!("Loading estimate catalog from {}", path.display());
            EstimatePools::from_json_file(path)?
        }
        None => EstimatePools::builtin(),
    };
    let selector = EstimateSelector::new(pools);

    // The cap may have been lowered while the app was not running.
    let current = settings.load();
    let removed = database.prune(current.max_history_size).await?;
    if removed > 0 {
        warn!(
            "Pruned {removed} estimates above the history cap of {}",
            current.max_history_size
        );
    }
    info!(
        "Mode: {}, history cap: {}",
        current.selected_mode, current.max_history_size
    );

    let history: Arc<dyn HistoryStore> = Arc::new(database);
    let mut coordinator = SessionCoordinator::new(selector, settings, history);

    let mut events = coordinator.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::EstimateReady(result)) => match serde_json::to_string(&result) {
                    Ok(line) => println!("{line}"),
                    Err(err) => error!("Failed to serialize estimate: {err}"),
                },
                Ok(SessionEvent::ShakeStateChanged(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event printer fell behind; skipped {skipped} events")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    coordinator.start(build_sensor(&config)).await?;

    tokio::select! {
        result = coordinator.wait() => {
            if let Err(err) = result {
                error!("Session ended with error: {err:#}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted; shutting down");
        }
    }

    let stopped = coordinator.stop().await;

    let recent = coordinator.recent(i64::from(coordinator.settings().max_history_size())).await?;
    info!("History holds {} estimates", recent.len());

    drop(coordinator);
    if let Err(err) = printer.await {
        warn!("Event printer task failed: {err}");
    }
    stopped
}

fn build_sensor(config: &AppConfig) -> Box<dyn SensorSource> {
    match config.sensor {
        SensorKind::Simulated => Box::new(SimulatedSensor::demo(config.sample_rate_hz)),
        SensorKind::Stdin => Box::new(ReplaySensor::new(BufReader::new(tokio::io::stdin()))),
        SensorKind::None => Box::new(UnsupportedSensor),
    }
}
