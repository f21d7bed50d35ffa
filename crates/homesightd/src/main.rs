use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod devices;
mod engine;
mod fusion;
mod history;
mod prefs;
mod store;

use config::Config;
use dbus_interface::HomesightService;
use homesight_core::Perception;

const BUS_NAME: &str = "dev.homesight.Homesight1";
const OBJECT_PATH: &str = "/dev/homesight/Homesight1";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("homesightd starting");

    let config = Config::from_env();
    tracing::info!(
        data_dir = %config.data_dir.display(),
        backend = %config.backend,
        threshold = config.match_threshold,
        "configuration loaded"
    );

    let perception = match config.backend.as_str() {
        "stub" => Perception::stub(),
        other => {
            tracing::warn!(backend = other, "unknown perception backend, using stub");
            Perception::stub()
        }
    };

    let engine = engine::spawn_engine(&config, perception)?;

    let _connection = zbus::connection::Builder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, HomesightService::new(engine))?
        .build()
        .await?;

    tracing::info!(bus = BUS_NAME, "homesightd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("homesightd shutting down");

    Ok(())
}
