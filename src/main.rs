pub mod config;
pub mod controller;
pub mod mapping;

use crate::config::AppConfig;
use crate::controller::{ConnectionSupervisor, GilrsHost};
use crate::mapping::ActionDispatcher;
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = AppConfig::resolve_path();
    info!("Loading configuration from {}", config_path.display());
    let config = AppConfig::load_or_create(&config_path).await?;
    config.validate()?;
    info!(
        "Sending keys to '{}' (threshold {}, directions from {:?})",
        config.target_application, config.analog_threshold, config.direction_source
    );

    let key_sender = config
        .build_key_sender()
        .map_err(|e| eyre!("Failed to set up key sender: {}", e))?;
    let (dispatcher, injection_worker) = ActionDispatcher::spawn(
        key_sender,
        config.target_application.clone(),
        config.injection_timeout(),
    );

    let cancel = CancellationToken::new();
    let host = GilrsHost::spawn(cancel.clone())
        .await
        .map_err(|e| eyre!("Failed to start controller host: {}", e))?;

    let supervisor = ConnectionSupervisor::new(
        host.clone(),
        config.transducer_settings(),
        Arc::new(dispatcher).into_sink(),
    );
    supervisor.start();

    info!("Listening for controller input, press Ctrl-C to quit");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    supervisor.stop();
    host.shutdown().await;

    // Dropping the supervisor releases the last dispatcher handle
    drop(supervisor);
    if let Err(e) = injection_worker.await {
        return Err(eyre!("Injection worker failed: {}", e));
    }

    info!("Bye");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
