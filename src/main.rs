use color_eyre::{eyre::eyre, Result};
use procon_gadget::{Controller, EmulatorConfig};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(EmulatorConfig::default_path);
    let config = EmulatorConfig::load_or_default(&config_path)
        .await
        .map_err(|e| eyre!("Failed to load configuration: {}", e))?;

    info!("Emulating Pro Controller on {}", config.device_path.display());
    let mut controller = Controller::from_config(&config);
    controller
        .connect()
        .await
        .map_err(|e| eyre!("Failed to connect controller: {}", e))?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("Failed to wait for Ctrl-C: {}", e))?;

    info!("Interrupted, closing controller");
    controller.close().await;
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    let level = match std::env::var("RUST_LOG").as_deref() {
        Ok("trace") => Level::TRACE,
        Ok("debug") => Level::DEBUG,
        Ok("warn") => Level::WARN,
        Ok("error") => Level::ERROR,
        _ => Level::INFO,
    };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
