// [apps/consultease-daemon/src/main.rs]
//! Entry point for the ConsultEase coordination core.

mod bootstrap;
mod handlers;

use bootstrap::exit_codes;
use tracing::{error, info};

fn main() {
    dotenvy::dotenv().ok();
    consultease_telemetry::init_tracing("consultease-daemon");

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to build tokio runtime: {err}");
            std::process::exit(exit_codes::CONFIGURATION);
        }
    };

    let exit_code = runtime.block_on(run());
    std::process::exit(exit_code);
}

async fn run() -> i32 {
    info!("consultease-daemon starting");

    let config = match consultease_config::Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("configuration load failed: {err}");
            return exit_codes::CONFIGURATION;
        }
    };

    let daemon = match bootstrap::run(config).await {
        Ok(daemon) => daemon,
        Err(code) => return code,
    };

    info!("consultease-daemon ready");

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
    }

    info!("shutdown signal received, stopping services");
    daemon.shutdown().await;
    0
}
