use std::process::ExitCode;

use tracing::{error, info};

use lingrbot::config::Config;
use lingrbot::{logging, server};

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let _guard = match logging::init(config.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to open log file: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("🚀 Starting lingrbot...");
    info!("Loaded config from {config_path}");

    if let Err(e) = server::serve(config).await {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
