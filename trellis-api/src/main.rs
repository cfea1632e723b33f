// trellis: multi-tenant management host

use tracing::error;
use trellis_api::{AppState, HostError, HostSettings, serve, shutdown_signal};
use trellis_log::LogConfig;

async fn run() -> Result<(), HostError> {
    let settings = HostSettings::from_environment()?;
    let state = AppState::bootstrap(settings)?;
    serve(state, shutdown_signal()).await
}

#[tokio::main]
async fn main() {
    if let Err(err) = LogConfig::from_env().try_init() {
        eprintln!("{}", err);
    }

    if let Err(err) = run().await {
        error!(error = %err, "Host failed");
        std::process::exit(1);
    }
}
