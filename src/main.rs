use ldar_sim::{config, simulation};

fn init_tracing(level: tracing::Level) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

// The log level lives in the config, so a config that fails to load is
// reported through a subscriber at the default level.
fn load_config(config_path: &str) -> Result<config::Config, config::ConfigError> {
    config::load_from_path(config_path).inspect_err(|err| {
        init_tracing(tracing::Level::INFO);
        tracing::error!(config_path, error = %err, "Failed to load config");
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(&config_path)?;

    let level = config.log_level();
    init_tracing(level.unwrap_or(tracing::Level::INFO));
    if level.is_none() {
        tracing::warn!(level = %config.logging.level, "Unknown log level, using info");
    }
    tracing::info!(
        config_path = %config_path,
        app = %config.app.name,
        "ldar-sim starting"
    );

    let summary = match simulation::run(&config) {
        Ok(summary) => summary,
        Err(err) => {
            tracing::error!(error = %err, "Simulation aborted");
            return Err(err.into());
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
