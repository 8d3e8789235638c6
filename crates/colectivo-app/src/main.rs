mod cli;
mod commands;
mod session;

use colectivo_common::ConfigError;
use colectivo_config::{config_to_json, validation, ColectivoConfig};
use tracing_subscriber::EnvFilter;

/// Filter for our own crates at `level`; dependencies stay at `warn`.
fn default_directive(level: &str) -> String {
    format!("warn,colectivo={level},colectivo_presence={level},colectivo_config={level}")
}

/// Load the config, then apply command-line overrides and re-validate.
fn effective_config(args: &cli::Args) -> Result<ColectivoConfig, ConfigError> {
    let mut config = match colectivo_config::load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) if args.config.is_none() => {
            eprintln!("Config load failed, using defaults: {e}");
            ColectivoConfig::default()
        }
        Err(e) => return Err(e),
    };

    if let Some(url) = &args.url {
        config.realtime.url = url.clone();
    }
    if let Some(api_url) = &args.api_url {
        config.api.base_url = api_url.clone();
    }
    validation::validate(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    let args = cli::parse();

    let config = match effective_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("colectivo: {e}");
            std::process::exit(2);
        }
    };

    if args.print_config {
        println!("{}", config_to_json(&config));
        return;
    }

    // Initialize logging
    let log_directive = args
        .log_level
        .clone()
        .unwrap_or_else(|| default_directive(config.logging.level.as_directive()));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::try_new(&log_directive)
                .unwrap_or_else(|_| EnvFilter::new(default_directive("info")))
        }))
        .init();

    tracing::info!("Colectivo v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = session::run(&args, &config).await {
        tracing::error!(error = %e, "Session ended with an error");
        std::process::exit(1);
    }
    tracing::info!("Shutdown complete");
}
