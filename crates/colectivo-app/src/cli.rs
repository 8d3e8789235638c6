use std::path::PathBuf;

use clap::Parser;
use colectivo_presence::Role;

/// Colectivo: live passenger and driver presence for a shared-taxi route.
#[derive(Parser, Debug)]
#[command(name = "colectivo", version, about)]
pub struct Args {
    /// Session role: passenger or driver.
    #[arg(required_unless_present = "print_config")]
    pub role: Option<Role>,

    /// Bearer token for the presence server.
    #[arg(long, env = "COLECTIVO_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// User id announced to the server. A random one is generated if omitted.
    #[arg(long)]
    pub user_id: Option<String>,

    /// Display name. Defaults to the user id.
    #[arg(long)]
    pub username: Option<String>,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log filter override (e.g. `debug` or `colectivo_presence=trace`).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Realtime WebSocket URL override.
    #[arg(long)]
    pub url: Option<String>,

    /// Snapshot API base URL override.
    #[arg(long)]
    pub api_url: Option<String>,

    /// Print the effective config as JSON and exit.
    #[arg(long)]
    pub print_config: bool,
}

pub fn parse() -> Args {
    Args::parse()
}
