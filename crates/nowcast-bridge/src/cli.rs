use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(
    name = "nowcast-bridge",
    about = "Now-playing bridge for browser overlays"
)]
pub struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port to listen on (overrides PORT and the config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory with the overlay's static files
    #[arg(long)]
    pub public_dir: Option<PathBuf>,

    /// Explicit path to the nowcast-watch executable
    #[arg(long)]
    pub watcher: Option<PathBuf>,
}
