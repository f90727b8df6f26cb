#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! PPE vision server binary.
//!
//! ```text
//! ppe_vision_server [serve]
//! ppe_vision_server sweep
//! ```
//!
//! Configuration is read from environment variables; see
//! [`ppe_vision_server::ServerConfig::from_env`].

use clap::{Parser, Subcommand};
use ppe_vision_server::ServerConfig;

#[derive(Parser)]
#[command(
    name = "ppe_vision_server",
    about = "PPE compliance detection API server"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Delete every generated artifact and exit
    Sweep,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();
    let config = ServerConfig::from_env();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => ppe_vision_server::run_server(config).await,
        Commands::Sweep => {
            let deleted = ppe_vision_server::sweep_once(&config)?;
            println!(
                "Removed {deleted} artifact(s) from {}",
                config.artifact_dir.display()
            );
            Ok(())
        }
    }
}
