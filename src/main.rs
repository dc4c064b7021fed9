//! `streamres` CLI - resolve stream metadata into playable transports

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "streamres")]
#[command(about = "Resolve stream metadata into a ready-to-play transport")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/streamres/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a stream metadata JSON document and print the transport
    Resolve {
        /// Path to the metadata JSON
        metadata: PathBuf,

        /// Resolve from audio renditions only
        #[arg(short, long)]
        audio: bool,

        /// Pre-fetched player script (skips the network fetch)
        #[arg(long)]
        player_script: Option<PathBuf>,
    },

    /// Decode the throttling parameter of a media URL
    Decode {
        /// Media URL
        url: String,

        /// Player script containing the transform
        #[arg(long)]
        player_script: PathBuf,
    },

    /// Parse an inline DASH manifest and list its representations
    InspectManifest {
        /// Manifest file
        file: PathBuf,

        /// Base URL relative references resolve against
        #[arg(long)]
        base_url: String,

        /// Print the parsed model as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve {
            metadata,
            audio,
            player_script,
        } => {
            cmd::resolve::cmd_resolve(
                &metadata,
                audio,
                player_script.as_deref(),
                cli.config.as_deref(),
            )?;
        }
        Commands::Decode { url, player_script } => {
            cmd::decode::cmd_decode(&url, &player_script)?;
        }
        Commands::InspectManifest {
            file,
            base_url,
            json,
        } => {
            cmd::manifest::cmd_inspect_manifest(&file, &base_url, json)?;
        }
    }

    Ok(())
}
