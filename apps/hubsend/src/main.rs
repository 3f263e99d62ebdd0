//! # hubsend
//!
//! Command-line entry point. Parses arguments, installs logging, loads the
//! config and dispatches to [`hubsend::cli`].

use clap::{Parser, Subcommand};
use hubsend::cli;
use hubsend::config::{Config, process_env};
use hubsend::hubsend_core::NotificationFormat;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hubsend", version, about = "Send push notifications through an Azure Notification Hub")]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, global = true, default_value = "hubsend.json")]
    config: PathBuf,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config template
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Send a notification to one channel
    Send {
        #[arg(short = 'n', long)]
        channel: String,
        #[arg(short, long)]
        text: String,
        /// apple, gcm or template (defaults to the configured format)
        #[arg(short, long)]
        format: Option<NotificationFormat>,
    },
    /// Send a notification to every registration
    Broadcast {
        #[arg(short, long)]
        text: String,
        #[arg(short, long)]
        format: Option<NotificationFormat>,
    },
    /// Register a device for one or more channels
    Register {
        /// APNs device token (hex); falls back to the config
        #[arg(long)]
        device_token: Option<String>,
        #[arg(short = 'n', long = "channel", required = true)]
        channels: Vec<String>,
    },
    /// Delete a registration
    Unregister {
        /// Falls back to the registration id stored in the config
        #[arg(long)]
        registration_id: Option<String>,
    },
    /// Print a SAS token for the hub
    Token {
        /// Lifetime in seconds (defaults to the configured TTL)
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Parse a saved XML status response
    ParseStatus { file: PathBuf },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hubsend=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Cli) -> hubsend::Result<()> {
    let json = args.json;
    match args.command {
        Commands::Init { force } => cli::cmd_init(&args.config, force),
        Commands::Send {
            channel,
            text,
            format,
        } => {
            let config = Config::load(&args.config)?;
            cli::cmd_send(&config, &channel, &text, format, json)
                .await
                .map(|_| ())
        }
        Commands::Broadcast { text, format } => {
            let config = Config::load(&args.config)?;
            cli::cmd_broadcast(&config, &text, format, json)
                .await
                .map(|_| ())
        }
        Commands::Register {
            device_token,
            channels,
        } => cli::cmd_register(
            &args.config,
            process_env,
            device_token.as_deref(),
            &channels,
            json,
        )
        .await
        .map(|_| ()),
        Commands::Unregister { registration_id } => {
            cli::cmd_unregister(&args.config, process_env, registration_id.as_deref(), json)
                .await
                .map(|_| ())
        }
        Commands::Token { ttl } => {
            let config = Config::load(&args.config)?;
            cli::cmd_token(&config, ttl, json).map(|_| ())
        }
        Commands::ParseStatus { file } => cli::cmd_parse_status(&file, json).map(|_| ()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
