use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ringway::api::{self, ApiState};
use ringway::manager::CallManager;
use ringway::providers::make_provider;
use ringway::VoiceCallConfig;

/// Ringway - Telephony voice-call gateway for AI assistants
#[derive(Parser)]
#[command(name = "ringway", version, about)]
struct Cli {
    /// Port to listen on (overrides config file)
    #[arg(long, env = "RINGWAY_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the webhook server (default)
    Serve,
    /// Place an outbound call and print the created record
    Call {
        /// Destination number
        to: String,

        /// Caller id (defaults to the configured from_number)
        #[arg(short, long)]
        from: Option<String>,
    },
    /// Print the resolved configuration file path
    ConfigPath,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,ringway=info",
        1 => "info,ringway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = VoiceCallConfig::load();
    if let Some(port) = cli.port {
        config.port = port;
    }

    match cli.command {
        Some(Command::ConfigPath) => {
            match ringway::config::file::config_file_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("(no home directory resolvable)"),
            }
            Ok(())
        }
        Some(Command::Call { to, from }) => {
            config.validate()?;
            let provider = make_provider(&config)?;
            let manager = CallManager::new(provider, config);
            let call = manager.initiate_call(&to, from.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&call)?);
            Ok(())
        }
        Some(Command::Serve) | None => serve(config).await,
    }
}

async fn serve(config: VoiceCallConfig) -> anyhow::Result<()> {
    if !config.enabled {
        anyhow::bail!("voice-call gateway is disabled; set call.enabled = true in the config file");
    }
    config.validate()?;

    // Providers drop recordings and transcripts here
    std::fs::create_dir_all(&config.store_path)?;

    let provider = make_provider(&config)?;
    tracing::info!(
        provider = provider.name(),
        policy = %config.inbound_policy,
        max_call_duration_secs = config.max_call_duration_secs,
        "starting voice-call gateway"
    );

    let port = config.port;
    let webhook_url = config.webhook_url.clone();
    let manager = CallManager::new(provider, config);

    let state = Arc::new(ApiState {
        manager,
        webhook_url,
    });
    api::serve(state, port).await?;
    Ok(())
}
