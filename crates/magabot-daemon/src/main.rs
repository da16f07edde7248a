//! magabotd — the multi-platform chat bridge daemon.

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use magabot_config::Config;
use magabot_core::MagabotDirs;
use magabot_daemon::Daemon;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "magabotd", version, about = "Multi-platform chat bridge daemon")]
struct Cli {
    /// Override the state directory (default: ~/.magabot).
    #[arg(long, value_name = "DIR")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon (default).
    Run,
    /// Load and validate the configuration, print a summary, and exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let dirs = match &cli.home {
        Some(home) => MagabotDirs::with_root(home.clone()),
        None => MagabotDirs::resolve()?,
    };
    let config = magabot_config::load(&dirs.config_file)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let daemon = Daemon::build(config, dirs).await?;
            daemon.run().await?;
        },
        Command::CheckConfig => {
            print_summary(&config, &dirs);
        },
    }
    Ok(())
}

/// A secret-free view of the effective configuration.
fn print_summary(config: &Config, dirs: &MagabotDirs) {
    println!("config file: {}", dirs.config_file.display());
    println!("state root:  {}", dirs.root.display());
    println!();
    for (platform, enabled) in [
        ("telegram", config.telegram.enabled),
        ("slack", config.slack.enabled),
        ("whatsapp", config.whatsapp.enabled),
        ("webhook", config.webhook.enabled),
    ] {
        let state = if enabled { "enabled" } else { "disabled" };
        println!("{platform:>9}: {state}");
    }
    println!();
    println!("llm provider:   {}", config.llm.provider);
    println!("llm model:      {}", config.llm.model);
    println!("max history:    {}", config.session.max_history);
    println!(
        "rate limits:    {} msg/min, {} cmd/min",
        config.security.rate_limit_messages, config.security.rate_limit_commands
    );
    println!("secrets:        {:?}", config.secrets.backend);
    println!("audit:          {}", config.audit.enabled);
    println!("backup:         {}", config.backup.on_shutdown);
    if config.webhook.enabled {
        println!(
            "webhook:        {}:{}{} (auth: {:?})",
            config.webhook.bind_addr,
            config.webhook.port,
            config.webhook.path,
            config.webhook.auth_method
        );
    }
}
