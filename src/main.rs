use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, reload};

use voxshell::daemon::{Daemon, LogControl};
use voxshell::{Config, Error};

/// Voxshell - voice assistant intent routing and skill dispatch
#[derive(Parser)]
#[command(name = "voxshell", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/voxshell/config.toml when present)
    #[arg(short, long, env = "VOXSHELL_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive conversation on stdin (default)
    Chat,
    /// Route a single utterance and print the reply
    Ask {
        /// What to say
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// List registered intents and what they do
    Intents,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,voxshell=info",
        1 => "info,voxshell=debug",
        2 => "debug",
        _ => "trace",
    };

    let (filter, handle) = reload::Layer::new(EnvFilter::new(filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let log_control: LogControl = Box::new(move |level: &str| {
        handle
            .reload(EnvFilter::new(level))
            .map_err(|e| Error::Config(format!("cannot apply log level {level}: {e}")))?;
        tracing::info!(level, "log level changed");
        Ok(())
    });

    match run(cli, log_control).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, log_control: LogControl) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    let mut daemon = Daemon::new(config).await?.with_log_control(log_control);

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => {
            println!("Voxshell ready. Type a request, or 'exit' to quit.");
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            daemon.run(stdin).await?;
        }
        Command::Ask { text } => {
            let reply = daemon
                .respond(&text.join(" "), |chunk| print!("{chunk}"))
                .await;
            println!();
            tracing::info!(route = %reply.route, intent = %reply.intent, "answered");
        }
        Command::Intents => {
            for entry in daemon.router().registry().manifest() {
                println!("{:<18} {}", entry.tool, entry.desc);
                for (slot, doc) in &entry.args {
                    println!("{:<18}   {slot}: {doc}", "");
                }
            }
        }
    }

    Ok(())
}
