//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use aui_core::config;
use clap::Parser;

use crate::logging;

mod commands;

#[derive(Parser)]
#[command(name = "aui")]
#[command(version)]
#[command(about = "Chat with an OpenAI assistant from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Secrets file holding login credentials (default: $AUI_HOME/secrets.toml)
    #[arg(long, global = true, value_name = "PATH", env = "AUI_SECRETS")]
    secrets: Option<PathBuf>,

    /// Write debug logs to $AUI_HOME/logs/aui.log
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Sends one prompt and prints the assistant's reply
    Exec {
        /// The prompt to send to the assistant
        #[arg(short, long)]
        prompt: String,

        /// Upload a file and attach it to the prompt (repeatable)
        #[arg(short, long = "file", value_name = "PATH")]
        files: Vec<PathBuf>,

        /// Username to log in with when authentication is required
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.verbose);

    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli {
        command,
        secrets,
        verbose: _,
    } = cli;

    match command {
        // default to chat mode
        None => {
            let (config, secrets) = load(secrets)?;
            commands::chat::run(&config, &secrets).await
        }
        Some(Commands::Exec {
            prompt,
            files,
            username,
        }) => {
            let (config, secrets) = load(secrets)?;
            commands::exec::run(commands::exec::ExecRunOptions {
                config: &config,
                secrets: &secrets,
                prompt: &prompt,
                files: &files,
                username: username.as_deref(),
            })
            .await
        }
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}

fn load(secrets: Option<PathBuf>) -> Result<(config::Config, PathBuf)> {
    let config = config::Config::load().context("load config")?;
    let secrets = secrets.unwrap_or_else(config::paths::secrets_path);
    Ok((config, secrets))
}
