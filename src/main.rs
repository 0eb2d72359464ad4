use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod build;
mod cli;
mod config;
mod error;
mod login;
mod output;

use cli::{CliContext, Dispatcher, ExitStatus};
use config::{ConfigFile, ConfigResolver};
use login::SERVICE_ACCOUNT_SECRET_VAR;
use output::Output;

/// Command-line tool for NPL projects.
///
/// Commands and their flags are parsed by the NPL command registry, clap only
/// handles the global options in front of the command name.
#[derive(Parser, Debug)]
#[command(
    name = "npl",
    disable_help_flag = true,
    disable_version_flag = true,
    disable_help_subcommand = true
)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Command name followed by its `--flag [value]` arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Cli {
    /// Command arguments, with the conventional `--help` / `--version` mapped to commands.
    fn command_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(first) = args.first_mut() {
            match first.as_str() {
                "--help" | "-h" => *first = "help".to_string(),
                "--version" | "-V" => *first = "version".to_string(),
                _ => {}
            }
        }
        args
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn dispatcher(output: Output) -> Result<Dispatcher> {
    let http = Client::builder()
        .user_agent(concat!("npl-cli/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(0)
        .build()
        .context("Failed to create HTTP client")?;

    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    let config_file = ConfigFile::load_from_dir(&cwd);
    if let Some(path) = config_file.path() {
        debug!("Using configuration from {}", path.display());
    }

    let registry = cli::commands();
    let resolver = ConfigResolver::new(config_file);
    resolver.warn_unknown_keys(registry.visible());

    let context = CliContext {
        output,
        http,
        token_store: None,
        service_account_secret: std::env::var(SERVICE_ACCOUNT_SECRET_VAR).ok(),
        open_browser: true,
    };

    Ok(Dispatcher::new(registry, resolver, context))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = Output::stdout();
    let status = match dispatcher(output.clone()) {
        Ok(dispatcher) => dispatcher.execute(&cli.command_args()).await,
        Err(e) => {
            output.line(format!("Unexpected error: {:#}", e));
            output.flush();
            ExitStatus::InternalError
        }
    };

    ExitCode::from(status.code())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(tokens: &[&str]) -> Cli {
        Cli {
            verbose: false,
            args: tokens.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_conventional_flags_map_to_commands() {
        assert_eq!(cli(&["--help"]).command_args(), vec!["help"]);
        assert_eq!(cli(&["-h"]).command_args(), vec!["help"]);
        assert_eq!(cli(&["--version"]).command_args(), vec!["version"]);
        assert_eq!(cli(&["-V"]).command_args(), vec!["version"]);
    }

    #[test]
    fn test_command_arguments_pass_through() {
        assert_eq!(
            cli(&["cloud", "deploy", "--help"]).command_args(),
            vec!["cloud", "deploy", "--help"]
        );
        assert!(cli(&[]).command_args().is_empty());
    }
}
