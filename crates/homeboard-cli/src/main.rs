//! homeboard entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use homeboard_cli::cli::{AuthProvider, Cli, Command, ConfigAction};
use homeboard_cli::commands;
use homeboard_cli::config::AppConfig;
use homeboard_cli::error::CliResult;
use homeboard_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(tracing_config(&cli)) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// `--debug` wins; `serve` logs at info; one-shot commands only warn.
fn tracing_config(cli: &Cli) -> TracingConfig {
    let config = if cli.debug {
        TracingConfig::cli_debug()
    } else if matches!(cli.command, Command::Serve { .. }) {
        TracingConfig::server()
    } else {
        TracingConfig::cli_debug().with_level(Level::WARN)
    };
    match cli.log_format {
        Some(format) => config.with_format(format),
        None => config,
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load_or_default(&config_path).map_err(homeboard_cli::CliError::config)?;

    match cli.command {
        Command::Serve { bind } => commands::serve::run(bind, &config).await,
        Command::Auth { provider } => match provider {
            #[cfg(feature = "google")]
            AuthProvider::Google {
                client_id,
                client_secret,
                credentials_file,
                force,
            } => {
                commands::auth::google(
                    client_id,
                    client_secret,
                    credentials_file,
                    force,
                    &config,
                    &config_path,
                )
                .await
            }
        },
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config_path),
        },
    }
}
