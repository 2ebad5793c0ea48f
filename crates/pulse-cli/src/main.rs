//! Pulse CLI binary entrypoint.

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pulse_cli::cli::{Cli, Commands};
use pulse_cli::commands::{ConfigCommand, PresetsCommand, ReplayCommand};
use pulse_cli::output::OutputFormat;
use pulse_context::ContextConfig;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ContextConfig> {
    match &cli.config {
        Some(path) => ContextConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(ContextConfig::default()),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    match &cli.command {
        Commands::Replay(args) => {
            ReplayCommand::new(&config)
                .execute(&mut stdout, &format, args)
                .await
                .with_context(|| format!("replaying {}", args.script.display()))?;
        }
        Commands::Presets(args) => {
            PresetsCommand::new(&config).execute(&mut stdout, &format, args)?;
        }
        Commands::Config => {
            ConfigCommand::new(&config).execute(&mut stdout, &format)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_without_flag() {
        let cli = Cli::parse_from(["pulse", "config"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config, ContextConfig::default());
    }

    #[test]
    fn missing_config_file_is_reported() {
        let cli = Cli::parse_from(["pulse", "-c", "/nonexistent/pulse.json", "config"]);
        let err = load_config(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("loading configuration from /nonexistent/pulse.json"));
    }

    #[tokio::test]
    async fn run_replay_with_missing_script_fails() {
        let cli = Cli::parse_from(["pulse", "replay", "/nonexistent/script.json"]);
        let err = run(cli).await.unwrap_err();
        assert!(format!("{err:#}").contains("invalid script file"));
    }

    #[tokio::test]
    async fn run_presets_succeeds() {
        let cli = Cli::parse_from(["pulse", "presets", "--now", "2024-06-01T12:00:00Z"]);
        assert!(run(cli).await.is_ok());
    }
}
