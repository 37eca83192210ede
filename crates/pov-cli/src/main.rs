//! `pov` - drive the engagement sync core from the command line
//!
//! - `pov demo`: run a scripted engagement against the in-memory adapters
//! - `pov config`: print the effective configuration as TOML

#![allow(missing_docs)]

mod demo;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pov_sync::SyncConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pov", version, about = "Proof-of-value engagement sync core")]
struct Cli {
    /// TOML configuration file; defaults apply to anything it leaves out
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a scripted engagement against in-memory adapters
    Demo(demo::DemoArgs),
    /// Print the effective configuration
    Config {
        /// Ignore `--config` and print the built-in defaults
        #[arg(long)]
        defaults: bool,
    },
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("warn")
            .add_directive("pov_sync=info".parse()?)
            .add_directive("pov_cli=info".parse()?),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<SyncConfig> {
    match path {
        Some(path) => SyncConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(SyncConfig::default()),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Demo(args) => {
            let config = load_config(cli.config.as_ref())?;
            let report = demo::run(config, &args).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render());
            }
            Ok(())
        }
        Command::Config { defaults } => {
            let config = if defaults {
                SyncConfig::default()
            } else {
                load_config(cli.config.as_ref())?
            };
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;
    run(cli).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["pov", "config", "--config", "pov.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("pov.toml")));
        assert!(matches!(cli.command, Command::Config { defaults: false }));
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = load_config(Some(&PathBuf::from("/nonexistent/pov.toml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pov.toml"));
    }
}
