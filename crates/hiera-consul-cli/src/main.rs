//! `hiera-consul` - run Hiera Consul lookups from the command line

mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use hiera_consul_backend::{
    BackendConfig, ConsulBackend, PathResolver, ResolutionType, Scope, consul_info,
};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "hiera-consul", version, about = "Resolve Hiera keys against Consul")]
struct Cli {
    /// Configuration file holding a `consul` section
    #[arg(short = 'c', long, env = "HIERA_CONSUL_CONFIG", default_value = "hiera.yaml")]
    config: PathBuf,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Look a key up and print the answer as JSON
    Lookup {
        key: String,
        /// Scope variable, repeatable (`-s fqdn=web01`)
        #[arg(short = 's', long = "scope", value_parser = parse_scope_var)]
        scope: Vec<(String, String)>,
        /// Path queried before every configured one
        #[arg(long)]
        order_override: Option<String>,
        /// scalar (priority), array or hash
        #[arg(short = 'r', long, default_value = "scalar")]
        resolution: ResolutionType,
        /// Extract a single field from the answer
        #[arg(short = 'f', long)]
        field: Option<String>,
    },
    /// Dump the warmed service cache
    Services,
    /// Print the candidate paths a lookup would query
    Paths {
        key: String,
        #[arg(short = 's', long = "scope", value_parser = parse_scope_var)]
        scope: Vec<(String, String)>,
        #[arg(long)]
        order_override: Option<String>,
    },
}

fn parse_scope_var(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected NAME=VALUE, got `{}`", s))
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(&cli.log_level)?;

    let config = BackendConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    debug!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Lookup {
            key,
            scope,
            order_override,
            resolution,
            field,
        } => {
            let backend = ConsulBackend::new(&config).await?;
            let scope: Scope = scope.into_iter().collect();
            let answer = backend
                .lookup(&key, &scope, order_override.as_deref(), resolution)
                .await?;

            let answer = match (answer, field) {
                (Some(answer), Some(field)) => consul_info(&answer, &field),
                (answer, None) => answer,
                (None, Some(_)) => None,
            };

            match answer {
                Some(answer) => {
                    print_json(&answer)?;
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("no answer for {}", key);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Services => {
            let backend = ConsulBackend::new(&config).await?;
            print_json(&Value::Object(backend.cache().to_sorted_map()))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Paths {
            key,
            scope,
            order_override,
        } => {
            let scope: Scope = scope.into_iter().collect();
            let resolver = PathResolver::from_config(&config);
            for path in resolver.resolve(&key, &scope, order_override.as_deref()) {
                println!("{}", path);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
