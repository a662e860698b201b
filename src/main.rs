//! vaultgate - Main entry point.
//!
//! Binds the unlock gate, waits for the operator to unlock the vault, then
//! optionally launches the protected command with the secrets injected as
//! environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use vaultgate::config::Config;
use vaultgate::launcher::{Launcher, random_token};
use vaultgate::observability::create_observer;
use vaultgate::vault::SecretDefinition;

#[derive(Parser)]
#[command(
    name = "vaultgate",
    about = "Gate a service behind a password-unlocked secrets vault"
)]
struct Cli {
    /// Port for the unlock gate (overrides VAULTGATE_PORT).
    #[arg(long)]
    port: Option<u16>,

    /// Vault file path (overrides VAULTGATE_VAULT_PATH).
    #[arg(long)]
    vault: Option<PathBuf>,

    /// Secret key that gets a random token generated when the vault does
    /// not hold it yet. Repeatable.
    #[arg(long = "generate", value_name = "KEY")]
    generate: Vec<String>,

    /// Health check URL displayed on the starting page.
    #[arg(long)]
    health_url: Option<String>,

    /// Command to launch with the unlocked secrets in its environment.
    #[arg(last = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vaultgate=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut config = Config::from_env()?;
    if let Some(port) = cli.port {
        config.gate.port = port;
    }
    if let Some(vault) = cli.vault {
        config.vault.path = vault;
    }
    if let Some(url) = cli.health_url {
        config.gate.health_check_url = Some(url);
    }

    let mut generate_keys = config.vault.generate_keys.clone();
    generate_keys.extend(cli.generate);
    let definitions: Vec<SecretDefinition> = generate_keys
        .into_iter()
        .map(|key| SecretDefinition::new(key, || random_token(30)))
        .collect();

    let addr = SocketAddr::new(config.gate.bind, config.gate.port);
    let mut launcher = Launcher::new(definitions, config.vault.path.clone(), addr)
        .with_observer(Arc::from(create_observer(&config.observability)));
    if let Some(url) = config.gate.health_check_url.clone() {
        launcher = launcher.with_health_check_url(url);
    }

    let mut handle = launcher.serve().await?;
    tracing::info!("unlock gate listening on http://{}", handle.addr());
    tracing::info!("vault file: {}", config.vault.path.display());

    let secrets = handle.wait_unlocked().await?;
    tracing::info!(keys = secrets.len(), "vault unlocked");

    // Launch the protected command as soon as the secrets are available;
    // the gate keeps draining concurrently.
    let child = if cli.command.is_empty() {
        None
    } else {
        let (program, args) = cli.command.split_first().expect("command is non-empty");
        let child = tokio::process::Command::new(program)
            .args(args)
            .envs(secrets.iter())
            .spawn()
            .with_context(|| format!("failed to launch {program}"))?;
        tracing::info!(%program, "protected command launched");
        Some(child)
    };

    handle.wait_complete().await?;
    tracing::info!("unlock gate retired");

    if let Some(mut child) = child {
        let status = child.wait().await.context("protected command failed")?;
        std::process::exit(status.code().unwrap_or(1));
    }

    Ok(())
}
