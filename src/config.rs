//! Configuration for the vaultgate binary.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::observability::ObservabilityConfig;

/// Main configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub gate: GateConfig,
    pub vault: VaultConfig,
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            gate: GateConfig::from_env()?,
            vault: VaultConfig::from_env()?,
            observability: ObservabilityConfig {
                backend: optional_env("VAULTGATE_OBSERVER")?.unwrap_or_else(|| "log".to_string()),
            },
        })
    }
}

/// Unlock gate configuration.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// Shown on the "starting" page so the operator knows where the
    /// protected service reports health. Display only.
    pub health_check_url: Option<String>,
}

impl GateConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind: parse_env("VAULTGATE_BIND")?.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            port: parse_env("VAULTGATE_PORT")?.unwrap_or(3000),
            health_check_url: optional_env("VAULTGATE_HEALTH_URL")?,
        })
    }
}

/// Vault file configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub path: PathBuf,
    /// Keys to declare with random-token generators when the vault does not
    /// hold them yet (comma-separated in `VAULTGATE_GENERATE`).
    pub generate_keys: Vec<String>,
}

impl VaultConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let path = optional_env("VAULTGATE_VAULT_PATH")?
            .map(PathBuf::from)
            .unwrap_or_else(default_vault_path);

        let generate_keys = optional_env("VAULTGATE_GENERATE")?
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            path,
            generate_keys,
        })
    }
}

fn default_vault_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vaultgate")
        .join("secrets.vault")
}

fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "not valid unicode".to_string(),
        }),
    }
}

fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)?
        .map(|s| s.parse())
        .transpose()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}
