//! Password-gated startup for services.
//!
//! A vaultgate launcher stores a set of secrets encrypted at rest under a
//! single password, serves a one-shot web page asking the operator for that
//! password, reconciles the decrypted set against caller-declared
//! [`vault::SecretDefinition`]s, and hands the unlocked secrets to the
//! protected service while the unlock gate drains and closes itself.
//!
//! ```ignore
//! use vaultgate::launcher::Launcher;
//! use vaultgate::vault::SecretDefinition;
//!
//! let launcher = Launcher::new(
//!     vec![SecretDefinition::new("DATABASE_KEY", || random_token(30))],
//!     "database-secrets.vault",
//!     "127.0.0.1:3000".parse()?,
//! );
//! let mut handle = launcher.serve().await?;
//! let secrets = handle.wait_unlocked().await?; // gate still draining
//! let secrets = handle.wait_complete().await?; // gate fully closed
//! ```

pub mod config;
pub mod error;
pub mod launcher;
pub mod observability;
pub mod vault;
pub mod web;

pub use error::{ConfigError, GateError};
pub use launcher::{Launcher, LauncherHandle, LockState};
pub use vault::{SecretDefinition, SecretSet, SecretsStore};
