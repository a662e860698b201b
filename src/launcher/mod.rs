//! The launcher: vault store, lock state machine, and web gate wired
//! together.
//!
//! Construction follows the builder style: [`Launcher::new`] takes the
//! required pieces, `with_*` methods attach the optional ones, and
//! [`Launcher::serve`] binds the gate and returns a [`LauncherHandle`]
//! carrying the unlock and completion futures.

mod drain;
mod state;

pub use drain::{CLOSE_RETRY_BACKOFF, CloseError, DRAIN_GRACE, Listener, drain};
pub use state::{LockState, UnlockManager, UnlockOutcome};

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use rand::RngCore;
use secrecy::SecretString;
use tokio::sync::oneshot;

use crate::error::GateError;
use crate::observability::{LauncherEvent, NoopObserver, Observer};
use crate::vault::{SecretDefinition, SecretSet, SecretsStore};
use crate::web;

type PasswordProvider = Box<dyn FnOnce() -> SecretString + Send>;

/// Builder for a password-gated launcher.
pub struct Launcher {
    definitions: Vec<SecretDefinition>,
    vault_path: PathBuf,
    addr: SocketAddr,
    initial_password: PasswordProvider,
    on_unlock: Option<Box<dyn FnOnce(&SecretSet) + Send>>,
    observer: Arc<dyn Observer>,
    health_check_url: Option<String>,
}

impl Launcher {
    /// Create a launcher for the given secret definitions, vault file path,
    /// and listen address.
    ///
    /// By default the first-run password is a random token printed to
    /// stdout, since the whole point is that it never travels through the
    /// gate itself. Use [`Launcher::with_initial_password`] to surface it
    /// differently.
    pub fn new(
        definitions: Vec<SecretDefinition>,
        vault_path: impl Into<PathBuf>,
        addr: SocketAddr,
    ) -> Self {
        Self {
            definitions,
            vault_path: vault_path.into(),
            addr,
            initial_password: Box::new(|| {
                let token = random_token(15);
                println!("vaultgate: first-run password (not stored anywhere): {token}");
                SecretString::from(token)
            }),
            on_unlock: None,
            observer: Arc::new(NoopObserver),
            health_check_url: None,
        }
    }

    /// Replace the first-run password provider. The provider is responsible
    /// for surfacing the minted password to the operator out of band.
    pub fn with_initial_password(
        mut self,
        provider: impl FnOnce() -> SecretString + Send + 'static,
    ) -> Self {
        self.initial_password = Box::new(provider);
        self
    }

    /// Attach a callback fired with the reconciled secrets at unlock, before
    /// the gate starts draining.
    pub fn on_unlock(mut self, callback: impl FnOnce(&SecretSet) + Send + 'static) -> Self {
        self.on_unlock = Some(Box::new(callback));
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// URL of the protected service's health check, shown on the "starting"
    /// page so the operator knows where to look next. Display only.
    pub fn with_health_check_url(mut self, url: impl Into<String>) -> Self {
        self.health_check_url = Some(url.into());
        self
    }

    /// Initialize the vault if needed, bind the unlock gate, and start
    /// serving.
    pub async fn serve(self) -> Result<LauncherHandle, GateError> {
        let store = SecretsStore::new(self.vault_path);
        let observer = self.observer;

        // First-run initialization runs a key derivation; keep it off the
        // async workers like any other unlock work.
        let init_store = store.clone();
        let initial_password = self.initial_password;
        let created =
            tokio::task::spawn_blocking(move || init_store.ensure_exists(initial_password))
                .await
                .map_err(|err| GateError::Startup(err.to_string()))??;
        if created {
            observer.record_event(&LauncherEvent::VaultCreated {
                path: store.path().display().to_string(),
            });
        }

        let manager = Arc::new(UnlockManager::new(
            store,
            self.definitions,
            Arc::clone(&observer),
        ));
        if let Some(callback) = self.on_unlock {
            manager.set_on_unlock(callback);
        }

        let (unlocked_tx, unlocked_rx) = oneshot::channel();
        let (completed_tx, completed_rx) = oneshot::channel();
        manager.set_channels(unlocked_tx, completed_tx);

        let (addr, server) =
            web::start_server(self.addr, Arc::clone(&manager), self.health_check_url).await?;
        manager.set_listener(Box::new(server));
        observer.record_event(&LauncherEvent::GateStarted { addr });

        Ok(LauncherHandle {
            addr,
            manager,
            unlocked: unlocked_rx,
            completed: completed_rx,
        })
    }
}

/// Handle to a running launcher.
pub struct LauncherHandle {
    addr: SocketAddr,
    manager: Arc<UnlockManager>,
    unlocked: oneshot::Receiver<SecretSet>,
    completed: oneshot::Receiver<SecretSet>,
}

impl LauncherHandle {
    /// The address the gate actually bound (useful with port 0).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> LockState {
        self.manager.state()
    }

    /// Resolves with the reconciled secrets as soon as the vault unlocks,
    /// while the gate is still draining. Always resolves before
    /// [`LauncherHandle::wait_complete`].
    pub async fn wait_unlocked(&mut self) -> Result<SecretSet, GateError> {
        (&mut self.unlocked)
            .await
            .map_err(|_| GateError::ChannelClosed("unlock"))
    }

    /// Resolves with the secrets once the unlock listener is fully closed.
    pub async fn wait_complete(self) -> Result<SecretSet, GateError> {
        self.completed
            .await
            .map_err(|_| GateError::ChannelClosed("completion"))
    }
}

/// Random hex token, `bytes` bytes of entropy.
pub fn random_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}
