//! Lock state and unlock orchestration.
//!
//! One [`UnlockManager`] exists per launcher. The lock state lives behind a
//! mutex and every transition is exclusive, so two near-simultaneous
//! submissions cannot both run the unlock work: the loser deterministically
//! gets [`UnlockOutcome::AlreadyUnlocked`].

use std::sync::{Arc, Mutex};

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::oneshot;

use crate::launcher::drain::{self, DRAIN_GRACE, Listener};
use crate::observability::{LauncherEvent, Observer};
use crate::vault::{CodecError, SecretDefinition, SecretSet, SecretsStore, StoreError};

/// Where the launcher is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Accepting password submissions.
    Locked,
    /// An unlock attempt is in flight.
    Unlocking,
    /// Secrets reconciled and handed off; drain not started yet.
    Unlocked,
    /// The listener is being retired.
    Draining,
    /// Terminal: listener closed, completion delivered.
    Closed,
}

impl LockState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockState::Locked => "locked",
            LockState::Unlocking => "unlocking",
            LockState::Unlocked => "unlocked",
            LockState::Draining => "draining",
            LockState::Closed => "closed",
        }
    }
}

/// What a password submission produced.
#[derive(Debug)]
pub enum UnlockOutcome {
    /// This submission unlocked the vault.
    Unlocked,
    /// The vault was already unlocked, or another unlock was in flight.
    AlreadyUnlocked,
    /// The password did not decrypt the vault.
    WrongPassword,
    /// Storage or payload failure; the gate stays locked so the operator
    /// can retry.
    Failed(String),
}

type UnlockCallback = Box<dyn FnOnce(&SecretSet) + Send>;

/// Owns the lock state and runs unlock attempts against the store.
///
/// The state mutex is shared with the spawned drain task, which performs the
/// final Draining→Closed transition after the listener reports closed.
pub struct UnlockManager {
    state: Arc<Mutex<LockState>>,
    store: SecretsStore,
    definitions: Arc<Vec<SecretDefinition>>,
    observer: Arc<dyn Observer>,
    on_unlock: Mutex<Option<UnlockCallback>>,
    unlocked_tx: Mutex<Option<oneshot::Sender<SecretSet>>>,
    completed_tx: Mutex<Option<oneshot::Sender<SecretSet>>>,
    listener: Mutex<Option<Box<dyn Listener>>>,
}

impl UnlockManager {
    pub fn new(
        store: SecretsStore,
        definitions: Vec<SecretDefinition>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(LockState::Locked)),
            store,
            definitions: Arc::new(definitions),
            observer,
            on_unlock: Mutex::new(None),
            unlocked_tx: Mutex::new(None),
            completed_tx: Mutex::new(None),
            listener: Mutex::new(None),
        }
    }

    pub fn state(&self) -> LockState {
        *self.state.lock().expect("state mutex")
    }

    /// Register the listener the drain sequencer will retire after unlock.
    pub fn set_listener(&self, listener: Box<dyn Listener>) {
        *self.listener.lock().expect("listener mutex") = Some(listener);
    }

    /// Register the callback fired with the reconciled set at unlock, before
    /// draining starts. Fires at most once.
    pub fn set_on_unlock(&self, callback: UnlockCallback) {
        *self.on_unlock.lock().expect("callback mutex") = Some(callback);
    }

    /// Register the notification channels. `unlocked` resolves at unlock,
    /// `completed` only after the listener is fully closed. They fire in
    /// that order, once each.
    pub fn set_channels(
        &self,
        unlocked: oneshot::Sender<SecretSet>,
        completed: oneshot::Sender<SecretSet>,
    ) {
        *self.unlocked_tx.lock().expect("channel mutex") = Some(unlocked);
        *self.completed_tx.lock().expect("channel mutex") = Some(completed);
    }

    /// Run one unlock attempt.
    ///
    /// The key derivation is CPU-bound, so the store work runs on the
    /// blocking pool; the state mutex is never held across an await.
    pub async fn submit(&self, password: SecretString) -> UnlockOutcome {
        {
            let mut state = self.state.lock().expect("state mutex");
            if *state != LockState::Locked {
                return UnlockOutcome::AlreadyUnlocked;
            }
            *state = LockState::Unlocking;
        }
        self.observer.record_event(&LauncherEvent::PasswordReceived);

        let store = self.store.clone();
        let definitions = Arc::clone(&self.definitions);
        let result = tokio::task::spawn_blocking(move || {
            store.load_and_reconcile(password.expose_secret(), &definitions)
        })
        .await;

        let secrets = match result {
            Ok(Ok(secrets)) => secrets,
            Ok(Err(err)) => {
                let wrong_password = matches!(err, StoreError::Codec(CodecError::BadPassword));
                self.set_state(LockState::Locked);
                self.observer.record_event(&LauncherEvent::UnlockFailed {
                    wrong_password,
                    message: err.to_string(),
                });
                return if wrong_password {
                    UnlockOutcome::WrongPassword
                } else {
                    UnlockOutcome::Failed(err.to_string())
                };
            }
            Err(join_err) => {
                self.set_state(LockState::Locked);
                self.observer.record_event(&LauncherEvent::UnlockFailed {
                    wrong_password: false,
                    message: join_err.to_string(),
                });
                return UnlockOutcome::Failed(join_err.to_string());
            }
        };

        self.set_state(LockState::Unlocked);
        self.observer.record_event(&LauncherEvent::Unlocked);

        // Unlock notifications strictly precede completion: the downstream
        // service may start consuming secrets while the gate drains.
        if let Some(callback) = self.on_unlock.lock().expect("callback mutex").take() {
            callback(&secrets);
        }
        if let Some(tx) = self.unlocked_tx.lock().expect("channel mutex").take() {
            let _ = tx.send(secrets.clone());
        }

        self.set_state(LockState::Draining);
        let state = Arc::clone(&self.state);
        let observer = Arc::clone(&self.observer);
        let listener = self.listener.lock().expect("listener mutex").take();
        let completed_tx = self.completed_tx.lock().expect("channel mutex").take();
        tokio::spawn(async move {
            if let Some(listener) = listener {
                drain::drain(listener.as_ref(), DRAIN_GRACE, observer.as_ref()).await;
            }
            *state.lock().expect("state mutex") = LockState::Closed;
            observer.record_event(&LauncherEvent::Completed);
            if let Some(tx) = completed_tx {
                let _ = tx.send(secrets);
            }
        });

        UnlockOutcome::Unlocked
    }

    fn set_state(&self, next: LockState) {
        *self.state.lock().expect("state mutex") = next;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::launcher::drain::CloseError;
    use crate::observability::NoopObserver;

    const PASSWORD: &str = "test-master";

    struct InstantCloseListener;

    #[async_trait]
    impl Listener for InstantCloseListener {
        fn abort_connections(&self) {}

        async fn close(&self) -> Result<(), CloseError> {
            Ok(())
        }
    }

    struct Harness {
        manager: Arc<UnlockManager>,
        unlocked_rx: oneshot::Receiver<SecretSet>,
        completed_rx: oneshot::Receiver<SecretSet>,
        generator_calls: Arc<AtomicUsize>,
        _dir: TempDir,
    }

    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let store = SecretsStore::new(dir.path().join("secrets.vault"));
        store
            .ensure_exists(|| SecretString::from(PASSWORD.to_string()))
            .unwrap();

        let generator_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&generator_calls);
        let definitions = vec![SecretDefinition::new("API_KEY", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            "abc".to_string()
        })];

        let manager = Arc::new(UnlockManager::new(
            store,
            definitions,
            Arc::new(NoopObserver),
        ));
        manager.set_listener(Box::new(InstantCloseListener));

        let (unlocked_tx, unlocked_rx) = oneshot::channel();
        let (completed_tx, completed_rx) = oneshot::channel();
        manager.set_channels(unlocked_tx, completed_tx);

        Harness {
            manager,
            unlocked_rx,
            completed_rx,
            generator_calls,
            _dir: dir,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn correct_password_unlocks_exactly_once() {
        let h = harness();
        assert_eq!(h.manager.state(), LockState::Locked);

        let outcome = h
            .manager
            .submit(SecretString::from(PASSWORD.to_string()))
            .await;
        assert!(matches!(outcome, UnlockOutcome::Unlocked));

        let secrets = h.unlocked_rx.await.unwrap();
        assert_eq!(secrets.get("API_KEY").map(String::as_str), Some("abc"));

        // Second submission short-circuits: no reconcile, no callbacks.
        let again = h
            .manager
            .submit(SecretString::from(PASSWORD.to_string()))
            .await;
        assert!(matches!(again, UnlockOutcome::AlreadyUnlocked));
        assert_eq!(h.generator_calls.load(Ordering::SeqCst), 1);

        let completed = h.completed_rx.await.unwrap();
        assert_eq!(completed, secrets);
        assert_eq!(h.manager.state(), LockState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_password_returns_to_locked_without_side_effects() {
        let h = harness();

        let outcome = h
            .manager
            .submit(SecretString::from("nope".to_string()))
            .await;
        assert!(matches!(outcome, UnlockOutcome::WrongPassword));
        assert_eq!(h.manager.state(), LockState::Locked);
        assert_eq!(h.generator_calls.load(Ordering::SeqCst), 0);

        // The operator can retry on the same manager.
        let outcome = h
            .manager
            .submit(SecretString::from(PASSWORD.to_string()))
            .await;
        assert!(matches!(outcome, UnlockOutcome::Unlocked));
    }

    #[tokio::test(start_paused = true)]
    async fn storage_failure_is_not_reported_as_wrong_password() {
        let dir = TempDir::new().unwrap();
        // No vault file: the read fails before any decryption.
        let store = SecretsStore::new(dir.path().join("missing.vault"));
        let manager = Arc::new(UnlockManager::new(store, vec![], Arc::new(NoopObserver)));

        let outcome = manager
            .submit(SecretString::from(PASSWORD.to_string()))
            .await;
        assert!(matches!(outcome, UnlockOutcome::Failed(_)));
        assert_eq!(manager.state(), LockState::Locked);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_submissions_cannot_both_pass_the_guard() {
        let h = harness();

        let first = {
            let manager = Arc::clone(&h.manager);
            tokio::spawn(
                async move { manager.submit(SecretString::from(PASSWORD.to_string())).await },
            )
        };
        let second = {
            let manager = Arc::clone(&h.manager);
            tokio::spawn(
                async move { manager.submit(SecretString::from(PASSWORD.to_string())).await },
            )
        };

        let (a, b) = (first.await.unwrap(), second.await.unwrap());
        let unlocked = [&a, &b]
            .iter()
            .filter(|o| matches!(o, UnlockOutcome::Unlocked))
            .count();
        let short_circuited = [&a, &b]
            .iter()
            .filter(|o| matches!(o, UnlockOutcome::AlreadyUnlocked))
            .count();
        assert_eq!(unlocked, 1);
        assert_eq!(short_circuited, 1);
        assert_eq!(h.generator_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unlock_callback_fires_before_completion() {
        let h = harness();

        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let cb_order = Arc::clone(&order);
        h.manager.set_on_unlock(Box::new(move |_secrets| {
            cb_order.lock().unwrap().push("unlock");
        }));

        h.manager
            .submit(SecretString::from(PASSWORD.to_string()))
            .await;
        let _ = h.completed_rx.await.unwrap();
        order.lock().unwrap().push("completed");

        assert_eq!(*order.lock().unwrap(), vec!["unlock", "completed"]);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_waits_for_the_drain_window() {
        let h = harness();
        let start = tokio::time::Instant::now();

        h.manager
            .submit(SecretString::from(PASSWORD.to_string()))
            .await;
        let _ = h.completed_rx.await.unwrap();

        assert!(tokio::time::Instant::now() - start >= Duration::from_secs(3));
    }
}
