//! Tracing-based observer that emits structured log events.
//!
//! Uses the existing `tracing` infrastructure so launcher events appear
//! alongside normal application logs, with no extra dependencies.
use crate::observability::traits::{LauncherEvent, Observer};

/// Observer that logs events via `tracing`.
pub struct LogObserver;

impl Observer for LogObserver {
    fn record_event(&self, event: &LauncherEvent) {
        match event {
            LauncherEvent::GateStarted { addr } => {
                tracing::info!(%addr, "unlock gate started");
            }
            LauncherEvent::VaultCreated { path } => {
                tracing::info!(path, "vault created with a fresh initial password");
            }
            LauncherEvent::PasswordReceived => {
                tracing::info!("password received from unlock page");
            }
            LauncherEvent::UnlockFailed {
                wrong_password,
                message,
            } => {
                // The bad-password path is routine operator fumbling; only
                // storage/payload failures are unexpected.
                if *wrong_password {
                    tracing::info!("unlock failed: bad password");
                } else {
                    tracing::error!(error = message.as_str(), "unlock failed unexpectedly");
                }
            }
            LauncherEvent::Unlocked => {
                tracing::info!("unlock successful");
            }
            LauncherEvent::DrainScheduled { delay } => {
                tracing::info!(delay_secs = delay.as_secs(), "stopping unlock gate soon");
            }
            LauncherEvent::ListenerClosing { attempt } => {
                tracing::info!(attempt, "stopping unlock gate");
            }
            LauncherEvent::CloseRetry { attempt, message } => {
                tracing::error!(attempt, error = message.as_str(), "error stopping unlock gate");
            }
            LauncherEvent::ListenerClosed => {
                tracing::info!("unlock gate stopped");
            }
            LauncherEvent::Completed => {
                tracing::info!("handoff complete");
            }
            LauncherEvent::Error { component, message } => {
                tracing::warn!(component, error = message.as_str(), "launcher error");
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::observability::log::LogObserver;
    use crate::observability::traits::*;

    #[test]
    fn name_is_log() {
        assert_eq!(LogObserver.name(), "log");
    }

    #[test]
    fn record_event_does_not_panic() {
        let obs = LogObserver;
        obs.record_event(&LauncherEvent::GateStarted {
            addr: "127.0.0.1:0".parse().unwrap(),
        });
        obs.record_event(&LauncherEvent::VaultCreated {
            path: "secrets.vault".into(),
        });
        obs.record_event(&LauncherEvent::PasswordReceived);
        obs.record_event(&LauncherEvent::UnlockFailed {
            wrong_password: true,
            message: "bad password or corrupt data".into(),
        });
        obs.record_event(&LauncherEvent::UnlockFailed {
            wrong_password: false,
            message: "disk full".into(),
        });
        obs.record_event(&LauncherEvent::Unlocked);
        obs.record_event(&LauncherEvent::DrainScheduled {
            delay: Duration::from_secs(3),
        });
        obs.record_event(&LauncherEvent::ListenerClosing { attempt: 1 });
        obs.record_event(&LauncherEvent::CloseRetry {
            attempt: 1,
            message: "connections still open".into(),
        });
        obs.record_event(&LauncherEvent::ListenerClosed);
        obs.record_event(&LauncherEvent::Completed);
        obs.record_event(&LauncherEvent::Error {
            component: "store".into(),
            message: "io".into(),
        });
    }

    #[test]
    fn flush_does_not_panic() {
        LogObserver.flush();
    }
}
