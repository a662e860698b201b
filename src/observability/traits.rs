//! Core observer trait and launcher event types.
use std::net::SocketAddr;
use std::time::Duration;

/// Pluggable sink for launcher lifecycle events.
///
/// Implementations can log to tracing, forward to an operator console, or do
/// nothing at all. The launcher records events at key lifecycle points and
/// the observer decides what to do with them.
///
/// Thread-safe and cheaply shareable behind `Arc<dyn Observer>`.
pub trait Observer: Send + Sync {
    /// Record a discrete lifecycle event.
    fn record_event(&self, event: &LauncherEvent);

    /// Flush any buffered data. No-op by default.
    fn flush(&self) {}

    /// Human-readable backend name (e.g. "noop", "log").
    fn name(&self) -> &str;
}

/// Discrete lifecycle events the launcher can emit.
#[derive(Debug, Clone)]
pub enum LauncherEvent {
    /// The unlock gate is listening.
    GateStarted { addr: SocketAddr },

    /// First run: the vault file was created under a freshly minted password.
    VaultCreated { path: String },

    /// A password arrived from the unlock page.
    PasswordReceived,

    /// An unlock attempt failed. `wrong_password` separates the expected
    /// bad-password path from storage or payload failures.
    UnlockFailed { wrong_password: bool, message: String },

    /// The vault decrypted and the secret set is reconciled.
    Unlocked,

    /// The listener will be force-closed after this delay.
    DrainScheduled { delay: Duration },

    /// A close attempt is starting.
    ListenerClosing { attempt: u32 },

    /// A close attempt failed; another follows after the backoff.
    CloseRetry { attempt: u32, message: String },

    /// The listener is fully closed.
    ListenerClosed,

    /// Handoff finished: secrets delivered, listener retired.
    Completed,

    /// An error occurred in a component.
    Error { component: String, message: String },
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::observability::traits::*;

    #[test]
    fn event_variants_are_constructible() {
        let _ = LauncherEvent::GateStarted {
            addr: "127.0.0.1:3000".parse().unwrap(),
        };
        let _ = LauncherEvent::VaultCreated {
            path: "/tmp/secrets.vault".into(),
        };
        let _ = LauncherEvent::PasswordReceived;
        let _ = LauncherEvent::UnlockFailed {
            wrong_password: true,
            message: "bad password".into(),
        };
        let _ = LauncherEvent::Unlocked;
        let _ = LauncherEvent::DrainScheduled {
            delay: Duration::from_secs(3),
        };
        let _ = LauncherEvent::ListenerClosing { attempt: 1 };
        let _ = LauncherEvent::CloseRetry {
            attempt: 1,
            message: "connections still open".into(),
        };
        let _ = LauncherEvent::ListenerClosed;
        let _ = LauncherEvent::Completed;
        let _ = LauncherEvent::Error {
            component: "store".into(),
            message: "disk full".into(),
        };
    }
}
