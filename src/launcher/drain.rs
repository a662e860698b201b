//! Graceful retirement of the unlock listener.
//!
//! After a successful unlock the gate has one last response to deliver (the
//! "starting" page), so the listener gets a short grace window before its
//! connections are severed. Closing then retries on a fixed backoff until
//! the listener actually reports closed.

use std::time::Duration;

use async_trait::async_trait;

use crate::observability::{LauncherEvent, Observer};

/// Delay between the unlock response and the first close attempt, giving
/// in-flight status pages time to finish.
pub const DRAIN_GRACE: Duration = Duration::from_secs(3);

/// Backoff between close retries when the listener refuses to shut down.
pub const CLOSE_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// A listener close attempt failed. Always retried, never surfaced to the
/// operator beyond the observer.
#[derive(Debug, thiserror::Error)]
#[error("listener close failed: {0}")]
pub struct CloseError(pub String);

/// The server half the drain sequencer retires.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Force-close all open connections and stop accepting new ones.
    /// Idempotent; called again before every retry.
    fn abort_connections(&self);

    /// Wait for the listener to finish shutting down.
    async fn close(&self) -> Result<(), CloseError>;
}

/// Drive `listener` to closed: wait out the grace period, then force-close
/// and retry until a close attempt succeeds.
///
/// Retries are unbounded; the backoff keeps the loop quiet while the
/// listener is stuck. Returns only once the listener reports closed.
pub async fn drain(listener: &dyn Listener, grace: Duration, observer: &dyn Observer) {
    if !grace.is_zero() {
        observer.record_event(&LauncherEvent::DrainScheduled { delay: grace });
        tokio::time::sleep(grace).await;
    }

    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        observer.record_event(&LauncherEvent::ListenerClosing { attempt });
        listener.abort_connections();
        match listener.close().await {
            Ok(()) => {
                observer.record_event(&LauncherEvent::ListenerClosed);
                return;
            }
            Err(err) => {
                observer.record_event(&LauncherEvent::CloseRetry {
                    attempt,
                    message: err.to_string(),
                });
                tokio::time::sleep(CLOSE_RETRY_BACKOFF).await;
            }
        }
    }
}
