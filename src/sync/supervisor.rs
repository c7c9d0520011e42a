//! Reconnection to the relational store.

use crate::error::{DirectoryError, DirectoryResult};
use crate::store::RelationalStore;
use crate::sync::SyncState;
use log::{info, warn};
use std::time::Duration;
use tokio::sync::watch;

/// Retries store connections with a fixed delay until one succeeds or the
/// engine is shut down. A refused connection is never fatal.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectSupervisor {
    delay: Duration,
}

impl ReconnectSupervisor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Connect `store`, retrying every `delay`.
    ///
    /// Returns the number of attempts made, or [`DirectoryError::Stopped`] if
    /// `shutdown` fires first.
    pub async fn connect<S: RelationalStore>(
        &self,
        store: &S,
        state: &watch::Sender<SyncState>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> DirectoryResult<usize> {
        let mut attempts = 0;
        loop {
            if *shutdown.borrow() {
                return Err(DirectoryError::Stopped);
            }

            state.send_replace(SyncState::Connecting);
            attempts += 1;

            match store.connect().await {
                Ok(()) => {
                    info!("Connected to relational store after {} attempt(s)", attempts);
                    return Ok(attempts);
                }
                Err(err) => {
                    warn!(
                        "{}; retrying in {} ms",
                        DirectoryError::BackendUnavailable(err),
                        self.delay.as_millis()
                    );
                    state.send_replace(SyncState::Disconnected);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Err(DirectoryError::Stopped);
                    }
                }
            }
        }
    }
}
