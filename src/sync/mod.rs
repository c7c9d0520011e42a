//! Synchronization engine.
//!
//! The engine owns the relational store client and keeps the published
//! [`Snapshot`] in step with it:
//!
//! ```text
//! Disconnected ──► Connecting ──► Loading ──► Ready
//!                      ▲             ▲          │
//!                      │             └── tick ──┘
//!                      └──── connection lost (any state)
//! ```
//!
//! A refresh issues the users query and the groups query, builds a new
//! snapshot and swaps it in atomically. If either query fails the current
//! snapshot stays published; request handlers keep answering from it.
//!
//! Readers go through a [`SnapshotHandle`], which is a lock-free
//! `ArcSwap`. Each request loads the current snapshot once and keeps that
//! `Arc` for its whole lifetime, so a publication mid-request is invisible to
//! it.

pub mod supervisor;

pub use supervisor::ReconnectSupervisor;

use crate::config::DirectorySettings;
use crate::error::{DirectoryError, DirectoryResult};
use crate::snapshot::{BuildReport, Snapshot};
use crate::store::{RelationalStore, Row};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    Disconnected,
    Connecting,
    Loading,
    Ready,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncState::Disconnected => "disconnected",
            SyncState::Connecting => "connecting",
            SyncState::Loading => "loading",
            SyncState::Ready => "ready",
        })
    }
}

/// Shared, atomically replaced reference to the current snapshot.
#[derive(Clone)]
pub struct SnapshotHandle {
    current: Arc<ArcSwap<Snapshot>>,
}

impl SnapshotHandle {
    pub fn new(initial: Snapshot) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// The snapshot to serve one request from.
    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Generation of the current snapshot.
    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }

    fn publish(&self, snapshot: Snapshot) {
        self.current.store(Arc::new(snapshot));
    }
}

impl fmt::Debug for SnapshotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotHandle")
            .field("generation", &self.generation())
            .finish()
    }
}

/// Outcome of one successful refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    pub build: BuildReport,
    pub elapsed: Duration,
}

enum Wake {
    Tick,
    Idle,
    ConnectionLost,
    Shutdown,
}

/// Drives refreshes against a relational store.
pub struct SyncEngine<S> {
    store: S,
    settings: Arc<DirectorySettings>,
    snapshots: SnapshotHandle,
    state: watch::Sender<SyncState>,
    supervisor: ReconnectSupervisor,
}

impl<S: RelationalStore> SyncEngine<S> {
    /// Create an engine serving an empty snapshot until the first refresh.
    pub fn new(settings: Arc<DirectorySettings>, store: S) -> Self {
        let handle = SnapshotHandle::new(Snapshot::empty(&settings));
        Self::with_handle(settings, store, handle)
    }

    /// Create an engine publishing into an existing handle.
    pub fn with_handle(settings: Arc<DirectorySettings>, store: S, snapshots: SnapshotHandle) -> Self {
        let (state, _) = watch::channel(SyncState::Disconnected);
        let supervisor = ReconnectSupervisor::new(settings.reconnect_delay());
        Self {
            store,
            settings,
            snapshots,
            state,
            supervisor,
        }
    }

    pub fn snapshots(&self) -> SnapshotHandle {
        self.snapshots.clone()
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Follow state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Connect to the store, retrying until it succeeds or `shutdown` fires.
    pub async fn connect(&self, shutdown: &mut watch::Receiver<bool>) -> DirectoryResult<usize> {
        self.supervisor
            .connect(&self.store, &self.state, shutdown)
            .await
    }

    /// Load both tables and publish a new snapshot.
    ///
    /// On failure nothing is published and the error is returned; the state
    /// drops to `Disconnected` when the failure was a lost connection.
    pub async fn refresh(&self) -> DirectoryResult<RefreshReport> {
        let started = Instant::now();
        self.state.send_replace(SyncState::Loading);

        let (users, groups) = match self.load_rows().await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(
                    "Refresh failed, keeping generation {}: {}",
                    self.snapshots.generation(),
                    err
                );
                self.state.send_replace(if err.is_connection_loss() {
                    SyncState::Disconnected
                } else {
                    SyncState::Ready
                });
                return Err(err);
            }
        };

        let generation = self.snapshots.generation() + 1;
        let (snapshot, build) = Snapshot::build(&self.settings, &users, &groups, generation);
        let built_at = snapshot.built_at();
        self.snapshots.publish(snapshot);
        self.state.send_replace(SyncState::Ready);

        let report = RefreshReport {
            generation,
            built_at,
            build,
            elapsed: started.elapsed(),
        };
        info!(
            "Published generation {} built at {}: {} users, {} groups, {} rows skipped ({} ms)",
            generation,
            built_at.to_rfc3339(),
            build.users,
            build.groups,
            build.skipped_rows + build.duplicate_users,
            report.elapsed.as_millis()
        );
        Ok(report)
    }

    async fn load_rows(&self) -> DirectoryResult<(Vec<Row>, Vec<Row>)> {
        let users = self
            .store
            .query(&self.settings.users.query)
            .await
            .map_err(|source| DirectoryError::QueryFailure {
                entity: "users",
                source,
            })?;
        let groups = self
            .store
            .query(&self.settings.groups.query)
            .await
            .map_err(|source| DirectoryError::QueryFailure {
                entity: "groups",
                source,
            })?;
        debug!("Loaded {} user rows and {} group rows", users.len(), groups.len());
        Ok((users, groups))
    }

    /// Run until `shutdown` is set to `true` or its sender is dropped.
    ///
    /// Connects (with retries), refreshes immediately, then refreshes on
    /// every interval tick. A lost connection, whether announced by the store
    /// or hit by a refresh, goes back to connecting without waiting for the
    /// next tick.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.settings.refresh_interval();

        'connection: loop {
            if self.connect(&mut shutdown).await.is_err() {
                break;
            }

            if let Err(err) = self.refresh().await {
                if err.is_connection_loss() {
                    continue;
                }
            }

            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let wake = tokio::select! {
                    _ = ticker.tick() => Wake::Tick,
                    _ = self.store.connection_lost() => Wake::ConnectionLost,
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            Wake::Shutdown
                        } else {
                            Wake::Idle
                        }
                    }
                };

                match wake {
                    Wake::Tick => {}
                    Wake::Idle => continue,
                    Wake::ConnectionLost => {
                        warn!("Lost connection to relational store, reconnecting");
                        self.state.send_replace(SyncState::Disconnected);
                        continue 'connection;
                    }
                    Wake::Shutdown => break 'connection,
                }

                if let Err(err) = self.refresh().await {
                    if err.is_connection_loss() {
                        warn!("Lost connection to relational store, reconnecting");
                        continue 'connection;
                    }
                }
            }
        }

        self.state.send_replace(SyncState::Disconnected);
        info!("Synchronization engine stopped");
    }

    /// Spawn [`run`](Self::run) on the current tokio runtime.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()>
    where
        S: 'static,
    {
        tokio::spawn(self.run(shutdown))
    }
}
