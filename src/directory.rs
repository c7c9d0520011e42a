//! The directory service: configuration, snapshot, engine and handlers wired
//! together.
//!
//! [`Directory`] is what a protocol engine embeds. It answers binds and
//! searches from the current snapshot and, once started, owns the background
//! task that keeps that snapshot fresh.
//!
//! ```rust,no_run
//! use ldap_sql_bridge::config::DirectoryConfig;
//! use ldap_sql_bridge::handlers::{CollectingResponder, MatchAll, SearchRequest};
//! use ldap_sql_bridge::scope::Scope;
//! use ldap_sql_bridge::store::InMemoryStore;
//! use ldap_sql_bridge::Directory;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = DirectoryConfig::load("config.json").await?;
//! let mut directory = Directory::new(settings);
//! directory.start(InMemoryStore::new());
//!
//! directory.bind("cn=alice,ou=users,dc=example,dc=com", "secret")?;
//!
//! let mut responder = CollectingResponder::new();
//! directory.search(
//!     &SearchRequest::new("dc=example,dc=com", Scope::Sub),
//!     &MatchAll,
//!     &mut responder,
//! )?;
//!
//! directory.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::config::DirectorySettings;
use crate::error::ResultCode;
use crate::handlers::{BindHandler, EntryFilter, SearchHandler, SearchRequest, SearchResponder};
use crate::snapshot::Snapshot;
use crate::store::RelationalStore;
use crate::sync::{SnapshotHandle, SyncEngine, SyncState};
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Read-only directory over a relational store.
pub struct Directory {
    settings: Arc<DirectorySettings>,
    snapshots: SnapshotHandle,
    bind: BindHandler,
    search: SearchHandler,
    shutdown: watch::Sender<bool>,
    state: Option<watch::Receiver<SyncState>>,
    task: Option<JoinHandle<()>>,
}

impl Directory {
    /// Create a directory serving the empty tree until started.
    pub fn new(settings: DirectorySettings) -> Self {
        let settings = Arc::new(settings);
        let (shutdown, _) = watch::channel(false);
        Self {
            snapshots: SnapshotHandle::new(Snapshot::empty(&settings)),
            bind: BindHandler::new(settings.access),
            search: SearchHandler::new(settings.access),
            settings,
            shutdown,
            state: None,
            task: None,
        }
    }

    pub fn settings(&self) -> &DirectorySettings {
        &self.settings
    }

    /// Start synchronizing from `store` in a background task.
    ///
    /// Calling this again replaces nothing; the first engine keeps running.
    pub fn start<S>(&mut self, store: S)
    where
        S: RelationalStore + 'static,
    {
        if self.task.is_some() {
            warn!("Directory already started; ignoring second store");
            return;
        }

        let engine = SyncEngine::with_handle(self.settings.clone(), store, self.snapshots.clone());
        self.state = Some(engine.subscribe());
        self.task = Some(engine.spawn(self.shutdown.subscribe()));
        info!(
            "Directory started for '{}' (refresh every {} ms)",
            self.settings.base_dn, self.settings.sync.refresh_interval_ms
        );
    }

    /// Current engine state, `Disconnected` before [`start`](Self::start).
    pub fn state(&self) -> SyncState {
        self.state
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(SyncState::Disconnected)
    }

    /// Follow engine state transitions, once started.
    pub fn subscribe(&self) -> Option<watch::Receiver<SyncState>> {
        self.state.clone()
    }

    /// The snapshot currently served.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshots.load()
    }

    /// Handle on the published snapshot, for callers running their own engine.
    pub fn snapshots(&self) -> SnapshotHandle {
        self.snapshots.clone()
    }

    /// Authenticate a simple bind.
    pub fn bind(&self, dn: &str, credential: &str) -> Result<(), ResultCode> {
        let snapshot = self.snapshots.load();
        self.bind.bind(&snapshot, dn, credential)
    }

    /// Run a search against the current snapshot.
    pub fn search<F, R>(
        &self,
        request: &SearchRequest,
        filter: &F,
        responder: &mut R,
    ) -> Result<usize, ResultCode>
    where
        F: EntryFilter + ?Sized,
        R: SearchResponder + ?Sized,
    {
        let snapshot = self.snapshots.load();
        self.search.search(&snapshot, request, filter, responder)
    }

    /// Stop the background engine and wait for it to finish.
    pub async fn shutdown(&mut self) {
        self.shutdown.send_replace(true);
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("Synchronization task ended abnormally: {}", err);
            }
        }
    }
}

impl Drop for Directory {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}
