use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use shelf_store::RecordStore;

use crate::bridge::SyncBridge;
use crate::error::SyncResult;
use crate::snapshot::Snapshot;

/// Link state as surfaced to the display layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncStatus {
    #[default]
    Offline,
    Syncing,
    Online,
}

/// Keeps the local record store and a remote peer loosely consistent.
///
/// Outbound: [`SyncEngine::push_local`] snapshots both collections and
/// hands them to the bridge. Inbound: a remote snapshot overwrites both
/// collections wholesale — last write wins, no merge.
pub struct SyncEngine {
    records: RecordStore,
    bridge: Arc<dyn SyncBridge>,
    status: RwLock<SyncStatus>,
    last_remote_update: RwLock<Option<DateTime<Utc>>>,
}

impl SyncEngine {
    pub fn new(records: RecordStore, bridge: Arc<dyn SyncBridge>) -> Self {
        Self {
            records,
            bridge,
            status: RwLock::new(SyncStatus::Offline),
            last_remote_update: RwLock::new(None),
        }
    }

    /// Current link state.
    pub fn status(&self) -> SyncStatus {
        *self.status.read().expect("sync status poisoned")
    }

    /// Timestamp of the most recently applied remote snapshot.
    pub fn last_remote_update(&self) -> Option<DateTime<Utc>> {
        *self
            .last_remote_update
            .read()
            .expect("sync status poisoned")
    }

    fn set_status(&self, status: SyncStatus) {
        *self.status.write().expect("sync status poisoned") = status;
    }

    /// Snapshot both collections and push them to the peer.
    pub async fn push_local(&self) -> SyncResult<Snapshot> {
        self.set_status(SyncStatus::Syncing);

        let snapshot = Snapshot::new(self.records.load_products()?, self.records.load_orders()?);
        match self.bridge.push(&snapshot).await {
            Ok(()) => {
                self.set_status(SyncStatus::Online);
                debug!(documents = snapshot.document_count(), "local state pushed");
                Ok(snapshot)
            }
            Err(e) => {
                self.set_status(SyncStatus::Offline);
                Err(e)
            }
        }
    }

    /// Overwrite both collections with a remote snapshot (last write wins).
    pub fn apply_remote(&self, snapshot: &Snapshot) -> SyncResult<()> {
        self.set_status(SyncStatus::Syncing);
        self.records.save_products(&snapshot.products)?;
        self.records.save_orders(&snapshot.orders)?;
        *self
            .last_remote_update
            .write()
            .expect("sync status poisoned") = Some(snapshot.timestamp);
        self.set_status(SyncStatus::Online);
        info!(
            documents = snapshot.document_count(),
            origin = %snapshot.timestamp,
            "remote snapshot applied"
        );
        Ok(())
    }

    /// Subscribe to the bridge's remote-update stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.bridge.subscribe()
    }

    /// Apply remote updates until the subscription closes.
    ///
    /// A lagged receiver skips to the freshest snapshot — intermediate
    /// states lose to later writes anyway.
    pub async fn run(&self, mut updates: broadcast::Receiver<Snapshot>) -> SyncResult<()> {
        loop {
            match updates.recv().await {
                Ok(snapshot) => self.apply_remote(&snapshot)?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "remote update stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.set_status(SyncStatus::Offline);
                    return Ok(());
                }
            }
        }
    }
}
