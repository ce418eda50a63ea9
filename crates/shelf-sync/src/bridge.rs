use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::{SyncError, SyncResult};
use crate::snapshot::Snapshot;

/// Transport interface to a remote sync peer.
///
/// The backend behind it (its authentication included) is out of scope:
/// the core only pushes snapshots and subscribes to remote ones.
#[async_trait]
pub trait SyncBridge: Send + Sync {
    /// Push a local snapshot to the peer.
    async fn push(&self, snapshot: &Snapshot) -> SyncResult<()>;

    /// Subscribe to snapshots arriving from the peer.
    fn subscribe(&self) -> broadcast::Receiver<Snapshot>;
}

/// In-process bridge for tests and embedding.
///
/// Retains every pushed snapshot and lets the test side play the remote
/// peer by emitting updates into the subscription channel. Can be switched
/// into a failing mode to exercise offline behavior.
pub struct MemoryBridge {
    pushed: RwLock<Vec<Snapshot>>,
    remote_tx: broadcast::Sender<Snapshot>,
    fail_pushes: RwLock<bool>,
}

impl MemoryBridge {
    pub fn new() -> Self {
        let (remote_tx, _) = broadcast::channel(16);
        Self {
            pushed: RwLock::new(Vec::new()),
            remote_tx,
            fail_pushes: RwLock::new(false),
        }
    }

    /// Every snapshot pushed so far, oldest first.
    pub fn pushed(&self) -> Vec<Snapshot> {
        self.pushed.read().expect("bridge lock poisoned").clone()
    }

    /// Act as the remote peer: deliver a snapshot to all subscribers.
    pub fn emit_remote(&self, snapshot: Snapshot) {
        // Nobody listening is fine; the send result only signals that.
        let _ = self.remote_tx.send(snapshot);
    }

    /// Make subsequent pushes fail, simulating a dead link.
    pub fn set_fail_pushes(&self, fail: bool) {
        *self.fail_pushes.write().expect("bridge lock poisoned") = fail;
    }
}

impl Default for MemoryBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncBridge for MemoryBridge {
    async fn push(&self, snapshot: &Snapshot) -> SyncResult<()> {
        if *self.fail_pushes.read().expect("bridge lock poisoned") {
            return Err(SyncError::Bridge("link down".to_string()));
        }
        self.pushed
            .write()
            .expect("bridge lock poisoned")
            .push(snapshot.clone());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.remote_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn snapshot() -> Snapshot {
        Snapshot::new(BTreeMap::new(), BTreeMap::new())
    }

    #[tokio::test]
    async fn push_is_recorded() {
        let bridge = MemoryBridge::new();
        bridge.push(&snapshot()).await.unwrap();
        bridge.push(&snapshot()).await.unwrap();
        assert_eq!(bridge.pushed().len(), 2);
    }

    #[tokio::test]
    async fn failing_mode_rejects_pushes() {
        let bridge = MemoryBridge::new();
        bridge.set_fail_pushes(true);
        assert!(bridge.push(&snapshot()).await.is_err());
        assert!(bridge.pushed().is_empty());
    }

    #[tokio::test]
    async fn emitted_snapshots_reach_subscribers() {
        let bridge = MemoryBridge::new();
        let mut rx = bridge.subscribe();
        bridge.emit_remote(snapshot());
        let received = rx.recv().await.unwrap();
        assert_eq!(received.document_count(), 0);
    }
}
