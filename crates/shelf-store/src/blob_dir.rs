use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use shelf_types::CatalogKey;

use crate::blob::{BlobStore, ImageBlob};
use crate::error::{StoreError, StoreResult};

/// Persisted sidecar describing one stored payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct BlobMeta {
    code: String,
    supplier: String,
    format: String,
    timestamp: DateTime<Utc>,
    len: u64,
}

impl BlobMeta {
    fn key(&self) -> CatalogKey {
        CatalogKey::new(self.code.clone(), self.supplier.clone())
    }
}

/// One indexed entry: its metadata and the file stem both its files share.
struct Slot {
    meta: BlobMeta,
    stem: String,
}

/// A live view of the directory: the collection plus its secondary
/// indexes (by code, by supplier; recency ordering comes from the metas).
struct Connection {
    entries: HashMap<CatalogKey, Slot>,
    by_code: HashMap<String, BTreeSet<CatalogKey>>,
    by_supplier: HashMap<String, BTreeSet<CatalogKey>>,
    used_bytes: u64,
}

impl Connection {
    /// Build the collection and indexes by scanning the directory.
    ///
    /// Idempotent: re-scanning an existing directory reconstructs the same
    /// state and never destroys data. Corrupt sidecars are skipped.
    fn scan(base_dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(base_dir)?;

        let mut conn = Self {
            entries: HashMap::new(),
            by_code: HashMap::new(),
            by_supplier: HashMap::new(),
            used_bytes: 0,
        };

        for dirent in fs::read_dir(base_dir)? {
            let path = dirent?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let meta: BlobMeta = match fs::read_to_string(&path)
                .map_err(StoreError::from)
                .and_then(|raw| {
                    serde_json::from_str(&raw).map_err(|e| StoreError::CorruptState {
                        entry: stem.to_string(),
                        reason: e.to_string(),
                    })
                }) {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping corrupt blob sidecar");
                    continue;
                }
            };
            conn.insert(Slot {
                stem: stem.to_string(),
                meta,
            });
        }

        debug!(blobs = conn.entries.len(), "blob collection opened");
        Ok(conn)
    }

    fn insert(&mut self, slot: Slot) {
        let key = slot.meta.key();
        self.remove(&key);
        self.by_code
            .entry(slot.meta.code.clone())
            .or_default()
            .insert(key.clone());
        self.by_supplier
            .entry(slot.meta.supplier.clone())
            .or_default()
            .insert(key.clone());
        self.used_bytes += slot.meta.len;
        self.entries.insert(key, slot);
    }

    fn remove(&mut self, key: &CatalogKey) -> Option<Slot> {
        let slot = self.entries.remove(key)?;
        if let Some(set) = self.by_code.get_mut(&slot.meta.code) {
            set.remove(key);
            if set.is_empty() {
                self.by_code.remove(&slot.meta.code);
            }
        }
        if let Some(set) = self.by_supplier.get_mut(&slot.meta.supplier) {
            set.remove(key);
            if set.is_empty() {
                self.by_supplier.remove(&slot.meta.supplier);
            }
        }
        self.used_bytes -= slot.meta.len;
        Some(slot)
    }
}

/// Connection lifecycle per the lazy-reconnect pattern: every operation
/// passes through a probe and transparently re-initializes a dead
/// connection. Callers never observe `Closed` or `Broken`.
enum ConnState {
    Closed,
    Open(Connection),
    Broken,
}

/// Directory-backed [`BlobStore`].
///
/// Each blob is a payload file plus a JSON sidecar sharing a stem derived
/// from the key. Secondary indexes live in memory and are rebuilt on every
/// (re)connect.
pub struct DirBlobStore {
    base_dir: PathBuf,
    quota: Option<u64>,
    state: Mutex<ConnState>,
}

impl DirBlobStore {
    /// Create a store rooted at `base_dir`. The connection is established
    /// lazily on first use.
    pub fn open(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            quota: None,
            state: Mutex::new(ConnState::Closed),
        }
    }

    /// Create a store with a total payload byte quota.
    pub fn open_with_quota(base_dir: &Path, quota: u64) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            quota: Some(quota),
            state: Mutex::new(ConnState::Closed),
        }
    }

    /// Probe a live connection and (re)initialize when needed.
    fn ensure_open<'a>(
        state: &'a mut ConnState,
        base_dir: &Path,
    ) -> StoreResult<&'a mut Connection> {
        if matches!(state, ConnState::Open(_)) && fs::read_dir(base_dir).is_err() {
            warn!(dir = %base_dir.display(), "blob connection probe failed; reinitializing");
            *state = ConnState::Broken;
        }
        if !matches!(state, ConnState::Open(_)) {
            *state = ConnState::Open(Connection::scan(base_dir)?);
        }
        match state {
            ConnState::Open(conn) => Ok(conn),
            _ => unreachable!("connection was just opened"),
        }
    }

    /// Run an operation against the live connection. An I/O failure marks
    /// the connection broken so the next operation re-initializes it.
    fn with_conn<R>(
        &self,
        op: impl FnOnce(&mut Connection, &Path) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut state = self.state.lock().expect("blob state poisoned");
        let conn = Self::ensure_open(&mut state, &self.base_dir)?;
        match op(conn, &self.base_dir) {
            Ok(value) => Ok(value),
            Err(e) => {
                if matches!(e, StoreError::Io(_)) {
                    *state = ConnState::Broken;
                }
                Err(e)
            }
        }
    }

    fn read_payload(base_dir: &Path, slot: &Slot) -> StoreResult<Option<ImageBlob>> {
        let path = base_dir.join(format!("{}.img", slot.stem));
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(ImageBlob {
                code: slot.meta.code.clone(),
                supplier: slot.meta.supplier.clone(),
                format: slot.meta.format.clone(),
                bytes,
                timestamp: slot.meta.timestamp,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(stem = %slot.stem, "payload file missing for indexed blob");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn collect_sorted(
        conn: &Connection,
        base_dir: &Path,
        keys: impl Iterator<Item = CatalogKey>,
    ) -> StoreResult<Vec<ImageBlob>> {
        let mut slots: Vec<&Slot> = keys.filter_map(|k| conn.entries.get(&k)).collect();
        slots.sort_by(|a, b| {
            b.meta
                .timestamp
                .cmp(&a.meta.timestamp)
                .then_with(|| a.meta.key().cmp(&b.meta.key()))
        });

        let mut blobs = Vec::with_capacity(slots.len());
        for slot in slots {
            if let Some(blob) = Self::read_payload(base_dir, slot)? {
                blobs.push(blob);
            }
        }
        Ok(blobs)
    }
}

/// Injective file stem for a key: every byte outside `[A-Za-z0-9-]` is
/// `%XX`-encoded, then code and supplier are joined with `_` (which the
/// encoding never emits, so distinct keys never share a stem).
fn encode_stem(key: &CatalogKey) -> String {
    fn encode_part(out: &mut String, part: &str) {
        for byte in part.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                out.push(byte as char);
            } else {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    let mut stem = String::new();
    encode_part(&mut stem, key.code());
    stem.push('_');
    encode_part(&mut stem, key.supplier());
    stem
}

#[async_trait]
impl BlobStore for DirBlobStore {
    async fn put(&self, blob: ImageBlob) -> StoreResult<()> {
        let quota = self.quota;
        self.with_conn(move |conn, base_dir| {
            let key = blob.key();
            let replaced = conn.entries.get(&key).map(|s| s.meta.len).unwrap_or(0);

            if let Some(quota) = quota {
                let used = conn.used_bytes - replaced;
                let requested = blob.bytes.len() as u64;
                if used + requested > quota {
                    return Err(StoreError::StorageFull {
                        used,
                        quota,
                        requested,
                    });
                }
            }

            let stem = encode_stem(&key);
            let payload_path = base_dir.join(format!("{stem}.img"));
            let meta_path = base_dir.join(format!("{stem}.json"));

            let meta = BlobMeta {
                code: blob.code.clone(),
                supplier: blob.supplier.clone(),
                format: blob.format.clone(),
                timestamp: blob.timestamp,
                len: blob.bytes.len() as u64,
            };

            // Payload first, through a tmp file, so a crash never leaves a
            // sidecar pointing at half a payload.
            let tmp = base_dir.join(format!("{stem}.img.tmp"));
            {
                let mut file = fs::File::create(&tmp)?;
                file.write_all(&blob.bytes)?;
                file.sync_all()?;
            }
            fs::rename(&tmp, &payload_path)?;
            fs::write(
                &meta_path,
                serde_json::to_string(&meta)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?,
            )?;

            conn.insert(Slot { meta, stem });
            debug!(key = %key, bytes = blob.bytes.len(), "blob stored");
            Ok(())
        })
    }

    async fn get(&self, key: &CatalogKey) -> StoreResult<Option<ImageBlob>> {
        self.with_conn(|conn, base_dir| match conn.entries.get(key) {
            Some(slot) => Self::read_payload(base_dir, slot),
            None => Ok(None),
        })
    }

    async fn exists(&self, key: &CatalogKey) -> StoreResult<bool> {
        self.with_conn(|conn, _| Ok(conn.entries.contains_key(key)))
    }

    async fn delete(&self, key: &CatalogKey) -> StoreResult<bool> {
        self.with_conn(|conn, base_dir| {
            let Some(slot) = conn.remove(key) else {
                return Ok(false);
            };
            for ext in ["img", "json"] {
                let path = base_dir.join(format!("{}.{ext}", slot.stem));
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(true)
        })
    }

    async fn delete_all(&self) -> StoreResult<()> {
        self.with_conn(|conn, base_dir| {
            for slot in conn.entries.values() {
                for ext in ["img", "json"] {
                    let path = base_dir.join(format!("{}.{ext}", slot.stem));
                    match fs::remove_file(&path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => return Err(e.into()),
                    }
                }
            }
            conn.entries.clear();
            conn.by_code.clear();
            conn.by_supplier.clear();
            conn.used_bytes = 0;
            Ok(())
        })
    }

    async fn list(&self) -> StoreResult<Vec<ImageBlob>> {
        self.with_conn(|conn, base_dir| {
            let keys: Vec<CatalogKey> = conn.entries.keys().cloned().collect();
            Self::collect_sorted(conn, base_dir, keys.into_iter())
        })
    }

    async fn find_by_code(&self, code: &str) -> StoreResult<Vec<ImageBlob>> {
        self.with_conn(|conn, base_dir| {
            let keys: Vec<CatalogKey> = conn
                .by_code
                .get(code)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default();
            Self::collect_sorted(conn, base_dir, keys.into_iter())
        })
    }

    async fn find_by_supplier(&self, supplier: &str) -> StoreResult<Vec<ImageBlob>> {
        self.with_conn(|conn, base_dir| {
            let keys: Vec<CatalogKey> = conn
                .by_supplier
                .get(supplier)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default();
            Self::collect_sorted(conn, base_dir, keys.into_iter())
        })
    }

    async fn count(&self) -> StoreResult<usize> {
        self.with_conn(|conn, _| Ok(conn.entries.len()))
    }
}
