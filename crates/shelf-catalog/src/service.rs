use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use shelf_media::{Compressor, TargetPolicy};
use shelf_store::{BlobStore, ImageBlob, RecordStore};
use shelf_types::{CatalogKey, OrderClock, ProductPatch, ProductRecord};

use crate::error::CatalogResult;

/// Supplier group used when an entry has no product record or its record
/// has a blank supplier.
pub const UNCLASSIFIED: &str = "unclassified";

/// One file handed to an upload or folder-match batch.
#[derive(Clone, Debug)]
pub struct UploadFile {
    /// Base file name; the product code is the part before the first `.`.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Where in the per-item pipeline an upload failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadStage {
    Reading,
    Compressing,
    Persisting,
}

/// A per-file failure inside a batch. Never aborts sibling files.
#[derive(Clone, Debug)]
pub struct UploadFailure {
    pub file: String,
    pub stage: UploadStage,
    pub error: String,
}

impl UploadFailure {
    fn new(file: &str, stage: UploadStage, error: impl ToString) -> Self {
        Self {
            file: file.to_string(),
            stage,
            error: error.to_string(),
        }
    }
}

/// Outcome of an upload batch.
#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<CatalogKey>,
    pub failures: Vec<UploadFailure>,
}

/// Outcome of a folder match.
#[derive(Debug, Default)]
pub struct MatchReport {
    /// Files whose code matched at least one product record.
    pub matched: usize,
    /// File names with no matching product code.
    pub unmatched: Vec<String>,
    pub failures: Vec<UploadFailure>,
}

/// A per-key failure inside a batch delete.
#[derive(Clone, Debug)]
pub struct DeleteFailure {
    pub key: CatalogKey,
    pub error: String,
}

/// Outcome of a batch delete.
#[derive(Debug, Default)]
pub struct DeleteReport {
    /// Keys whose record and image are both gone.
    pub deleted: Vec<CatalogKey>,
    pub failures: Vec<DeleteFailure>,
}

/// A joined display entry: image and product record for one key, either
/// side possibly absent.
#[derive(Clone, Debug)]
pub struct CatalogEntry {
    pub key: CatalogKey,
    pub image: Option<ImageBlob>,
    pub product: Option<ProductRecord>,
}

/// The single writer path over the two local stores.
///
/// Owns the join logic and the ephemeral selection set. One long-lived
/// instance per process, opened and closed explicitly; nothing here is
/// ambient global state.
pub struct CatalogService {
    pub(crate) records: RecordStore,
    pub(crate) blobs: Arc<dyn BlobStore>,
    compressor: Compressor,
    policy: TargetPolicy,
    selection: Mutex<HashSet<CatalogKey>>,
    pub(crate) order_clock: OrderClock,
}

impl CatalogService {
    /// Open a service over the given stores with the default compression
    /// targets.
    pub fn open(records: RecordStore, blobs: Arc<dyn BlobStore>) -> Self {
        info!("catalog service opened");
        Self {
            records,
            blobs,
            compressor: Compressor::new(),
            policy: TargetPolicy::default(),
            selection: Mutex::new(HashSet::new()),
            order_clock: OrderClock::new(),
        }
    }

    /// Override the compression target policy.
    pub fn with_target_policy(mut self, policy: TargetPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Close the service. Collection saves are write-through, so there is
    /// nothing to flush; the explicit lifecycle keeps ownership clear.
    pub fn close(self) {
        info!("catalog service closed");
    }

    // =======================================================================
    // Accessors
    // =======================================================================

    /// The record store behind this service.
    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// The blob store behind this service.
    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    // =======================================================================
    // Image uploads
    // =======================================================================

    /// Compress and store a batch of images under `(code, supplier_hint)`.
    ///
    /// The code comes from each file's base name. One undecodable or
    /// unwritable file never aborts the batch; it is reported and the
    /// remaining files proceed.
    pub async fn upload_images(
        &self,
        files: Vec<UploadFile>,
        supplier_hint: Option<&str>,
    ) -> UploadReport {
        let supplier = supplier_hint.unwrap_or("");
        let mut report = UploadReport::default();

        for file in files {
            match self.upload_one(&file, supplier).await {
                Ok(key) => report.uploaded.push(key),
                Err(failure) => {
                    warn!(
                        file = %failure.file,
                        stage = ?failure.stage,
                        error = %failure.error,
                        "upload item failed"
                    );
                    report.failures.push(failure);
                }
            }
        }
        report
    }

    /// Idle → Reading → Compressing → Persisting → Idle, for one file.
    async fn upload_one(
        &self,
        file: &UploadFile,
        supplier: &str,
    ) -> Result<CatalogKey, UploadFailure> {
        let code = code_from_filename(&file.name).ok_or_else(|| {
            UploadFailure::new(&file.name, UploadStage::Reading, "no product code in file name")
        })?;

        let target = self.policy.target_for(file.bytes.len() as u64);
        let compressed = self
            .compressor
            .compress(&file.bytes, target)
            .map_err(|e| UploadFailure::new(&file.name, UploadStage::Compressing, e))?;

        let key = CatalogKey::new(code, supplier);
        let blob = ImageBlob::new(&key, compressed.format.clone(), compressed.bytes);
        self.blobs
            .put(blob)
            .await
            .map_err(|e| UploadFailure::new(&file.name, UploadStage::Persisting, e))?;

        debug!(key = %key, target, "image uploaded");
        Ok(key)
    }

    // =======================================================================
    // Folder match
    // =======================================================================

    /// Match a folder of images against the catalog by product code.
    ///
    /// Each matching file is compressed once and written under every
    /// `(code, supplier)` pair that has a record. Files with no matching
    /// code are counted and listed; per-file failures aggregate.
    pub async fn match_folder(&self, files: Vec<UploadFile>) -> CatalogResult<MatchReport> {
        let products = self.records.load_products()?;

        let mut suppliers_by_code: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for product in products.values() {
            suppliers_by_code
                .entry(product.code.as_str())
                .or_default()
                .push(product.supplier.as_str());
        }

        let mut report = MatchReport::default();
        for file in &files {
            let code = code_from_filename(&file.name).unwrap_or("");
            let Some(suppliers) = suppliers_by_code.get(code) else {
                report.unmatched.push(file.name.clone());
                continue;
            };
            report.matched += 1;

            let target = self.policy.target_for(file.bytes.len() as u64);
            let compressed = match self.compressor.compress(&file.bytes, target) {
                Ok(compressed) => compressed,
                Err(e) => {
                    warn!(file = %file.name, error = %e, "folder match item failed");
                    report
                        .failures
                        .push(UploadFailure::new(&file.name, UploadStage::Compressing, e));
                    continue;
                }
            };

            // One compression pass feeds every supplier's blob.
            for supplier in suppliers {
                let key = CatalogKey::new(code, *supplier);
                let blob = ImageBlob::new(&key, compressed.format.clone(), compressed.bytes.clone());
                if let Err(e) = self.blobs.put(blob).await {
                    warn!(key = %key, error = %e, "folder match write failed");
                    report
                        .failures
                        .push(UploadFailure::new(&file.name, UploadStage::Persisting, e));
                }
            }
        }

        info!(
            matched = report.matched,
            unmatched = report.unmatched.len(),
            "folder match finished"
        );
        Ok(report)
    }

    // =======================================================================
    // Selection
    // =======================================================================

    /// Mark a key for the next batch operation. Returns `false` if it was
    /// already selected.
    pub fn select(&self, key: CatalogKey) -> bool {
        self.selection.lock().expect("selection poisoned").insert(key)
    }

    /// Unmark a key. Returns `false` if it was not selected.
    pub fn deselect(&self, key: &CatalogKey) -> bool {
        self.selection.lock().expect("selection poisoned").remove(key)
    }

    /// Explicit cancel: drop the whole selection.
    pub fn clear_selection(&self) {
        self.selection.lock().expect("selection poisoned").clear();
    }

    /// Snapshot of the current selection, sorted for determinism.
    pub fn selected(&self) -> Vec<CatalogKey> {
        let mut keys: Vec<CatalogKey> = self
            .selection
            .lock()
            .expect("selection poisoned")
            .iter()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    // =======================================================================
    // Batch delete / edit
    // =======================================================================

    /// Delete every selected key's record and image.
    ///
    /// Image deletions fan out concurrently; a failed one is logged and
    /// reported, not propagated. Records are removed for all selected keys
    /// in one collection save. The selection clears only after the batch
    /// settles, success or not.
    pub async fn delete_selection(&self) -> CatalogResult<DeleteReport> {
        let keys = self.selected();

        let mut tasks = JoinSet::new();
        for key in keys.clone() {
            let blobs = Arc::clone(&self.blobs);
            tasks.spawn(async move {
                let result = blobs.delete(&key).await;
                (key, result)
            });
        }

        let mut failures = Vec::new();
        let mut blob_ok = HashSet::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, Ok(_existed))) => {
                    blob_ok.insert(key);
                }
                Ok((key, Err(e))) => {
                    warn!(key = %key, error = %e, "image delete failed; skipping");
                    failures.push(DeleteFailure {
                        key,
                        error: e.to_string(),
                    });
                }
                Err(e) => warn!(error = %e, "image delete task aborted"),
            }
        }

        // Re-load right before the save; the fan-out above suspended.
        let mut products = self.records.load_products()?;
        for key in &keys {
            products.remove(&key.canonical());
        }
        self.records.save_products(&products)?;

        self.clear_selection();

        let deleted: Vec<CatalogKey> = keys
            .into_iter()
            .filter(|key| blob_ok.contains(key))
            .collect();
        info!(
            deleted = deleted.len(),
            failed = failures.len(),
            "batch delete finished"
        );
        Ok(DeleteReport { deleted, failures })
    }

    /// Apply one patch to every selected record in a single collection
    /// save, then clear the selection. Returns how many records changed.
    ///
    /// A patch that changes the supplier re-keys the record so the
    /// one-record-per-(code, supplier) invariant holds; the new key wins
    /// over any record already there (last write wins).
    pub fn edit_selection(&self, patch: &ProductPatch) -> CatalogResult<usize> {
        let keys = self.selected();
        let mut products = self.records.load_products()?;

        let mut edited = 0;
        for key in &keys {
            let canonical = key.canonical();
            let Some(mut record) = products.remove(&canonical) else {
                continue;
            };
            patch.apply(&mut record);
            products.insert(record.key().canonical(), record);
            edited += 1;
        }

        self.records.save_products(&products)?;
        self.clear_selection();
        info!(edited, "batch edit finished");
        Ok(edited)
    }

    // =======================================================================
    // Queries
    // =======================================================================

    /// Join images with product records and group by supplier.
    ///
    /// Either side of the join may be absent: a pre-staged image shows
    /// without its record, and a record whose image was never staged shows
    /// without one. Entries with no record (or a blank supplier) group
    /// under [`UNCLASSIFIED`]. Group order is the map's; the display layer
    /// may re-sort.
    pub async fn list_by_supplier(&self) -> CatalogResult<BTreeMap<String, Vec<CatalogEntry>>> {
        let products = self.records.load_products()?;
        let blobs = self.blobs.list().await?;

        let mut groups: BTreeMap<String, Vec<CatalogEntry>> = BTreeMap::new();
        let mut joined: HashSet<String> = HashSet::new();

        for blob in blobs {
            let key = blob.key();
            let canonical = key.canonical();
            let product = products.get(&canonical).cloned();
            joined.insert(canonical);
            groups
                .entry(supplier_group(product.as_ref()))
                .or_default()
                .push(CatalogEntry {
                    key,
                    image: Some(blob),
                    product,
                });
        }

        for (canonical, product) in &products {
            if joined.contains(canonical) {
                continue;
            }
            groups
                .entry(supplier_group(Some(product)))
                .or_default()
                .push(CatalogEntry {
                    key: product.key(),
                    image: None,
                    product: Some(product.clone()),
                });
        }

        Ok(groups)
    }

    /// Every supplier's version of one product code, cheapest first.
    pub fn price_versions(&self, code: &str) -> CatalogResult<Vec<ProductRecord>> {
        let products = self.records.load_products()?;
        let mut versions: Vec<ProductRecord> = products
            .into_values()
            .filter(|record| record.code == code)
            .collect();
        versions.sort_by(|a, b| a.price_value().total_cmp(&b.price_value()));
        Ok(versions)
    }

    // =======================================================================
    // Maintenance
    // =======================================================================

    /// Clear the product collection and every stored image. Orders are
    /// kept.
    pub async fn clear_products(&self) -> CatalogResult<()> {
        self.records.save_products(&BTreeMap::new())?;
        self.blobs.delete_all().await?;
        info!("product data cleared");
        Ok(())
    }

    // =======================================================================
    // Display settings
    // =======================================================================

    /// Grid column preference (1..=12).
    pub fn grid_columns(&self) -> CatalogResult<u8> {
        Ok(self.records.grid_columns()?)
    }

    /// Persist the grid column preference.
    pub fn set_grid_columns(&self, columns: u8) -> CatalogResult<()> {
        Ok(self.records.set_grid_columns(columns)?)
    }

    /// Customers whose price is hidden on labels.
    pub fn hide_price_customers(&self) -> CatalogResult<Vec<String>> {
        Ok(self.records.hide_price_customers()?)
    }

    /// Add a customer to the hide-price list. Returns `false` if already
    /// present.
    pub fn add_hide_price_customer(&self, customer: &str) -> CatalogResult<bool> {
        let mut customers = self.records.hide_price_customers()?;
        if customers.iter().any(|c| c == customer) {
            return Ok(false);
        }
        customers.push(customer.to_string());
        self.records.set_hide_price_customers(&customers)?;
        Ok(true)
    }

    /// Remove a customer from the hide-price list. Returns `false` if
    /// absent.
    pub fn remove_hide_price_customer(&self, customer: &str) -> CatalogResult<bool> {
        let mut customers = self.records.hide_price_customers()?;
        let before = customers.len();
        customers.retain(|c| c != customer);
        if customers.len() == before {
            return Ok(false);
        }
        self.records.set_hide_price_customers(&customers)?;
        Ok(true)
    }
}

fn supplier_group(product: Option<&ProductRecord>) -> String {
    match product {
        Some(record) if !record.supplier.is_empty() => record.supplier.clone(),
        _ => UNCLASSIFIED.to_string(),
    }
}

/// Product code = base name before the first `.`.
fn code_from_filename(name: &str) -> Option<&str> {
    let code = name.split('.').next().unwrap_or("").trim();
    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}
