use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use shelf_types::{OrderRecord, ProductRecord};

use crate::error::{StoreError, StoreResult};
use crate::kv::KvBackend;

/// The two logical document collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collection {
    Products,
    Orders,
}

impl Collection {
    /// Well-known entry name in the host key-value store.
    pub fn entry_name(self) -> &'static str {
        match self {
            Collection::Products => "productData",
            Collection::Orders => "orderData",
        }
    }
}

const GRID_COLUMNS_ENTRY: &str = "gridColumns";
const HIDE_PRICE_ENTRY: &str = "hidePriceCustomers";

const GRID_COLUMNS_DEFAULT: u8 = 6;
const GRID_COLUMNS_MAX: u8 = 12;

/// JSON-document store for product and order collections.
///
/// Each collection is persisted as a single serialized mapping under its
/// well-known entry name. Loads never fail on bad state: an absent entry
/// yields an empty map, and an unparsable one is logged and degraded to
/// empty. Saves replace the whole document; there is no partial patch at
/// the storage boundary, so callers re-load immediately before each save.
#[derive(Clone)]
pub struct RecordStore {
    kv: Arc<dyn KvBackend>,
}

impl RecordStore {
    /// Create a record store over the given backend.
    pub fn new(kv: Arc<dyn KvBackend>) -> Self {
        Self { kv }
    }

    // ---- Collections ----

    /// Load the product collection, keyed by canonical `code_supplier`.
    pub fn load_products(&self) -> StoreResult<BTreeMap<String, ProductRecord>> {
        self.load_map(Collection::Products)
    }

    /// Replace the product collection.
    pub fn save_products(&self, products: &BTreeMap<String, ProductRecord>) -> StoreResult<()> {
        self.save_map(Collection::Products, products)
    }

    /// Load the order collection, keyed by order-id token.
    pub fn load_orders(&self) -> StoreResult<BTreeMap<String, OrderRecord>> {
        self.load_map(Collection::Orders)
    }

    /// Replace the order collection.
    pub fn save_orders(&self, orders: &BTreeMap<String, OrderRecord>) -> StoreResult<()> {
        self.save_map(Collection::Orders, orders)
    }

    fn load_map<T: DeserializeOwned>(
        &self,
        collection: Collection,
    ) -> StoreResult<BTreeMap<String, T>> {
        let entry = collection.entry_name();
        let Some(raw) = self.kv.get(entry)? else {
            return Ok(BTreeMap::new());
        };
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                // Corrupt state is recoverable: start from an empty
                // collection rather than wedging every caller.
                let corrupt = StoreError::CorruptState {
                    entry: entry.to_string(),
                    reason: e.to_string(),
                };
                warn!(entry, error = %corrupt, "unparsable collection; degrading to empty");
                Ok(BTreeMap::new())
            }
        }
    }

    fn save_map<T: Serialize>(
        &self,
        collection: Collection,
        map: &BTreeMap<String, T>,
    ) -> StoreResult<()> {
        let entry = collection.entry_name();
        let raw = serde_json::to_string(map)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.kv.set(entry, &raw)?;
        debug!(entry, documents = map.len(), "collection saved");
        Ok(())
    }

    // ---- Auxiliary settings ----

    /// Preferred grid column count for the display layer (1..=12).
    pub fn grid_columns(&self) -> StoreResult<u8> {
        let Some(raw) = self.kv.get(GRID_COLUMNS_ENTRY)? else {
            return Ok(GRID_COLUMNS_DEFAULT);
        };
        Ok(raw
            .trim()
            .parse::<u8>()
            .map(|n| n.clamp(1, GRID_COLUMNS_MAX))
            .unwrap_or(GRID_COLUMNS_DEFAULT))
    }

    /// Persist the grid column count, clamped to 1..=12.
    pub fn set_grid_columns(&self, columns: u8) -> StoreResult<()> {
        let clamped = columns.clamp(1, GRID_COLUMNS_MAX);
        self.kv.set(GRID_COLUMNS_ENTRY, &clamped.to_string())
    }

    /// Customers whose unit price is suppressed on printed labels.
    pub fn hide_price_customers(&self) -> StoreResult<Vec<String>> {
        let Some(raw) = self.kv.get(HIDE_PRICE_ENTRY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(list) => Ok(list),
            Err(e) => {
                warn!(entry = HIDE_PRICE_ENTRY, error = %e, "unparsable list; degrading to empty");
                Ok(Vec::new())
            }
        }
    }

    /// Replace the hide-price customer list.
    pub fn set_hide_price_customers(&self, customers: &[String]) -> StoreResult<()> {
        let raw = serde_json::to_string(customers)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.kv.set(HIDE_PRICE_ENTRY, &raw)
    }
}
