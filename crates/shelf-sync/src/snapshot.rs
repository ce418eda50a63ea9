use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shelf_types::{OrderRecord, ProductRecord};

/// Serialized state of both record collections at one instant.
///
/// This is the unit the bridge pushes and receives; image blobs are not
/// part of the synchronized state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub products: BTreeMap<String, ProductRecord>,
    pub orders: BTreeMap<String, OrderRecord>,
    /// When this snapshot was taken on its origin peer.
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    /// Snapshot the given collections, stamped now.
    pub fn new(
        products: BTreeMap<String, ProductRecord>,
        orders: BTreeMap<String, OrderRecord>,
    ) -> Self {
        Self {
            products,
            orders,
            timestamp: Utc::now(),
        }
    }

    /// Total number of documents across both collections.
    pub fn document_count(&self) -> usize {
        self.products.len() + self.orders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_types::{OrderDraft, OrderId};

    #[test]
    fn serde_roundtrip() {
        let mut products = BTreeMap::new();
        let record = ProductRecord::new("A1", "S1");
        products.insert(record.key().canonical(), record);

        let mut orders = BTreeMap::new();
        let order = OrderDraft {
            code: "A1".into(),
            ..Default::default()
        }
        .into_record(OrderId::from_token("1736000000000"));
        orders.insert(order.id.as_str().to_string(), order);

        let snapshot = Snapshot::new(products, orders);
        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, parsed);
        assert_eq!(parsed.document_count(), 2);
    }
}
