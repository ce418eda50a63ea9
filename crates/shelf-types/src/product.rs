use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::key::CatalogKey;

/// One catalog entry for a (code, supplier) pair.
///
/// All descriptive attributes are optional strings — the host data model is
/// stringly typed (prices arrive as spreadsheet cells), and blank cells are
/// represented as `None` rather than `""`. At most one record exists per
/// key; a later write for the same pair overwrites the earlier one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub code: String,
    pub supplier: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cost: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
    /// Last-write instant.
    pub timestamp: DateTime<Utc>,
}

impl ProductRecord {
    /// Create an empty record for a key, stamped now.
    pub fn new(code: impl Into<String>, supplier: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            supplier: supplier.into(),
            name: None,
            cost: None,
            price: None,
            size: None,
            remark: None,
            timestamp: Utc::now(),
        }
    }

    /// The composite identity of this record.
    pub fn key(&self) -> CatalogKey {
        CatalogKey::new(self.code.clone(), self.supplier.clone())
    }

    /// Numeric unit price; blank or non-numeric parses as 0.
    pub fn price_value(&self) -> f64 {
        money(self.price.as_deref())
    }

    /// Numeric unit cost; blank or non-numeric parses as 0.
    pub fn cost_value(&self) -> f64 {
        money(self.cost.as_deref())
    }
}

/// Lenient money parsing: spreadsheet cells may hold anything.
pub(crate) fn money(field: Option<&str>) -> f64 {
    field
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// A partial product update applied uniformly across a selection.
///
/// `None` fields are left untouched on the target record; `Some` fields
/// replace the target's value (including `Some("")`-style clears, which the
/// caller normalizes to `None` before building the patch).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub supplier: Option<String>,
    pub cost: Option<String>,
    pub price: Option<String>,
    pub size: Option<String>,
    pub remark: Option<String>,
}

impl ProductPatch {
    /// Returns `true` if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.supplier.is_none()
            && self.cost.is_none()
            && self.price.is_none()
            && self.size.is_none()
            && self.remark.is_none()
    }

    /// Apply this patch to a record, preserving unspecified fields and
    /// refreshing the last-write timestamp.
    pub fn apply(&self, record: &mut ProductRecord) {
        if let Some(name) = &self.name {
            record.name = Some(name.clone());
        }
        if let Some(supplier) = &self.supplier {
            record.supplier = supplier.clone();
        }
        if let Some(cost) = &self.cost {
            record.cost = Some(cost.clone());
        }
        if let Some(price) = &self.price {
            record.price = Some(price.clone());
        }
        if let Some(size) = &self.size {
            record.size = Some(size.clone());
        }
        if let Some(remark) = &self.remark {
            record.remark = Some(remark.clone());
        }
        record.timestamp = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_derivation() {
        let record = ProductRecord::new("A1", "S1");
        assert_eq!(record.key(), CatalogKey::new("A1", "S1"));
    }

    #[test]
    fn price_value_parses_number() {
        let mut record = ProductRecord::new("A1", "S1");
        record.price = Some("120".into());
        assert_eq!(record.price_value(), 120.0);
    }

    #[test]
    fn price_value_defaults_to_zero() {
        let mut record = ProductRecord::new("A1", "S1");
        assert_eq!(record.price_value(), 0.0);
        record.price = Some("n/a".into());
        assert_eq!(record.price_value(), 0.0);
    }

    #[test]
    fn patch_overwrites_only_specified_fields() {
        let mut record = ProductRecord::new("A1", "S1");
        record.name = Some("Shoe".into());
        record.price = Some("100".into());

        let patch = ProductPatch {
            price: Some("120".into()),
            ..Default::default()
        };
        patch.apply(&mut record);

        assert_eq!(record.name.as_deref(), Some("Shoe"));
        assert_eq!(record.price.as_deref(), Some("120"));
        assert_eq!(record.supplier, "S1");
    }

    #[test]
    fn patch_refreshes_timestamp() {
        let mut record = ProductRecord::new("A1", "S1");
        let before = record.timestamp;
        let patch = ProductPatch {
            name: Some("Boot".into()),
            ..Default::default()
        };
        patch.apply(&mut record);
        assert!(record.timestamp >= before);
    }

    #[test]
    fn empty_patch_is_empty() {
        assert!(ProductPatch::default().is_empty());
        let patch = ProductPatch {
            size: Some("40".into()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn serde_skips_nothing_but_tolerates_missing_fields() {
        // A record persisted by an older build may lack optional columns.
        let json = r#"{"code":"A1","supplier":"S1","timestamp":"2026-01-05T00:00:00Z"}"#;
        let record: ProductRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.code, "A1");
        assert!(record.name.is_none());
    }
}
