use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Composite identity for a catalog item: product code × supplier.
///
/// A `CatalogKey` is a proper value type — equality, hashing, and ordering
/// operate on the two fields, never on a joined string, so a code or
/// supplier that itself contains the separator cannot collide with another
/// key. The joined form exists only at the storage boundary via
/// [`CatalogKey::canonical`] and is never parsed back.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CatalogKey {
    code: String,
    supplier: String,
}

impl CatalogKey {
    /// Create a key from a product code and supplier name.
    ///
    /// The supplier may be empty: images staged before their supplier is
    /// known are keyed as `(code, "")`.
    pub fn new(code: impl Into<String>, supplier: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            supplier: supplier.into(),
        }
    }

    /// The product code component.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The supplier component.
    pub fn supplier(&self) -> &str {
        &self.supplier
    }

    /// Canonical `{code}_{supplier}` form used as the persisted entry name.
    ///
    /// This matches the layout the host key-value stores have always used;
    /// it is write-only — keys are never reconstructed from it.
    pub fn canonical(&self) -> String {
        format!("{}_{}", self.code, self.supplier)
    }

    /// Parse a `CODE:SUPPLIER` spec as typed on a command line.
    ///
    /// Splits on the first `:`; the supplier part may be empty. An empty
    /// code is rejected.
    pub fn parse_spec(spec: &str) -> Result<Self, TypeError> {
        let (code, supplier) = match spec.split_once(':') {
            Some((c, s)) => (c, s),
            None => (spec, ""),
        };
        if code.is_empty() {
            return Err(TypeError::InvalidKeySpec(spec.to_string()));
        }
        Ok(Self::new(code, supplier))
    }
}

impl fmt::Debug for CatalogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CatalogKey({}:{})", self.code, self.supplier)
    }
}

impl fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_joins_with_underscore() {
        let key = CatalogKey::new("A1", "S1");
        assert_eq!(key.canonical(), "A1_S1");
    }

    #[test]
    fn canonical_with_empty_supplier() {
        let key = CatalogKey::new("A1", "");
        assert_eq!(key.canonical(), "A1_");
    }

    #[test]
    fn equality_is_field_wise() {
        // "A_1" + "S" and "A" + "1_S" share a canonical form but are
        // distinct keys.
        let a = CatalogKey::new("A_1", "S");
        let b = CatalogKey::new("A", "1_S");
        assert_eq!(a.canonical(), b.canonical());
        assert_ne!(a, b);
    }

    #[test]
    fn parse_spec_with_supplier() {
        let key = CatalogKey::parse_spec("A1:S1").unwrap();
        assert_eq!(key.code(), "A1");
        assert_eq!(key.supplier(), "S1");
    }

    #[test]
    fn parse_spec_without_supplier() {
        let key = CatalogKey::parse_spec("A1").unwrap();
        assert_eq!(key.code(), "A1");
        assert_eq!(key.supplier(), "");
    }

    #[test]
    fn parse_spec_rejects_empty_code() {
        assert!(CatalogKey::parse_spec(":S1").is_err());
        assert!(CatalogKey::parse_spec("").is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let key = CatalogKey::new("A1", "S1");
        let json = serde_json::to_string(&key).unwrap();
        let parsed: CatalogKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn ordering_by_code_then_supplier() {
        let a = CatalogKey::new("A1", "S2");
        let b = CatalogKey::new("A2", "S1");
        assert!(a < b);
    }
}
