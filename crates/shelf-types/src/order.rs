use std::fmt;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of an order line.
///
/// Fresh ids are millisecond-timestamp tokens issued by an [`OrderClock`];
/// editing an existing order reuses its token. Tokens are plain decimal
/// strings, so lexicographic order of equal-length tokens matches issue
/// order.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Wrap an existing token (edit target or persisted id).
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderId({})", self.0)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic issuer of fresh [`OrderId`] tokens.
///
/// Wall-clock milliseconds alone can collide when two orders are placed in
/// the same millisecond; the clock therefore never re-issues or goes
/// backwards — a same-millisecond issue is bumped to `last + 1`.
pub struct OrderClock {
    last_ms: Mutex<u64>,
}

impl OrderClock {
    pub fn new() -> Self {
        Self {
            last_ms: Mutex::new(0),
        }
    }

    /// Issue the next order id, strictly greater than any previous one
    /// from this clock.
    pub fn next(&self) -> OrderId {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let mut last = self.last_ms.lock().expect("order clock poisoned");
        let ms = wall.max(*last + 1);
        *last = ms;
        OrderId(ms.to_string())
    }
}

impl Default for OrderClock {
    fn default() -> Self {
        Self::new()
    }
}

fn default_quantity() -> u32 {
    1
}

/// A placed order line.
///
/// Created on submit, mutated in place on edit (same id), deleted
/// explicitly. Orders are never auto-expired except by the explicit
/// clear-day operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub cost: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub remark: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Owner tag: the operator who placed the order, when known.
    #[serde(default)]
    pub username: Option<String>,
}

impl OrderRecord {
    /// Numeric unit price; blank or non-numeric parses as 0.
    pub fn unit_price(&self) -> f64 {
        crate::product::money(self.price.as_deref())
    }

    /// Numeric unit cost; blank or non-numeric parses as 0.
    pub fn unit_cost(&self) -> f64 {
        crate::product::money(self.cost.as_deref())
    }

    /// Line amount: quantity × unit price.
    pub fn amount(&self) -> f64 {
        self.quantity as f64 * self.unit_price()
    }

    /// Line gross profit: quantity × (price − cost).
    pub fn profit(&self) -> f64 {
        self.quantity as f64 * (self.unit_price() - self.unit_cost())
    }
}

/// Input for creating or editing an order.
///
/// `id: None` means "create with a fresh token"; `Some(id)` targets an
/// existing order for an in-place edit.
#[derive(Clone, Debug, Default)]
pub struct OrderDraft {
    pub id: Option<OrderId>,
    pub code: String,
    pub name: Option<String>,
    pub supplier: Option<String>,
    pub cost: Option<String>,
    pub price: Option<String>,
    pub customer: Option<String>,
    pub size: Option<String>,
    /// Defaults to 1 when unset.
    pub quantity: Option<u32>,
    pub remark: Option<String>,
    pub username: Option<String>,
}

impl OrderDraft {
    /// Materialize the draft into a record with the given id, stamped now.
    pub fn into_record(self, id: OrderId) -> OrderRecord {
        OrderRecord {
            id,
            code: self.code,
            name: self.name,
            supplier: self.supplier,
            cost: self.cost,
            price: self.price,
            customer: self.customer,
            size: self.size,
            quantity: self.quantity.unwrap_or(1).max(1),
            remark: self.remark,
            timestamp: Utc::now(),
            username: self.username,
        }
    }
}
