use chrono::NaiveDate;
use tracing::info;

use shelf_types::{OrderDraft, OrderId, OrderRecord};

use crate::error::CatalogResult;
use crate::service::CatalogService;

/// Orders live on UTC days; the clear/report windows are `[midnight,
/// next midnight)`.
pub(crate) fn order_in_day(order: &OrderRecord, day: NaiveDate) -> bool {
    order.timestamp.date_naive() == day
}

impl CatalogService {
    /// Create an order, or edit one in place when the draft targets an
    /// existing id. Either way the record is re-stamped now.
    pub fn save_order(&self, draft: OrderDraft) -> CatalogResult<OrderRecord> {
        let id = draft
            .id
            .clone()
            .unwrap_or_else(|| self.order_clock.next());
        let record = draft.into_record(id);

        let mut orders = self.records.load_orders()?;
        orders.insert(record.id.as_str().to_string(), record.clone());
        self.records.save_orders(&orders)?;

        info!(id = %record.id, code = %record.code, "order saved");
        Ok(record)
    }

    /// Delete one order. Returns `true` if it existed.
    pub fn delete_order(&self, id: &OrderId) -> CatalogResult<bool> {
        let mut orders = self.records.load_orders()?;
        let existed = orders.remove(id.as_str()).is_some();
        if existed {
            self.records.save_orders(&orders)?;
            info!(id = %id, "order deleted");
        }
        Ok(existed)
    }

    /// All orders placed on the given UTC day, in id (issue) order.
    pub fn orders_for_day(&self, day: NaiveDate) -> CatalogResult<Vec<OrderRecord>> {
        let orders = self.records.load_orders()?;
        Ok(orders
            .into_values()
            .filter(|order| order_in_day(order, day))
            .collect())
    }

    /// The newest orders, optionally restricted to one operator.
    pub fn recent_orders(
        &self,
        limit: usize,
        username: Option<&str>,
    ) -> CatalogResult<Vec<OrderRecord>> {
        let orders = self.records.load_orders()?;
        let mut recent: Vec<OrderRecord> = orders
            .into_values()
            .filter(|order| match username {
                Some(name) => order.username.as_deref() == Some(name),
                None => true,
            })
            .collect();
        recent.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.id.cmp(&a.id))
        });
        recent.truncate(limit);
        Ok(recent)
    }

    /// Remove every order placed on the given UTC day, keeping all other
    /// days. Returns how many were removed.
    pub fn clear_orders_for_day(&self, day: NaiveDate) -> CatalogResult<usize> {
        let mut orders = self.records.load_orders()?;
        let before = orders.len();
        orders.retain(|_, order| !order_in_day(order, day));
        let removed = before - orders.len();
        self.records.save_orders(&orders)?;
        info!(%day, removed, "orders cleared for day");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use shelf_store::{MemoryBlobStore, MemoryKv, RecordStore};

    fn service() -> CatalogService {
        CatalogService::open(
            RecordStore::new(Arc::new(MemoryKv::new())),
            Arc::new(MemoryBlobStore::new()),
        )
    }

    fn draft(code: &str) -> OrderDraft {
        OrderDraft {
            code: code.into(),
            price: Some("100".into()),
            cost: Some("60".into()),
            quantity: Some(2),
            ..Default::default()
        }
    }

    /// Seed an order with an explicit timestamp, bypassing the clock.
    fn seed_order_at(service: &CatalogService, id: &str, code: &str, at: chrono::DateTime<Utc>) {
        let mut orders = service.records.load_orders().unwrap();
        let mut record = draft(code).into_record(OrderId::from_token(id));
        record.timestamp = at;
        orders.insert(id.to_string(), record);
        service.records.save_orders(&orders).unwrap();
    }

    #[test]
    fn create_assigns_fresh_increasing_ids() {
        let service = service();
        let first = service.save_order(draft("A1")).unwrap();
        let second = service.save_order(draft("A2")).unwrap();

        let a: u64 = first.id.as_str().parse().unwrap();
        let b: u64 = second.id.as_str().parse().unwrap();
        assert!(a < b);
        assert_eq!(service.records.load_orders().unwrap().len(), 2);
    }

    #[test]
    fn edit_targets_the_same_id() {
        let service = service();
        let created = service.save_order(draft("A1")).unwrap();

        let mut edit = draft("A1");
        edit.id = Some(created.id.clone());
        edit.price = Some("130".into());
        let edited = service.save_order(edit).unwrap();

        assert_eq!(edited.id, created.id);
        let orders = service.records.load_orders().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[created.id.as_str()].price.as_deref(), Some("130"));
    }

    #[test]
    fn delete_reports_existence() {
        let service = service();
        let created = service.save_order(draft("A1")).unwrap();
        assert!(service.delete_order(&created.id).unwrap());
        assert!(!service.delete_order(&created.id).unwrap());
    }

    #[test]
    fn day_window_filters_orders() {
        let service = service();
        let jan5 = Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap();
        let jan6 = Utc.with_ymd_and_hms(2026, 1, 6, 0, 0, 0).unwrap();
        seed_order_at(&service, "1", "A1", jan5);
        seed_order_at(&service, "2", "A2", jan6);

        let day = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let orders = service.orders_for_day(day).unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].code, "A1");
    }

    #[test]
    fn clear_day_keeps_other_days() {
        let service = service();
        let jan5 = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let jan5_late = Utc.with_ymd_and_hms(2026, 1, 5, 23, 59, 59).unwrap();
        let jan6 = Utc.with_ymd_and_hms(2026, 1, 6, 9, 0, 0).unwrap();
        seed_order_at(&service, "1", "A1", jan5);
        seed_order_at(&service, "2", "A2", jan5_late);
        seed_order_at(&service, "3", "A3", jan6);

        let day = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let removed = service.clear_orders_for_day(day).unwrap();
        assert_eq!(removed, 2);

        let remaining = service.records.load_orders().unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining.contains_key("3"));
    }

    #[test]
    fn recent_orders_filters_by_username_and_limit() {
        let service = service();
        for i in 0..5 {
            let mut d = draft("A1");
            d.username = Some(if i % 2 == 0 { "amy" } else { "bo" }.into());
            service.save_order(d).unwrap();
        }

        let amy = service.recent_orders(10, Some("amy")).unwrap();
        assert_eq!(amy.len(), 3);
        assert!(amy.iter().all(|o| o.username.as_deref() == Some("amy")));

        let latest = service.recent_orders(2, None).unwrap();
        assert_eq!(latest.len(), 2);
        assert!(latest[0].id > latest[1].id);
    }
}
