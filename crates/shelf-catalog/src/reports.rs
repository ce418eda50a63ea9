use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use shelf_types::{CatalogKey, OrderRecord};

use crate::error::CatalogResult;
use crate::orders::order_in_day;
use crate::service::CatalogService;

/// Supplier label for orders with no supplier recorded.
pub const UNKNOWN_SUPPLIER: &str = "unknown";

/// One line of the daily order sheet, in its fixed column order.
/// Money columns are rounded to whole units, matching the exported books.
#[derive(Clone, Debug, PartialEq)]
pub struct DailyOrderRow {
    pub customer: String,
    pub code: String,
    pub name: String,
    pub size: String,
    pub unit_price: i64,
    pub unit_cost: i64,
    pub quantity: u32,
    pub amount: i64,
    pub profit: i64,
    pub supplier: String,
    pub timestamp: DateTime<Utc>,
    pub remark: String,
}

impl DailyOrderRow {
    fn from_order(order: &OrderRecord) -> Self {
        Self {
            customer: order.customer.clone().unwrap_or_default(),
            code: order.code.clone(),
            name: order.name.clone().unwrap_or_default(),
            size: order.size.clone().unwrap_or_default(),
            unit_price: order.unit_price().round() as i64,
            unit_cost: order.unit_cost().round() as i64,
            quantity: order.quantity,
            amount: order.amount().round() as i64,
            profit: order.profit().round() as i64,
            supplier: order.supplier.clone().unwrap_or_default(),
            timestamp: order.timestamp,
            remark: order.remark.clone().unwrap_or_default(),
        }
    }
}

/// Per-supplier aggregate for one day.
#[derive(Clone, Debug, PartialEq)]
pub struct SupplierStatsRow {
    pub supplier: String,
    pub order_count: u32,
    pub total_quantity: u64,
    pub total_amount: f64,
    pub total_cost: f64,
    pub gross_profit: f64,
    /// Gross profit over amount, as a percentage; 0 when amount is 0.
    pub profit_rate: f64,
}

/// The five alternate sort views of the supplier statistics sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatsView {
    TotalCost,
    Supplier,
    TotalQuantity,
    TotalAmount,
    ProfitRate,
}

impl StatsView {
    /// Every view, in the exported sheet order.
    pub fn all() -> [StatsView; 5] {
        [
            StatsView::TotalCost,
            StatsView::Supplier,
            StatsView::TotalQuantity,
            StatsView::TotalAmount,
            StatsView::ProfitRate,
        ]
    }

    /// Sheet title for this view.
    pub fn label(self) -> &'static str {
        match self {
            StatsView::TotalCost => "by total cost",
            StatsView::Supplier => "by supplier",
            StatsView::TotalQuantity => "by total quantity",
            StatsView::TotalAmount => "by total amount",
            StatsView::ProfitRate => "by profit rate",
        }
    }
}

/// Supplier statistics for one day: aggregate rows, grand totals, and the
/// per-supplier order detail behind them.
#[derive(Clone, Debug)]
pub struct SupplierStatsReport {
    /// One row per supplier, in supplier order.
    pub rows: Vec<SupplierStatsRow>,
    pub totals: SupplierStatsRow,
    /// The orders behind each supplier's row.
    pub details: BTreeMap<String, Vec<DailyOrderRow>>,
}

impl SupplierStatsReport {
    /// The rows re-sorted for one of the five views: numeric views sort
    /// descending, the supplier view ascending by name.
    pub fn sorted(&self, view: StatsView) -> Vec<SupplierStatsRow> {
        let mut rows = self.rows.clone();
        match view {
            StatsView::Supplier => rows.sort_by(|a, b| a.supplier.cmp(&b.supplier)),
            StatsView::TotalCost => {
                rows.sort_by(|a, b| b.total_cost.total_cmp(&a.total_cost))
            }
            StatsView::TotalQuantity => {
                rows.sort_by(|a, b| b.total_quantity.cmp(&a.total_quantity))
            }
            StatsView::TotalAmount => {
                rows.sort_by(|a, b| b.total_amount.total_cmp(&a.total_amount))
            }
            StatsView::ProfitRate => {
                rows.sort_by(|a, b| b.profit_rate.total_cmp(&a.profit_rate))
            }
        }
        rows
    }
}

/// One product on a supplier's reorder sheet: how many of each size to
/// bring in, plus the stored photo when there is one.
#[derive(Clone, Debug)]
pub struct ReorderLine {
    pub code: String,
    pub name: String,
    /// Size → quantity, numerically ordered where sizes parse as numbers.
    pub sizes: Vec<(String, u32)>,
    pub total: u32,
    pub image: Option<Vec<u8>>,
}

/// One supplier's section of the reorder report.
#[derive(Clone, Debug)]
pub struct SupplierReorder {
    pub supplier: String,
    pub lines: Vec<ReorderLine>,
}

/// One row of the raw catalog dump, in its fixed column order.
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogRow {
    pub code: String,
    pub name: String,
    pub supplier: String,
    pub cost: String,
    pub price: String,
    pub size: String,
    pub remark: String,
    pub updated: DateTime<Utc>,
}

/// One printed label: orders expand to one entry per unit.
#[derive(Clone, Debug)]
pub struct LabelRow {
    pub image: Option<Vec<u8>>,
    pub customer: String,
    pub code: String,
    pub size: String,
    /// `None` when the customer is on the hide-price list.
    pub unit_price: Option<String>,
    pub remark: String,
}

impl CatalogService {
    /// The daily order sheet for one UTC day.
    pub fn daily_orders(&self, day: NaiveDate) -> CatalogResult<Vec<DailyOrderRow>> {
        Ok(self
            .orders_for_day(day)?
            .iter()
            .map(DailyOrderRow::from_order)
            .collect())
    }

    /// Per-supplier statistics for one UTC day.
    pub fn supplier_stats(&self, day: NaiveDate) -> CatalogResult<SupplierStatsReport> {
        let orders = self.orders_for_day(day)?;

        let mut grouped: BTreeMap<String, Vec<&OrderRecord>> = BTreeMap::new();
        for order in &orders {
            let supplier = order
                .supplier
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| UNKNOWN_SUPPLIER.to_string());
            grouped.entry(supplier).or_default().push(order);
        }

        let mut rows = Vec::with_capacity(grouped.len());
        let mut details = BTreeMap::new();
        for (supplier, group) in &grouped {
            let total_amount: f64 = group.iter().map(|o| o.amount()).sum();
            let total_cost: f64 = group
                .iter()
                .map(|o| o.quantity as f64 * o.unit_cost())
                .sum();
            rows.push(stats_row(
                supplier.clone(),
                group.len() as u32,
                group.iter().map(|o| o.quantity as u64).sum(),
                total_amount,
                total_cost,
            ));
            details.insert(
                supplier.clone(),
                group.iter().copied().map(DailyOrderRow::from_order).collect(),
            );
        }

        let totals = stats_row(
            "total".to_string(),
            rows.iter().map(|r| r.order_count).sum(),
            rows.iter().map(|r| r.total_quantity).sum(),
            rows.iter().map(|r| r.total_amount).sum(),
            rows.iter().map(|r| r.total_cost).sum(),
        );

        Ok(SupplierStatsReport {
            rows,
            totals,
            details,
        })
    }

    /// Per-supplier reorder sheets for one UTC day: each ordered product
    /// with its per-size tally and stored photo.
    pub async fn reorder_sheets(&self, day: NaiveDate) -> CatalogResult<Vec<SupplierReorder>> {
        let orders = self.orders_for_day(day)?;

        // supplier → code → (name, raw supplier, size → quantity)
        type Tally = BTreeMap<String, (String, String, BTreeMap<String, u32>)>;
        let mut grouped: BTreeMap<String, Tally> = BTreeMap::new();
        for order in &orders {
            let raw_supplier = order.supplier.clone().unwrap_or_default();
            let label = if raw_supplier.is_empty() {
                UNKNOWN_SUPPLIER.to_string()
            } else {
                raw_supplier.clone()
            };
            let per_code = grouped.entry(label).or_default();
            let entry = per_code.entry(order.code.clone()).or_insert_with(|| {
                (
                    order.name.clone().unwrap_or_default(),
                    raw_supplier.clone(),
                    BTreeMap::new(),
                )
            });
            let size = order.size.clone().unwrap_or_else(|| "-".to_string());
            *entry.2.entry(size).or_insert(0) += order.quantity;
        }

        let mut sheets = Vec::with_capacity(grouped.len());
        for (supplier, per_code) in grouped {
            let mut lines = Vec::with_capacity(per_code.len());
            for (code, (name, raw_supplier, tally)) in per_code {
                let image = self
                    .blobs
                    .get(&CatalogKey::new(code.clone(), raw_supplier))
                    .await?
                    .map(|blob| blob.bytes);

                let mut sizes: Vec<(String, u32)> = tally.into_iter().collect();
                sizes.sort_by(|a, b| size_order(&a.0, &b.0));
                let total = sizes.iter().map(|(_, q)| q).sum();

                lines.push(ReorderLine {
                    code,
                    name,
                    sizes,
                    total,
                    image,
                });
            }
            sheets.push(SupplierReorder { supplier, lines });
        }
        Ok(sheets)
    }

    /// The raw catalog dump, in key order.
    pub fn catalog_rows(&self) -> CatalogResult<Vec<CatalogRow>> {
        let products = self.records.load_products()?;
        Ok(products
            .into_values()
            .map(|record| CatalogRow {
                code: record.code.clone(),
                name: record.name.clone().unwrap_or_default(),
                supplier: record.supplier.clone(),
                cost: record.cost.clone().unwrap_or_default(),
                price: record.price.clone().unwrap_or_default(),
                size: record.size.clone().unwrap_or_default(),
                remark: record.remark.clone().unwrap_or_default(),
                updated: record.timestamp,
            })
            .collect())
    }

    /// Label entries for one UTC day, one per ordered unit. Prices are
    /// suppressed for customers on the hide-price list.
    pub async fn label_rows(&self, day: NaiveDate) -> CatalogResult<Vec<LabelRow>> {
        let orders = self.orders_for_day(day)?;
        let hidden = self.records.hide_price_customers()?;

        let mut labels = Vec::new();
        for order in &orders {
            let key = CatalogKey::new(
                order.code.clone(),
                order.supplier.clone().unwrap_or_default(),
            );
            let image = self.blobs.get(&key).await?.map(|blob| blob.bytes);

            let customer = order.customer.clone().unwrap_or_default();
            let unit_price = if hidden.iter().any(|c| *c == customer) {
                None
            } else {
                Some(order.price.clone().unwrap_or_default())
            };

            for _ in 0..order.quantity {
                labels.push(LabelRow {
                    image: image.clone(),
                    customer: customer.clone(),
                    code: order.code.clone(),
                    size: order.size.clone().unwrap_or_default(),
                    unit_price: unit_price.clone(),
                    remark: order.remark.clone().unwrap_or_default(),
                });
            }
        }
        Ok(labels)
    }
}

fn stats_row(
    supplier: String,
    order_count: u32,
    total_quantity: u64,
    total_amount: f64,
    total_cost: f64,
) -> SupplierStatsRow {
    let gross_profit = total_amount - total_cost;
    let profit_rate = if total_amount == 0.0 {
        0.0
    } else {
        gross_profit / total_amount * 100.0
    };
    SupplierStatsRow {
        supplier,
        order_count,
        total_quantity,
        total_amount,
        total_cost,
        gross_profit,
        profit_rate,
    }
}

/// Sizes sort numerically when both parse as numbers ("9.5" before "10"),
/// lexically otherwise.
fn size_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        _ => a.cmp(b),
    }
}
