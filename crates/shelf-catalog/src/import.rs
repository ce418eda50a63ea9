use std::collections::BTreeMap;

use tracing::{debug, info};

use shelf_media::placeholder_jpeg;
use shelf_store::ImageBlob;
use shelf_types::ProductRecord;

use crate::error::{CatalogError, CatalogResult};
use crate::service::CatalogService;

/// Header names of the import table. The upstream spreadsheets use the
/// Chinese column names; they are the wire format, not display strings.
pub mod columns {
    /// Product code.
    pub const CODE: &str = "商品编码";
    /// Product name.
    pub const NAME: &str = "商品名称";
    /// Supplier.
    pub const SUPPLIER: &str = "供应商";
    /// Unit cost.
    pub const COST: &str = "成本";
    /// Unit price.
    pub const PRICE: &str = "单价";
    /// Size.
    pub const SIZE: &str = "尺码";
    /// Remark (optional).
    pub const REMARK: &str = "备注";

    /// Columns the header row must contain.
    pub const REQUIRED: [&str; 6] = [CODE, NAME, SUPPLIER, COST, PRICE, SIZE];
}

/// Outcome of a table import.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Rows upserted as product records.
    pub imported: usize,
    /// Data rows skipped for a blank product code.
    pub skipped: usize,
}

impl CatalogService {
    /// Import product rows parsed from a tabular file.
    ///
    /// Fail-fast on the header: if the first row lacks any required
    /// column, the whole import aborts with [`CatalogError::SchemaMismatch`]
    /// and no row is applied. A malformed *data* row (blank code) is
    /// skipped, not fatal. Valid rows upsert their product record —
    /// re-importing the same table is idempotent — and stage a placeholder
    /// image for keys that have none yet.
    pub async fn import_rows(
        &self,
        rows: &[BTreeMap<String, String>],
    ) -> CatalogResult<ImportReport> {
        let Some(first) = rows.first() else {
            return Err(CatalogError::EmptyImport);
        };

        let missing: Vec<String> = columns::REQUIRED
            .iter()
            .filter(|column| !first.contains_key(**column))
            .map(|column| column.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(CatalogError::SchemaMismatch { missing });
        }

        let mut report = ImportReport::default();
        let mut upserts: Vec<ProductRecord> = Vec::new();

        for row in rows {
            let code = field(row, columns::CODE);
            let Some(code) = code else {
                report.skipped += 1;
                debug!("skipping row with blank product code");
                continue;
            };
            let supplier = field(row, columns::SUPPLIER).unwrap_or_default();

            let mut record = ProductRecord::new(code, supplier);
            record.name = field(row, columns::NAME);
            record.cost = field(row, columns::COST);
            record.price = field(row, columns::PRICE);
            record.size = field(row, columns::SIZE);
            record.remark = field(row, columns::REMARK);
            upserts.push(record);
        }

        // Stage a placeholder image for any key that has none. This is the
        // only suspension in the import, so the collection save below sees
        // a freshly loaded map.
        let placeholder = placeholder_jpeg()?;
        for record in &upserts {
            let key = record.key();
            if !self.blobs.exists(&key).await? {
                self.blobs
                    .put(ImageBlob::new(&key, "jpeg", placeholder.clone()))
                    .await?;
            }
        }

        let mut products = self.records.load_products()?;
        for record in upserts {
            products.insert(record.key().canonical(), record);
            report.imported += 1;
        }
        self.records.save_products(&products)?;

        info!(
            imported = report.imported,
            skipped = report.skipped,
            "table import finished"
        );
        Ok(report)
    }
}

/// A trimmed, non-empty cell; blank cells become `None`.
fn field(row: &BTreeMap<String, String>, column: &str) -> Option<String> {
    let value = row.get(column)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use shelf_store::{BlobStore, MemoryBlobStore, MemoryKv, RecordStore};
    use shelf_types::CatalogKey;

    use crate::service::UploadFile;

    fn service() -> CatalogService {
        CatalogService::open(
            RecordStore::new(Arc::new(MemoryKv::new())),
            Arc::new(MemoryBlobStore::new()),
        )
    }

    fn row(code: &str, name: &str, supplier: &str, cost: &str, price: &str, size: &str) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(columns::CODE.to_string(), code.to_string());
        map.insert(columns::NAME.to_string(), name.to_string());
        map.insert(columns::SUPPLIER.to_string(), supplier.to_string());
        map.insert(columns::COST.to_string(), cost.to_string());
        map.insert(columns::PRICE.to_string(), price.to_string());
        map.insert(columns::SIZE.to_string(), size.to_string());
        map
    }

    #[tokio::test]
    async fn import_upserts_records_and_stages_placeholders() {
        let service = service();
        let report = service
            .import_rows(&[row("A1", "Shoe", "S1", "50", "100", "40")])
            .await
            .unwrap();

        assert_eq!(report, ImportReport { imported: 1, skipped: 0 });

        let products = service.records.load_products().unwrap();
        let record = &products["A1_S1"];
        assert_eq!(record.name.as_deref(), Some("Shoe"));
        assert_eq!(record.price.as_deref(), Some("100"));

        // A placeholder image was staged for the new key.
        assert!(service
            .blobs
            .exists(&CatalogKey::new("A1", "S1"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn reimport_is_idempotent() {
        let service = service();
        let rows = vec![
            row("A1", "Shoe", "S1", "50", "100", "40"),
            row("A2", "Boot", "S1", "70", "140", "42"),
        ];
        service.import_rows(&rows).await.unwrap();
        service.import_rows(&rows).await.unwrap();

        let products = service.records.load_products().unwrap();
        assert_eq!(products.len(), 2);
    }

    #[tokio::test]
    async fn reimport_with_new_price_overwrites() {
        let service = service();
        service
            .import_rows(&[row("A1", "Shoe", "S1", "50", "100", "40")])
            .await
            .unwrap();
        service
            .import_rows(&[row("A1", "Shoe", "S1", "50", "120", "40")])
            .await
            .unwrap();

        let products = service.records.load_products().unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products["A1_S1"].price.as_deref(), Some("120"));
    }

    #[tokio::test]
    async fn missing_required_column_aborts_everything() {
        let service = service();
        let mut bad = row("A1", "Shoe", "S1", "50", "100", "40");
        bad.remove(columns::SIZE);

        let err = service
            .import_rows(&[bad, row("A2", "Boot", "S1", "70", "140", "42")])
            .await
            .unwrap_err();
        match err {
            CatalogError::SchemaMismatch { missing } => {
                assert_eq!(missing, vec![columns::SIZE.to_string()]);
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }

        // Fail-fast: nothing was applied.
        assert!(service.records.load_products().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_code_data_row_is_skipped_not_fatal() {
        let service = service();
        let report = service
            .import_rows(&[
                row("A1", "Shoe", "S1", "50", "100", "40"),
                row("  ", "Ghost", "S1", "1", "2", "3"),
                row("A2", "Boot", "S1", "70", "140", "42"),
            ])
            .await
            .unwrap();

        assert_eq!(report, ImportReport { imported: 2, skipped: 1 });
    }

    #[tokio::test]
    async fn blank_cells_normalize_to_none() {
        let service = service();
        service
            .import_rows(&[row("A1", "", "S1", " ", "100", "40")])
            .await
            .unwrap();

        let products = service.records.load_products().unwrap();
        let record = &products["A1_S1"];
        assert!(record.name.is_none());
        assert!(record.cost.is_none());
    }

    #[tokio::test]
    async fn existing_image_is_not_replaced_by_placeholder() {
        let service = service();
        service
            .upload_images(
                vec![UploadFile::new(
                    "A1.jpg",
                    shelf_media::placeholder_jpeg().unwrap(),
                )],
                Some("S1"),
            )
            .await;
        let before = service
            .blobs
            .get(&CatalogKey::new("A1", "S1"))
            .await
            .unwrap()
            .unwrap();

        service
            .import_rows(&[row("A1", "Shoe", "S1", "50", "100", "40")])
            .await
            .unwrap();

        let after = service
            .blobs
            .get(&CatalogKey::new("A1", "S1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before, after);
    }
}
