use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use colored::Colorize;

use shelf_catalog::{CatalogService, StatsView, UploadFile};
use shelf_store::{BlobStore, DirBlobStore, FileKv, RecordStore};
use shelf_sync::{MemoryBridge, Snapshot, SyncEngine};
use shelf_types::{CatalogKey, OrderDraft, OrderId, ProductPatch};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let records = RecordStore::new(Arc::new(FileKv::open(&cli.data_dir.join("records"))?));
    let blobs: Arc<dyn BlobStore> = Arc::new(DirBlobStore::open(&cli.data_dir.join("images")));
    let service = CatalogService::open(records.clone(), blobs);

    match cli.command {
        Command::Import(args) => cmd_import(&service, args).await,
        Command::Upload(args) => cmd_upload(&service, args).await,
        Command::MatchFolder(args) => cmd_match_folder(&service, args).await,
        Command::List(_) => cmd_list(&service).await,
        Command::Edit(args) => cmd_edit(&service, args),
        Command::Delete(args) => cmd_delete(&service, args).await,
        Command::Prices(args) => cmd_prices(&service, args),
        Command::Order(command) => cmd_order(&service, command),
        Command::Report(args) => cmd_report(&service, args).await,
        Command::Images(args) => cmd_images(&service, args).await,
        Command::Settings(command) => cmd_settings(&service, command),
        Command::Sync(command) => cmd_sync(records, command).await,
        Command::ClearProducts(args) => cmd_clear_products(&service, args).await,
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn parse_keys(specs: &[String]) -> anyhow::Result<Vec<CatalogKey>> {
    specs
        .iter()
        .map(|spec| CatalogKey::parse_spec(spec).map_err(Into::into))
        .collect()
}

async fn cmd_import(service: &CatalogService, args: ImportArgs) -> anyhow::Result<()> {
    let raw = fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let parsed: Vec<serde_json::Map<String, serde_json::Value>> =
        serde_json::from_str(&raw).context("import file must be a JSON array of row objects")?;

    let rows: Vec<BTreeMap<String, String>> = parsed
        .into_iter()
        .map(|row| row.into_iter().map(|(k, v)| (k, cell_to_string(v))).collect())
        .collect();

    let report = service.import_rows(&rows).await?;
    println!(
        "{} Imported {} products ({} rows skipped)",
        "✓".green().bold(),
        report.imported.to_string().bold(),
        report.skipped
    );
    Ok(())
}

/// Spreadsheet cells arrive as strings or numbers; render both as text.
fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

async fn cmd_upload(service: &CatalogService, args: UploadArgs) -> anyhow::Result<()> {
    let mut files = Vec::new();
    for path in &args.files {
        match fs::read(path) {
            Ok(bytes) => files.push(UploadFile::new(base_name(path), bytes)),
            Err(e) => println!("{} {}: {}", "✗".red(), path.display(), e),
        }
    }

    let report = service.upload_images(files, args.supplier.as_deref()).await;
    for key in &report.uploaded {
        println!("  {} {}", "stored:".green(), key.to_string().yellow());
    }
    for failure in &report.failures {
        println!(
            "  {} {} ({:?}): {}",
            "failed:".red(),
            failure.file,
            failure.stage,
            failure.error
        );
    }
    println!(
        "{} {} stored, {} failed",
        "✓".green().bold(),
        report.uploaded.len().to_string().bold(),
        report.failures.len()
    );
    Ok(())
}

async fn cmd_match_folder(service: &CatalogService, args: MatchFolderArgs) -> anyhow::Result<()> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(&args.dir) {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_image_name(entry.path()) {
            continue;
        }
        match fs::read(entry.path()) {
            Ok(bytes) => files.push(UploadFile::new(base_name(entry.path()), bytes)),
            Err(e) => println!("{} {}: {}", "✗".red(), entry.path().display(), e),
        }
    }
    if files.is_empty() {
        bail!("no image files under {}", args.dir.display());
    }

    let report = service.match_folder(files).await?;
    println!(
        "{} Matched {} files, {} unmatched",
        "✓".green().bold(),
        report.matched.to_string().bold(),
        report.unmatched.len()
    );
    for name in &report.unmatched {
        println!("  {} {}", "no match:".yellow(), name);
    }
    for failure in &report.failures {
        println!("  {} {}: {}", "failed:".red(), failure.file, failure.error);
    }
    Ok(())
}

fn is_image_name(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("jpg" | "jpeg" | "png")
    )
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn cmd_list(service: &CatalogService) -> anyhow::Result<()> {
    let groups = service.list_by_supplier().await?;
    if groups.is_empty() {
        println!("Catalog is empty.");
        return Ok(());
    }
    for (supplier, entries) in &groups {
        println!(
            "{} ({} items)",
            supplier.yellow().bold(),
            entries.len().to_string().bold()
        );
        for entry in entries {
            let name = entry
                .product
                .as_ref()
                .and_then(|p| p.name.as_deref())
                .unwrap_or("-");
            let price = entry
                .product
                .as_ref()
                .and_then(|p| p.price.as_deref())
                .unwrap_or("-");
            let image = if entry.image.is_some() { "◼" } else { " " };
            println!("  {image} {}  {}  ¥{}", entry.key.code().bold(), name, price);
        }
    }
    Ok(())
}

fn cmd_edit(service: &CatalogService, args: EditArgs) -> anyhow::Result<()> {
    let patch = ProductPatch {
        name: args.name,
        supplier: args.supplier,
        cost: args.cost,
        price: args.price,
        size: args.size,
        remark: args.remark,
    };
    if patch.is_empty() {
        bail!("nothing to change: pass at least one field flag");
    }

    for key in parse_keys(&args.keys)? {
        service.select(key);
    }
    let edited = service.edit_selection(&patch)?;
    println!("{} Updated {} records", "✓".green().bold(), edited.to_string().bold());
    Ok(())
}

async fn cmd_delete(service: &CatalogService, args: DeleteArgs) -> anyhow::Result<()> {
    for key in parse_keys(&args.keys)? {
        service.select(key);
    }
    let report = service.delete_selection().await?;
    println!(
        "{} Deleted {} items, {} failed",
        "✓".green().bold(),
        report.deleted.len().to_string().bold(),
        report.failures.len()
    );
    for failure in &report.failures {
        println!("  {} {}: {}", "failed:".red(), failure.key, failure.error);
    }
    Ok(())
}

fn cmd_prices(service: &CatalogService, args: PricesArgs) -> anyhow::Result<()> {
    let versions = service.price_versions(&args.code)?;
    if versions.is_empty() {
        println!("No product with code {}", args.code.yellow());
        return Ok(());
    }
    println!("{}", args.code.yellow().bold());
    for record in &versions {
        println!(
            "  {}  ¥{}  (cost ¥{})  {}",
            record.supplier.bold(),
            record.price.as_deref().unwrap_or("-"),
            record.cost.as_deref().unwrap_or("-"),
            record.remark.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn cmd_order(service: &CatalogService, command: OrderCommand) -> anyhow::Result<()> {
    match command {
        OrderCommand::Add(args) => {
            let draft = OrderDraft {
                id: args.edit.map(OrderId::from_token),
                code: args.code,
                name: args.name,
                supplier: args.supplier,
                cost: args.cost,
                price: args.price,
                customer: args.customer,
                size: args.size,
                quantity: args.quantity,
                remark: args.remark,
                username: args.username,
            };
            let record = service.save_order(draft)?;
            println!(
                "{} Order {} saved ({} × {})",
                "✓".green().bold(),
                record.id.to_string().yellow(),
                record.code.bold(),
                record.quantity
            );
        }
        OrderCommand::List(args) => {
            let orders = match args.day {
                Some(day) => service.orders_for_day(day)?,
                None => service.recent_orders(args.limit, args.username.as_deref())?,
            };
            if orders.is_empty() {
                println!("No orders.");
            }
            for order in &orders {
                println!(
                    "{}  {}  {}  {} × ¥{}  {}",
                    order.id.to_string().yellow(),
                    order.customer.as_deref().unwrap_or("-").bold(),
                    order.code,
                    order.quantity,
                    order.price.as_deref().unwrap_or("-"),
                    order.timestamp.format("%Y-%m-%d %H:%M")
                );
            }
        }
        OrderCommand::Delete(args) => {
            if service.delete_order(&OrderId::from_token(args.id.clone()))? {
                println!("{} Order {} deleted", "✓".green().bold(), args.id.yellow());
            } else {
                println!("No order with id {}", args.id.yellow());
            }
        }
        OrderCommand::ClearDay(args) => {
            let day = args.day.unwrap_or_else(today);
            let removed = service.clear_orders_for_day(day)?;
            println!(
                "{} Removed {} orders from {}",
                "✓".green().bold(),
                removed.to_string().bold(),
                day
            );
        }
    }
    Ok(())
}

async fn cmd_report(service: &CatalogService, args: ReportArgs) -> anyhow::Result<()> {
    let day = args.day.unwrap_or_else(today);
    match args.kind {
        ReportKind::Daily => {
            let rows = service.daily_orders(day)?;
            println!("{} — {} orders", day.to_string().bold(), rows.len());
            for row in &rows {
                println!(
                    "  {}  {}  {}  {} × ¥{} = ¥{}  (profit ¥{})  {}",
                    row.customer.bold(),
                    row.code,
                    row.size,
                    row.quantity,
                    row.unit_price,
                    row.amount,
                    row.profit,
                    row.supplier
                );
            }
        }
        ReportKind::Suppliers => {
            let report = service.supplier_stats(day)?;
            for view in StatsView::all() {
                println!("{}", view.label().bold());
                for row in report.sorted(view) {
                    println!(
                        "  {}  {} orders  qty {}  ¥{:.0}  cost ¥{:.0}  profit ¥{:.0} ({:.2}%)",
                        row.supplier.yellow(),
                        row.order_count,
                        row.total_quantity,
                        row.total_amount,
                        row.total_cost,
                        row.gross_profit,
                        row.profit_rate
                    );
                }
            }
            let t = &report.totals;
            println!(
                "{}  {} orders  qty {}  ¥{:.0}  profit ¥{:.0} ({:.2}%)",
                "total".bold(),
                t.order_count,
                t.total_quantity,
                t.total_amount,
                t.gross_profit,
                t.profit_rate
            );
        }
        ReportKind::Reorder => {
            let sheets = service.reorder_sheets(day).await?;
            for sheet in &sheets {
                println!("{}", sheet.supplier.yellow().bold());
                for line in &sheet.lines {
                    let sizes: Vec<String> = line
                        .sizes
                        .iter()
                        .map(|(size, quantity)| format!("{size}×{quantity}"))
                        .collect();
                    let photo = if line.image.is_some() { "◼" } else { " " };
                    println!(
                        "  {photo} {}  {}  [{}]  total {}",
                        line.code.bold(),
                        line.name,
                        sizes.join(" "),
                        line.total.to_string().bold()
                    );
                }
            }
        }
        ReportKind::Catalog => {
            let rows = service.catalog_rows()?;
            println!("{} products", rows.len().to_string().bold());
            for row in &rows {
                println!(
                    "  {}  {}  {}  cost ¥{}  ¥{}  size {}",
                    row.code.bold(),
                    row.name,
                    row.supplier.yellow(),
                    row.cost,
                    row.price,
                    row.size
                );
            }
        }
        ReportKind::Labels => {
            let labels = service.label_rows(day).await?;
            println!("{} labels for {}", labels.len().to_string().bold(), day);
            for label in &labels {
                let price = label
                    .unit_price
                    .as_deref()
                    .map(|p| format!("¥{p}"))
                    .unwrap_or_else(|| "(hidden)".to_string());
                println!(
                    "  {}  {}  {}  {}",
                    label.customer.bold(),
                    label.code,
                    label.size,
                    price
                );
            }
        }
    }
    Ok(())
}

async fn cmd_images(service: &CatalogService, args: ImagesArgs) -> anyhow::Result<()> {
    let blobs = match (&args.code, &args.supplier) {
        (Some(code), _) => service.blobs().find_by_code(code).await?,
        (None, Some(supplier)) => service.blobs().find_by_supplier(supplier).await?,
        (None, None) => service.blobs().list().await?,
    };
    println!("{} images", blobs.len().to_string().bold());
    for blob in &blobs {
        println!(
            "  {}  {}  {} bytes  {}",
            blob.key().to_string().yellow(),
            blob.format,
            blob.bytes.len(),
            blob.timestamp.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn cmd_settings(service: &CatalogService, command: SettingsCommand) -> anyhow::Result<()> {
    match command {
        SettingsCommand::Columns(args) => match args.set {
            Some(columns) => {
                service.set_grid_columns(columns)?;
                println!(
                    "{} Grid columns set to {}",
                    "✓".green().bold(),
                    service.grid_columns()?.to_string().bold()
                );
            }
            None => println!("Grid columns: {}", service.grid_columns()?.to_string().bold()),
        },
        SettingsCommand::HidePrice(args) => {
            if let Some(customer) = &args.add {
                if service.add_hide_price_customer(customer)? {
                    println!("{} Added {}", "✓".green().bold(), customer.bold());
                } else {
                    println!("{customer} is already on the list");
                }
            }
            if let Some(customer) = &args.remove {
                if service.remove_hide_price_customer(customer)? {
                    println!("{} Removed {}", "✓".green().bold(), customer.bold());
                } else {
                    println!("{customer} is not on the list");
                }
            }
            if args.add.is_none() && args.remove.is_none() {
                for customer in service.hide_price_customers()? {
                    println!("  {customer}");
                }
            }
        }
    }
    Ok(())
}

async fn cmd_sync(records: RecordStore, command: SyncCommand) -> anyhow::Result<()> {
    match command {
        SyncCommand::Export(args) => {
            let engine = SyncEngine::new(records, Arc::new(MemoryBridge::new()));
            let snapshot = engine.push_local().await?;
            fs::write(&args.out, serde_json::to_string_pretty(&snapshot)?)?;
            println!(
                "{} Snapshot with {} documents written to {}",
                "✓".green().bold(),
                snapshot.document_count().to_string().bold(),
                args.out.display()
            );
        }
        SyncCommand::Apply(args) => {
            let raw = fs::read_to_string(&args.file)
                .with_context(|| format!("reading {}", args.file.display()))?;
            let snapshot: Snapshot = serde_json::from_str(&raw).context("not a snapshot file")?;
            let engine = SyncEngine::new(records, Arc::new(MemoryBridge::new()));
            engine.apply_remote(&snapshot)?;
            println!(
                "{} Applied snapshot from {} ({} documents, last write wins)",
                "✓".green().bold(),
                snapshot.timestamp,
                snapshot.document_count().to_string().bold()
            );
        }
    }
    Ok(())
}

async fn cmd_clear_products(service: &CatalogService, args: ClearProductsArgs) -> anyhow::Result<()> {
    if !args.force {
        bail!("refusing to clear product data without --force (orders would be kept)");
    }
    service.clear_products().await?;
    println!("{} Product data cleared; orders kept", "✓".green().bold());
    Ok(())
}
