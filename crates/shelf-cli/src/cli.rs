use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use chrono::NaiveDate;

#[derive(Parser)]
#[command(
    name = "shelf",
    about = "Shelf — offline-first retail catalog and ordering",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Data directory for the local stores.
    #[arg(long, global = true, default_value = "./shelf_data")]
    pub data_dir: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Import a product table (JSON rows exported from a spreadsheet)
    Import(ImportArgs),
    /// Compress and store product images
    Upload(UploadArgs),
    /// Match a folder of images against the catalog by product code
    MatchFolder(MatchFolderArgs),
    /// Show the catalog grouped by supplier
    List(ListArgs),
    /// Apply one field patch to a set of catalog keys
    Edit(EditArgs),
    /// Delete records and images for a set of catalog keys
    Delete(DeleteArgs),
    /// Compare every supplier's version of a product code
    Prices(PricesArgs),
    /// Create, list, or delete orders
    #[command(subcommand)]
    Order(OrderCommand),
    /// Aggregate daily and supplier reports
    Report(ReportArgs),
    /// Inspect stored image blobs
    Images(ImagesArgs),
    /// Get or set display settings
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Export or apply a sync snapshot
    #[command(subcommand)]
    Sync(SyncCommand),
    /// Clear all product data (orders are kept)
    ClearProducts(ClearProductsArgs),
}

#[derive(Args)]
pub struct ImportArgs {
    /// JSON file: an array of row objects keyed by the table headers.
    pub file: PathBuf,
}

#[derive(Args)]
pub struct UploadArgs {
    /// Image files; the product code is the name before the first dot.
    pub files: Vec<PathBuf>,
    /// Supplier the images belong to.
    #[arg(short, long)]
    pub supplier: Option<String>,
}

#[derive(Args)]
pub struct MatchFolderArgs {
    pub dir: PathBuf,
}

#[derive(Args)]
pub struct ListArgs {}

#[derive(Args)]
pub struct EditArgs {
    /// Keys as CODE:SUPPLIER.
    #[arg(required = true)]
    pub keys: Vec<String>,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub supplier: Option<String>,
    #[arg(long)]
    pub cost: Option<String>,
    #[arg(long)]
    pub price: Option<String>,
    #[arg(long)]
    pub size: Option<String>,
    #[arg(long)]
    pub remark: Option<String>,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Keys as CODE:SUPPLIER.
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(Args)]
pub struct PricesArgs {
    pub code: String,
}

#[derive(Subcommand)]
pub enum OrderCommand {
    /// Create an order, or edit one with --edit
    Add(OrderAddArgs),
    /// List orders for a day (default: today)
    List(OrderListArgs),
    /// Delete one order by id
    Delete(OrderDeleteArgs),
    /// Remove every order placed on a day
    ClearDay(OrderClearDayArgs),
}

#[derive(Args)]
pub struct OrderAddArgs {
    pub code: String,
    /// Order id to edit in place.
    #[arg(long)]
    pub edit: Option<String>,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub supplier: Option<String>,
    #[arg(long)]
    pub cost: Option<String>,
    #[arg(long)]
    pub price: Option<String>,
    #[arg(long)]
    pub customer: Option<String>,
    #[arg(long)]
    pub size: Option<String>,
    #[arg(short, long)]
    pub quantity: Option<u32>,
    #[arg(long)]
    pub remark: Option<String>,
    #[arg(long)]
    pub username: Option<String>,
}

#[derive(Args)]
pub struct OrderListArgs {
    #[arg(long)]
    pub day: Option<NaiveDate>,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    #[arg(long)]
    pub username: Option<String>,
}

#[derive(Args)]
pub struct OrderDeleteArgs {
    pub id: String,
}

#[derive(Args)]
pub struct OrderClearDayArgs {
    #[arg(long)]
    pub day: Option<NaiveDate>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum ReportKind {
    /// Daily order sheet
    Daily,
    /// Supplier statistics with the five sort views
    Suppliers,
    /// Per-supplier reorder sheets
    Reorder,
    /// Raw catalog dump
    Catalog,
    /// Per-unit label data
    Labels,
}

#[derive(Args)]
pub struct ReportArgs {
    #[arg(value_enum)]
    pub kind: ReportKind,
    #[arg(long)]
    pub day: Option<NaiveDate>,
}

#[derive(Args)]
pub struct ImagesArgs {
    /// Restrict to one product code.
    #[arg(long)]
    pub code: Option<String>,
    /// Restrict to one supplier.
    #[arg(long)]
    pub supplier: Option<String>,
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Get or set the grid column count
    Columns(ColumnsArgs),
    /// Manage the hide-price customer list
    HidePrice(HidePriceArgs),
}

#[derive(Args)]
pub struct ColumnsArgs {
    /// New column count (1..=12); omit to show the current value.
    pub set: Option<u8>,
}

#[derive(Args)]
pub struct HidePriceArgs {
    #[arg(long)]
    pub add: Option<String>,
    #[arg(long)]
    pub remove: Option<String>,
}

#[derive(Subcommand)]
pub enum SyncCommand {
    /// Write a snapshot of both collections to a file
    Export(SyncExportArgs),
    /// Overwrite both collections from a snapshot file (last write wins)
    Apply(SyncApplyArgs),
}

#[derive(Args)]
pub struct SyncExportArgs {
    pub out: PathBuf,
}

#[derive(Args)]
pub struct SyncApplyArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct ClearProductsArgs {
    /// Confirm: this removes every product record and image.
    #[arg(long)]
    pub force: bool,
}
