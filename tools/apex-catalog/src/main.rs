//! Developer CLI over the catalog core and the device-local stores.
//!
//! State that a browser keeps in local storage lives in one JSON file under
//! `--data-dir`; session-scoped state lasts for a single invocation.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use apex_common::catalog::{BundledCatalog, Catalog};
use apex_common::config::SiteConfig;
use apex_common::custom::{CustomCatalogStore, NewCategory, NewProduct};
use apex_common::enquiry::{EnquiryStatus, EnquiryStore, FormType, NewEnquiry};
use apex_common::image::resolve_image_url;
use apex_common::lead::submit_enquiry;
use apex_common::product::{Product, ProductId};
use apex_common::query::CatalogQuery;
use apex_common::storage::{FileStore, MemoryStore};
use apex_common::visit::{VisitTracker, VisitStats};
use apex_sheets::{AppsScriptSink, SheetsClient};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const BUNDLED_CATALOG: &str = include_str!("../../../data/catalog.json");
const STORE_FILE: &str = "local-store.json";

#[derive(Parser)]
#[command(name = "apex-catalog", about = "Apex fasteners catalog and lead tools")]
struct Cli {
    /// Directory holding the device-local store.
    #[arg(long, default_value = "apex-data")]
    data_dir: PathBuf,

    /// Site config (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bundled catalog document (defaults to the built-in copy).
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Read products from this published sheet instead of the bundled list.
    #[arg(long)]
    sheet_id: Option<String>,

    /// Sheet tab name (with --sheet-id).
    #[arg(long)]
    sheet_name: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List products, optionally filtered.
    Products {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        subcategory: Option<String>,
        #[arg(long)]
        search: Option<String>,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// List categories with their subcategories.
    Categories,
    /// Add a custom product.
    AddProduct {
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: String,
        #[arg(long, default_value = "")]
        subcategory: String,
        #[arg(long, default_value = "")]
        material: String,
        #[arg(long, default_value = "")]
        size_range: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        image: String,
    },
    /// Remove a custom product.
    RemoveProduct { id: String },
    /// Add a custom category.
    AddCategory {
        #[arg(long)]
        name: String,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_delimiter = ',')]
        subcategories: Vec<String>,
    },
    /// Work with stored leads.
    Leads {
        #[command(subcommand)]
        action: LeadsAction,
    },
    /// Summarise the visit log.
    Visits,
    /// Resolve an image reference to a loadable URL.
    Image { url: String },
}

#[derive(Subcommand, Clone)]
enum LeadsAction {
    List,
    Stats,
    /// Record a lead and forward it to the configured sink.
    Submit {
        #[arg(long, default_value = "enquiry")]
        form_type: FormType,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        company: String,
        #[arg(long, default_value = "")]
        mobile: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        requirement: String,
    },
    SetStatus {
        id: String,
        status: EnquiryStatus,
    },
    Delete {
        id: String,
    },
    Clear,
}

fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let mut config = match &cli.config {
        Some(path) => SiteConfig::from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SiteConfig::default(),
    };
    if let Some(id) = &cli.sheet_id {
        config.sheet.enabled = true;
        config.sheet.sheet_id = id.clone();
    }
    if let Some(name) = &cli.sheet_name {
        config.sheet.sheet_name = name.clone();
    }
    Ok(config)
}

fn load_bundled(path: Option<&Path>) -> Result<BundledCatalog> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?,
        None => BUNDLED_CATALOG.to_string(),
    };
    BundledCatalog::from_json_str(&text).context("parsing bundled catalog")
}

/// An unreadable store file is logged and treated as empty so read-only
/// commands keep working; the next write replaces it.
fn open_store(data_dir: &Path) -> Result<FileStore> {
    let path = data_dir.join(STORE_FILE);
    FileStore::open_or_empty(&path).with_context(|| format!("opening store {}", path.display()))
}

async fn load_catalog(cli: &Cli, config: &SiteConfig, store: &mut FileStore) -> Result<Catalog> {
    let bundled = load_bundled(cli.catalog.as_deref())?;
    let remote = SheetsClient::from_config(&config.sheet);
    let custom = CustomCatalogStore::new(store);
    let catalog = Catalog::load(&bundled, remote.as_ref(), &custom).await;
    if let Some(err) = &catalog.error {
        warn!("Spreadsheet unavailable, showing bundled products: {err}");
    }
    Ok(catalog)
}

fn print_products(products: &[&Product]) {
    for p in products {
        println!(
            "{:<18} {:<28} {:<10} {:<20} {}",
            p.id.as_str(),
            p.name,
            p.category,
            p.subcategory,
            p.size_range
        );
    }
    println!("{} product(s)", products.len());
}

fn print_visit_stats(stats: &VisitStats) {
    println!("Total visits:    {}", stats.total);
    println!("Unique visitors: {}", stats.unique_visitors);
    println!("New visitors:    {}", stats.new_visitors);
    println!("Today / week:    {} / {}", stats.today, stats.this_week);
    for (device, count) in &stats.by_device {
        println!("  {device:?}: {count}");
    }
    for (source, count) in &stats.by_source {
        println!("  {source}: {count}");
    }
    for page in &stats.top_pages {
        println!("  {} ({})", page.page, page.count);
    }
}

async fn run_leads(action: LeadsAction, config: &SiteConfig, store: &mut FileStore) -> Result<()> {
    let mut leads = EnquiryStore::with_cap(store, config.enquiry_cap);
    let now = Utc::now();
    match action {
        LeadsAction::List => {
            for e in leads.enquiries() {
                println!(
                    "{}  {}  {:<15} {:<10} {:<20} {}",
                    e.id,
                    e.timestamp.format("%Y-%m-%d %H:%M"),
                    e.form_type.as_str(),
                    e.status.as_str(),
                    e.name,
                    e.requirement
                );
            }
        }
        LeadsAction::Stats => {
            println!("{}", serde_json::to_string_pretty(&leads.stats(now))?);
        }
        LeadsAction::Submit {
            form_type,
            name,
            company,
            mobile,
            email,
            requirement,
        } => {
            let sinks: Vec<AppsScriptSink> = match config.lead_sink() {
                Some(url) => vec![AppsScriptSink::new(url)
                    .with_context(|| format!("invalid lead sink URL {url}"))?],
                None => Vec::new(),
            };
            let form = NewEnquiry {
                name,
                company,
                mobile,
                email,
                requirement,
                ..Default::default()
            };
            let report = submit_enquiry(&mut leads, &sinks, form, form_type, now).await;
            if !report.success() {
                bail!("enquiry {} could not be saved or forwarded", report.enquiry.id);
            }
            info!("Submitted enquiry {}", report.enquiry.id);
            println!("{}", report.enquiry.id);
        }
        LeadsAction::SetStatus { id, status } => {
            if !leads.update_status(&id, status, now)? {
                bail!("no enquiry with id {id}");
            }
        }
        LeadsAction::Delete { id } => {
            if !leads.delete(&id)? {
                bail!("no enquiry with id {id}");
            }
        }
        LeadsAction::Clear => leads.clear()?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let mut store = open_store(&cli.data_dir)?;
    let now = Utc::now();

    match &cli.command {
        Command::Products {
            category,
            subcategory,
            search,
            json,
        } => {
            let catalog = load_catalog(&cli, &config, &mut store).await?;
            let query = CatalogQuery {
                category: category.clone(),
                subcategory: subcategory.clone(),
                search: search.clone(),
            };
            let matches = query.apply(&catalog.products);
            if *json {
                println!("{}", serde_json::to_string_pretty(&matches)?);
            } else {
                println!("{}", catalog.category_name(category.as_deref()));
                print_products(&matches);
            }
        }
        Command::Categories => {
            let catalog = load_catalog(&cli, &config, &mut store).await?;
            for c in &catalog.categories {
                let marker = if c.is_custom { " (custom)" } else { "" };
                println!("{:<12} {}{}", c.id.as_str(), c.name, marker);
                for sub in &c.subcategories {
                    println!("    {sub}");
                }
            }
        }
        Command::AddProduct {
            name,
            category,
            subcategory,
            material,
            size_range,
            description,
            image,
        } => {
            let mut custom = CustomCatalogStore::new(&mut store);
            let product = custom.add_product(
                NewProduct {
                    name: name.clone(),
                    category: category.clone(),
                    subcategory: subcategory.clone(),
                    material: material.clone(),
                    size_range: size_range.clone(),
                    description: description.clone(),
                    image: image.clone(),
                },
                now,
            )?;
            println!("{}", product.id);
        }
        Command::RemoveProduct { id } => {
            let mut custom = CustomCatalogStore::new(&mut store);
            if !custom.delete_product(&ProductId(id.clone()))? {
                bail!("no custom product with id {id}");
            }
        }
        Command::AddCategory {
            name,
            id,
            description,
            subcategories,
        } => {
            let mut custom = CustomCatalogStore::new(&mut store);
            let created = custom.add_category(
                NewCategory {
                    id: id.clone(),
                    name: name.clone(),
                    description: description.clone(),
                    subcategories: subcategories.clone(),
                },
                now,
            )?;
            match created {
                Some(category) => println!("{}", category.id.as_str()),
                None => bail!("a custom category with that id already exists"),
            }
        }
        Command::Leads { action } => run_leads(action.clone(), &config, &mut store).await?,
        Command::Visits => {
            let tracker = VisitTracker::with_cap(&mut store, MemoryStore::new(), config.visit_cap);
            print_visit_stats(&tracker.stats(now));
        }
        Command::Image { url } => println!("{}", resolve_image_url(url)),
    }
    Ok(())
}
