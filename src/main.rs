use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use serde_json::Value;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use storescrape::cli::{Cli, Commands, SearchArgs};
use storescrape::config::Config;
use storescrape::images::add_image_urls;
use storescrape::models::Record;
use storescrape::paginate::PaginationSettings;
use storescrape::scrapers::{run_search, SearchScraper, ShopifyScraper, SnitchScraper, TasvaScraper};
use storescrape::storage::csv::{default_csv_name, write_records};
use storescrape::storage::{document_key, upsert_all, KeyedStore, SqliteStore};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    if let Err(e) = init_logging(cli.log_json) {
        eprintln!("Failed to initialise logging: {}", e);
        return ExitCode::FAILURE;
    }

    tokio::select! {
        result = run(cli) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Fatal error: {:#}", e);
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Scraping interrupted by user");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("storescrape=info".parse()?);
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Snitch(args) => {
            let scraper = SnitchScraper::new(&config)?;
            search(&config, &scraper, args).await
        }
        Commands::Tasva(args) => {
            let scraper = TasvaScraper::new(&config)?;
            search(&config, &scraper, args).await
        }
        Commands::Shopify { sitemap_url } => shopify(&config, &sitemap_url).await,
        Commands::ImageUrls { input, output } => {
            let report = add_image_urls(&input, output.as_deref(), &config.image_cdn_template)?;
            info!(
                "Wrote {} ({} rows, {} with images)",
                report.output.display(),
                report.rows_processed,
                report.rows_with_images
            );
            Ok(())
        }
    }
}

async fn open_store(config: &Config) -> Result<SqliteStore> {
    let path = config.database_path();
    let store = SqliteStore::open(path).with_context(|| format!("Failed to open database at {}", path))?;
    store.migrate().await?;
    info!("Connected to database at {}", path);
    Ok(store)
}

async fn search<S: SearchScraper>(config: &Config, scraper: &S, args: SearchArgs) -> Result<()> {
    let source = config.source(scraper.source())?;
    let mut settings = PaginationSettings::from_source(source);
    if let Some(limit) = args.limit {
        settings.limit = limit;
    }
    if settings.limit == 0 {
        bail!("Page limit for {} must be at least 1", scraper.source());
    }

    let queries = if args.terms.is_empty() {
        source.default_queries.clone()
    } else {
        args.terms
    };
    if queries.is_empty() {
        bail!("No search terms given and none configured for {}", scraper.source());
    }

    // Opened up front so an unusable store fails before any requests go out.
    let store = if args.store {
        Some(open_store(config).await?)
    } else {
        None
    };

    let run = run_search(scraper, &queries, &settings).await;
    for summary in &run.queries {
        info!(
            "'{}': {} records over {} pages, {} skipped ({})",
            summary.query, summary.records, summary.pages, summary.skipped, summary.stop_reason
        );
    }
    info!("{} unique records, {} duplicates removed", run.records.len(), run.duplicates);

    match store {
        Some(store) => {
            let documents: Vec<Value> = run.records.iter().map(Record::to_document).collect();
            upsert_all(&store, scraper.source().key(), &documents, document_key(scraper.identity_field())).await?;
        }
        None => {
            let path = args
                .output
                .unwrap_or_else(|| default_csv_name(scraper.source(), Local::now()));
            write_records(&path, &run.records, scraper.preferred_fields())?;
        }
    }
    Ok(())
}

async fn shopify(config: &Config, sitemap_url: &str) -> Result<()> {
    if !sitemap_url.starts_with("http") {
        bail!("Invalid URL: {} (expected a full http:// or https:// URL)", sitemap_url);
    }

    let store = open_store(config).await?;
    let scraper = ShopifyScraper::new(config)?;
    let crawl = scraper.crawl(sitemap_url).await?;

    if crawl.products.is_empty() {
        warn!("No products to save");
    } else {
        upsert_all(&store, &crawl.collection, &crawl.products, document_key("id")).await?;
    }

    info!(
        "Scraping complete: {} products from {} URLs, {} errors, collection '{}'",
        crawl.products.len(),
        crawl.product_urls,
        crawl.errors,
        crawl.collection
    );
    Ok(())
}
