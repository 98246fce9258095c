use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "storescrape")]
#[command(about = "Product extraction for storefront sitemaps and search APIs")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Configuration file (defaults to ./storescrape.toml when present)")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search the Snitch catalogue and save the results.
    Snitch(SearchArgs),

    /// Search the Tasva catalogue and save the results.
    Tasva(SearchArgs),

    /// Crawl a Shopify store's sitemap into the keyed store.
    Shopify {
        #[arg(help = "Sitemap index URL, e.g. https://shop.example/sitemap.xml")]
        sitemap_url: String,
    },

    /// Add CDN image URL columns to a product CSV.
    ImageUrls {
        #[arg(help = "CSV with an Images or Images_JSON column")]
        input: PathBuf,

        #[arg(help = "Output CSV (defaults to <input>_with_urls.csv)")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[arg(help = "Search terms; the configured defaults are used when none are given")]
    pub terms: Vec<String>,

    #[arg(long, value_parser = clap::value_parser!(u64).range(1..), help = "Records requested per page")]
    pub limit: Option<u64>,

    #[arg(short, long, help = "CSV output path")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Upsert into the keyed store instead of writing a CSV")]
    pub store: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_terms_and_flags() {
        let cli = Cli::parse_from(["storescrape", "--log-json", "tasva", "kurta", "sherwani", "--limit", "50", "--store"]);
        assert!(cli.log_json);
        match cli.command {
            Commands::Tasva(args) => {
                assert_eq!(args.terms, vec!["kurta", "sherwani"]);
                assert_eq!(args.limit, Some(50));
                assert!(args.store);
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn image_urls_output_is_optional() {
        let cli = Cli::parse_from(["storescrape", "image-urls", "in.csv"]);
        match cli.command {
            Commands::ImageUrls { input, output } => {
                assert_eq!(input, PathBuf::from("in.csv"));
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn zero_limit_is_rejected() {
        assert!(Cli::try_parse_from(["storescrape", "snitch", "jeans", "--limit", "0"]).is_err());
        assert!(Cli::try_parse_from(["storescrape", "snitch", "jeans", "--limit", "1"]).is_ok());
    }
}
