use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use inet_app::{link_selector, Inet, RowReport, ScrapeReport};
use inet_common::observability::{init_logging, LogConfig, LogFormat};
use inet_common::{EntityKind, SourceKind};
use inet_config::{InetConfig, InetConfigLoader, SelectorSpec};
use inet_data::Dataset;
use inet_sources::{QueryKind, RegistryKind, RegistryQuery, ResultRange};
use serde::Serialize;
use std::path::PathBuf;

const DEFAULT_CONFIG_FILE: &str = "inet.yaml";

#[derive(Parser)]
#[command(name = "inet")]
#[command(about = "Enrich research datasets with website and registry data")]
struct Cli {
    /// Config file; defaults to ./inet.yaml when present
    #[arg(long, global = true, env = "INET_CONFIG")]
    config: Option<PathBuf>,

    /// Log encoding (text or json); overrides the config file
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a page, its about pages, and its Twitter links
    Scrape {
        url: String,
        #[arg(long)]
        no_about: bool,
        #[arg(long)]
        no_twitter: bool,
        /// CSS selector for about links (href attribute, no text filter)
        #[arg(long)]
        about_selector: Option<String>,
        /// CSS selector for Twitter links
        #[arg(long)]
        twitter_selector: Option<String>,
        #[arg(long)]
        resolve_relative: bool,
    },

    /// Scrape the URL column of every row in a CSV file
    Enrich {
        #[arg(long)]
        data: PathBuf,
        #[arg(long, default_value = "website")]
        url_column: String,
    },

    /// Query a public registry
    Search {
        registry: RegistryKind,
        kind: QueryKind,
        term: String,
        #[arg(long, default_value_t = 1)]
        begin: u32,
        #[arg(long, default_value_t = 25)]
        end: u32,
    },

    /// Match dataset rows against a source
    Match {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        entity: EntityKind,
        #[arg(long)]
        source: SourceKind,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<InetConfig> {
    let loader = match path {
        Some(p) => InetConfigLoader::new().with_file(p),
        None => InetConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE),
    };
    loader.load().context("loading configuration")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn css_only(css: String) -> SelectorSpec {
    SelectorSpec {
        css,
        attr: "href".into(),
        text: None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_ref())?;

    let log_path = init_logging(LogConfig {
        log_dir: cfg.logging.log_dir(),
        emit_stderr: cfg.logging.stderr,
        format: cli.log_format.unwrap_or(cfg.logging.format),
        default_filter: cfg.logging.filter.clone(),
        ..LogConfig::default()
    })?;
    tracing::info!(log_path=%log_path.display(), version=?cfg.version, "inet.start");

    match cli.command {
        Commands::Scrape {
            url,
            no_about,
            no_twitter,
            about_selector,
            twitter_selector,
            resolve_relative,
        } => {
            let inet = Inet::new(Dataset::empty(), &cfg)?;
            let mut req = inet.request_for(&url);
            req.about &= !no_about;
            req.twitter_handles &= !no_twitter;
            req.resolve_relative |= resolve_relative;
            if let Some(css) = about_selector {
                req.about_selector = Some(link_selector(&css_only(css)).context("--about-selector")?);
            }
            if let Some(css) = twitter_selector {
                req.twitter_selector =
                    Some(link_selector(&css_only(css)).context("--twitter-selector")?);
            }
            let result = inet.scrape(&req).await;
            print_json(&result.as_ref().map(ScrapeReport::from))
        }

        Commands::Enrich { data, url_column } => {
            let dataset = Dataset::load(&data)?;
            let inet = Inet::new(dataset, &cfg)?;
            for row in inet.scrape_rows(&url_column).await {
                println!("{}", serde_json::to_string(&RowReport::from(&row))?);
            }
            Ok(())
        }

        Commands::Search {
            registry,
            kind,
            term,
            begin,
            end,
        } => {
            let Some(range) = ResultRange::new(begin, end) else {
                bail!("invalid range {begin}-{end}: need 1 <= begin <= end");
            };
            let inet = Inet::new(Dataset::empty(), &cfg)?;
            let reply = inet
                .search(registry, &RegistryQuery { kind, term }, range)
                .await?;
            print_json(&reply)
        }

        Commands::Match {
            data,
            entity,
            source,
        } => {
            let inet = Inet::new(Dataset::load(&data)?, &cfg)?;
            print_json(&inet.run_matcher(entity, source).await)
        }
    }
}
