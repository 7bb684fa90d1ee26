use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use refinder::config::AppConfig;
use refinder::document::{Direction, Fragment, LiveDocument, element_at, relative_element};
use refinder::element_finder::{MatchResolver, ReferenceShape};
use refinder::engine::ScrapingEngine;
use refinder::models::{MatchStrategy, Schema};
use refinder::selector::{parse_selector, synthesize, synthesize_xpath};
use refinder::utils::error::AppError;
use refinder::utils::logging::init_tracing;

#[derive(Parser)]
#[command(name = "refinder", author, version, about = "Re-locate elements and scrape records with declarative schemas")]
struct Cli {
    /// Configuration file; defaults to config/{default,RUN_MODE,local} plus REFINDER__* variables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a schema against an HTML page and print the records as JSON.
    Scrape {
        #[arg(long)]
        schema: PathBuf,
        #[arg(long)]
        html: PathBuf,
        /// Page URL, used for relative links and the schema's URL filter.
        #[arg(long)]
        url: Option<Url>,
    },
    /// Find the elements of a page that match a reference fragment.
    Match {
        #[arg(long)]
        html: PathBuf,
        #[arg(long)]
        fragment: String,
        /// exact, similar, xpath or selector; cascades through all four when omitted.
        #[arg(long)]
        strategy: Option<MatchStrategy>,
    },
    /// Print the synthesized CSS selector and XPath for every element matching a query.
    Selector {
        #[arg(long)]
        html: PathBuf,
        #[arg(long)]
        css: String,
        /// Widen each element to its parent or narrow it to its first child before synthesizing.
        #[arg(long)]
        relative: Option<Direction>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::from_env(),
    }
    .context("failed to load configuration")?;

    let _log_guard = init_tracing(&config.logging);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling...");
            on_signal.cancel();
        }
    });

    let outcome = match cli.command {
        Command::Scrape { schema, html, url } => run_scrape(&config, &schema, &html, url, &cancel).await,
        Command::Match {
            html,
            fragment,
            strategy,
        } => run_match(&config, &html, &fragment, strategy, &cancel).await,
        Command::Selector { html, css, relative } => run_selector(&html, &css, relative),
    };

    match outcome {
        Err(err) if err.downcast_ref::<AppError>().is_some_and(AppError::is_cancelled) => {
            warn!("Cancelled before completion, no output written");
            Ok(())
        }
        other => other,
    }
}

fn load_page(path: &Path) -> Result<LiveDocument> {
    let markup = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(LiveDocument::parse(&markup))
}

async fn run_scrape(
    config: &AppConfig,
    schema_path: &Path,
    html_path: &Path,
    url: Option<Url>,
    cancel: &CancellationToken,
) -> Result<()> {
    let schema_json =
        fs::read_to_string(schema_path).with_context(|| format!("failed to read {}", schema_path.display()))?;
    let schema = Schema::from_json(&schema_json).context("invalid schema")?;

    let mut doc = load_page(html_path)?;
    if let Some(url) = url {
        if !schema.is_active_for(&url) {
            warn!(schema = %schema.name, %url, "Schema is not active for this URL");
            println!("[]");
            return Ok(());
        }
        doc = doc.with_url(url);
    }

    let engine = ScrapingEngine::new(config);
    let records = engine.scrape(&schema, &doc, cancel).await?;
    info!(records = records.len(), "Scrape complete");

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

async fn run_match(
    config: &AppConfig,
    html_path: &Path,
    fragment: &str,
    strategy: Option<MatchStrategy>,
    cancel: &CancellationToken,
) -> Result<()> {
    let doc = load_page(html_path)?;
    let reference = Fragment::parse(fragment)?;
    let shape = ReferenceShape::from_element(reference.root());

    let resolver = MatchResolver::new(&config.matching);
    let result = resolver.resolve_cascade(&shape, strategy, &doc, cancel).await?;

    let html = doc.read();
    let matches: Vec<String> = result.elements(&html).into_iter().map(|el| el.html()).collect();
    let output = json!({
        "strategy": result.strategy,
        "matches": matches,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_selector(html_path: &Path, css: &str, relative: Option<Direction>) -> Result<()> {
    let doc = load_page(html_path)?;
    let query = parse_selector(css)?;

    let html = doc.read();
    let paths: Vec<_> = html
        .select(&query)
        .filter_map(|el| match relative {
            Some(direction) => relative_element(&html, el.id(), direction).and_then(|id| element_at(&html, id)),
            None => Some(el),
        })
        .map(|el| {
            json!({
                "selector": synthesize(el),
                "xpath": synthesize_xpath(el),
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&paths)?);
    Ok(())
}
