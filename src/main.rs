use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use cesta::catalog::{clamp_quantity, CartAction, MatchCriteria};
use cesta::config::AppConfig;
use cesta::session::BrowserSession;
use cesta::workflow::SessionWorkflow;

#[derive(Parser)]
#[command(
    name = "cesta",
    version,
    about = "Grocery storefront automation: search, scrape and export product data"
)]
struct Cli {
    /// Run with a visible browser window
    #[arg(long, global = true)]
    headed: bool,

    /// Postal code for the storefront gate
    #[arg(long, global = true)]
    postal_code: Option<String>,

    /// Directory for exported files
    #[arg(long, global = true)]
    output_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search every term, scrape the catalog and export one file per term
    Scrape {
        /// Terms to search; defaults to the configured list
        terms: Vec<String>,

        /// Print the batch report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Add a matched product to the cart
    Add {
        /// Product name, compared exactly after trimming
        #[arg(long)]
        term: String,

        /// Expected label token, e.g. "ud" or "pack"
        #[arg(long)]
        label: String,

        /// Substring that must appear in the product detail line
        #[arg(long)]
        detail: Option<String>,

        /// How many units to add (capped at 10)
        #[arg(long, default_value_t = 1)]
        quantity: i64,
    },
    /// Remove a matched product from the cart
    Remove {
        #[arg(long)]
        term: String,

        #[arg(long)]
        label: String,

        #[arg(long)]
        detail: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cesta=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    if cli.headed {
        config.browser.headless = false;
    }
    if let Some(postal_code) = cli.postal_code {
        config.store.postal_code = postal_code;
    }
    if let Some(output_dir) = cli.output_dir {
        config.export.output_dir = output_dir;
    }

    let session = BrowserSession::launch(&config.browser)?;
    let workflow = SessionWorkflow::new(session, config.clone())?;
    workflow.open_store().await?;

    match cli.command {
        Command::Scrape { terms, json } => {
            let terms = if terms.is_empty() {
                config.store.search_terms.clone()
            } else {
                terms
            };
            info!(count = terms.len(), "starting batch");
            let report = workflow.run_batch(&terms).await;
            info!(
                succeeded = report.succeeded(),
                failed = report.failed(),
                "batch finished"
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Command::Add {
            term,
            label,
            detail,
            quantity,
        } => {
            let mut criteria = MatchCriteria::new(term.as_str(), label);
            if let Some(detail) = detail {
                criteria = criteria.with_detail(detail);
            }
            let quantity = clamp_quantity(quantity, config.workflow.max_cart_quantity);
            workflow
                .cart_action(&term, &criteria, CartAction::Add(quantity))
                .await?;
        }
        Command::Remove {
            term,
            label,
            detail,
        } => {
            let mut criteria = MatchCriteria::new(term.as_str(), label);
            if let Some(detail) = detail {
                criteria = criteria.with_detail(detail);
            }
            workflow
                .cart_action(&term, &criteria, CartAction::Remove)
                .await?;
        }
    }

    Ok(())
}
