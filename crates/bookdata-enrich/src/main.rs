//! Bookdata Enrich - Catalog enrichment tool

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use bookdata_common::logging::{init_logging, LogConfig, LogLevel};
use bookdata_enrich::batch::{read_isbn_csv, BatchRunner};
use bookdata_enrich::config::EnrichConfig;
use bookdata_enrich::store::postgres::{DbConfig, PgCatalogStore};
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "bookdata-enrich")]
#[command(author, version, about = "Book catalog enrichment tool")]
struct Cli {
    /// What to enrich
    #[command(subcommand)]
    input: Input,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Input {
    /// Enrich stored records that are not yet enriched
    Pending {
        /// Maximum number of records to pick up
        #[arg(short, long)]
        limit: Option<i64>,
    },

    /// Enrich identifiers read from a CSV file
    Import {
        /// CSV file with an identifier column (isbn13/isbn10/isbn)
        csv_file: PathBuf,

        /// Identifier column name, when it is not one of the recognized ones
        #[arg(short, long)]
        column: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("bookdata-enrich".to_string())
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    init_logging(&log_config)?;

    let config = EnrichConfig::from_env()?;
    let store = Arc::new(PgCatalogStore::connect(&DbConfig::from_env()).await?);
    let runner = BatchRunner::new(&config, store)?;

    let summary = match cli.input {
        Input::Pending { limit } => {
            info!("enriching pending records");
            runner.run_pending(limit.unwrap_or(config.batch_size)).await?
        },
        Input::Import { csv_file, column } => {
            info!(file = %csv_file.display(), "enriching identifiers from CSV");
            let identifiers = read_isbn_csv(&csv_file, column.as_deref())?;
            info!(count = identifiers.len(), "loaded identifiers");
            runner.run(&identifiers).await
        },
    };

    info!(%summary, "enrichment run complete");
    if let Some(reason) = summary.stopped {
        warn!(%reason, "run stopped early; remaining items were not attempted");
    }

    Ok(())
}
