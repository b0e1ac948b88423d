#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the auction results ingestion tool.

use std::path::PathBuf;
use std::time::Instant;

use auction_watch_database::{
    DEFAULT_DB_PATH, count_auction_records, count_records_for_day, open_db,
};
use auction_watch_ingest::{DEFAULT_PAGE_SIZE, Ingestor, SqliteSink};
use auction_watch_models::{DEFAULT_PARTICIPANT, QueryScope};
use auction_watch_source::AuctionApi;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "auction_watch_ingest",
    about = "National Grid ESO auction results ingestion tool"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one day's auction results and append them to the local store
    Run {
        /// Records to request per page
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u64,
        /// Path to the SQLite database
        #[arg(long, default_value = DEFAULT_DB_PATH)]
        db: PathBuf,
        /// Delivery day to ingest (UTC, `YYYY-MM-DD`). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Registered auction participant to filter on
        #[arg(long, default_value = DEFAULT_PARTICIPANT)]
        participant: String,
    },
    /// Create the local store schema if it does not exist
    Migrate {
        /// Path to the SQLite database
        #[arg(long, default_value = DEFAULT_DB_PATH)]
        db: PathBuf,
    },
    /// Show row counts for the local store
    Stats {
        /// Path to the SQLite database
        #[arg(long, default_value = DEFAULT_DB_PATH)]
        db: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate { db } => {
            let _db = open_db(&db).await?;
            log::info!("Schema ready at {}", db.display());
        }
        Commands::Stats { db } => {
            let handle = open_db(&db).await?;
            let total = count_auction_records(handle.as_ref()).await?;
            let today = Utc::now().date_naive().to_string();
            let today_count = count_records_for_day(handle.as_ref(), &today).await?;
            println!("{total} auction results in {} ({today_count} ingested {today})", db.display());
        }
        Commands::Run {
            page_size,
            db,
            date,
            participant,
        } => {
            let today = Utc::now().date_naive();
            let day = date.unwrap_or(today);
            let scope = QueryScope::new(participant, day);

            log::info!(
                "Ingesting auction results for {} on {day} (page size {page_size})",
                scope.participant
            );

            let start = Instant::now();
            let handle = open_db(&db).await?;
            let api = AuctionApi::new(scope);
            let sink = SqliteSink::new(handle.as_ref());

            let report = Ingestor::new(&api, &sink, today)
                .with_page_size(page_size)
                .run()
                .await?;

            log::info!(
                "Ingestion complete: {}/{} records committed in {} page(s), took {:.1}s",
                report.ingested,
                report.total_available,
                report.pages,
                start.elapsed().as_secs_f64()
            );
        }
    }

    Ok(())
}
