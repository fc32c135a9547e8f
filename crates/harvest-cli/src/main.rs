//! `harvest`: load futures settlements and CFTC positioning into SQLite and
//! export a flat price matrix.
//!
//! # Usage
//!
//! ```text
//! harvest market sync                     # first run, then daily updates
//! harvest positioning backfill            # once, full history
//! harvest positioning update              # weekly, after Tuesday's report
//! harvest export --from 2017-01-01 --output prices.csv
//! ```

mod settings;

use std::path::PathBuf;

use anyhow::Context as _;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use harvest_core::{
  calendar::DateWindow,
  export::ExportFlattener,
  loader::{LoadMode, PositioningLoader},
  reference::ReferenceData,
  sync::MarketSync,
};
use harvest_quandl::QuandlClient;
use harvest_store_sqlite::{SqliteMarketStore, SqlitePositioningStore};
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Commodity market-data loader")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "harvest.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Daily futures settlements.
  Market {
    #[command(subcommand)]
    action: MarketAction,
  },
  /// Weekly CFTC Commitments of Traders.
  Positioning {
    #[command(subcommand)]
    action: PositioningAction,
  },
  /// Write the date x contract price matrix as CSV.
  Export {
    #[arg(long, value_name = "YYYY-MM-DD")]
    from:   Option<NaiveDate>,
    #[arg(long, value_name = "YYYY-MM-DD")]
    to:     Option<NaiveDate>,
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
  },
}

#[derive(Subcommand)]
enum MarketAction {
  /// Sync every contract from the day after the last stored date.
  Sync {
    /// Override the window start; must be after the last stored date.
    #[arg(long, value_name = "YYYY-MM-DD")]
    start: Option<NaiveDate>,
    /// Override the window end (default: today).
    #[arg(long, value_name = "YYYY-MM-DD")]
    end:   Option<NaiveDate>,
  },
}

#[derive(Subcommand)]
enum PositioningAction {
  /// Load the full history into an empty database.
  Backfill,
  /// Load the report for the most recent Tuesday.
  Update,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;
  let today = Local::now().date_naive();

  match cli.command {
    Command::Market { action: MarketAction::Sync { start, end } } => {
      let reference = ReferenceData::load(&settings.market.reference).with_context(|| {
        format!("failed to read reference data {:?}", settings.market.reference)
      })?;
      let provider = QuandlClient::new(settings.provider.clone())?;
      let store = SqliteMarketStore::open(&settings.market.database)
        .await
        .with_context(|| format!("failed to open store at {:?}", settings.market.database))?;

      MarketSync::new(&settings.market, &reference, &provider, &store)
        .run(start, end, today)
        .await
        .context("market sync failed")?;
    }

    Command::Positioning { action } => {
      let mode = match action {
        PositioningAction::Backfill => LoadMode::Backfill,
        PositioningAction::Update => LoadMode::Update,
      };
      let reference = ReferenceData::load(&settings.positioning.reference).with_context(|| {
        format!("failed to read reference data {:?}", settings.positioning.reference)
      })?;
      let provider = QuandlClient::new(settings.provider.clone())?;
      let store = SqlitePositioningStore::open(&settings.positioning.database)
        .await
        .with_context(|| {
          format!("failed to open store at {:?}", settings.positioning.database)
        })?;

      PositioningLoader::new(&settings.positioning, &reference, &provider, &store)
        .run(mode, today)
        .await
        .context("positioning sync failed")?;
    }

    Command::Export { from, to, output } => {
      let from = from.unwrap_or(settings.export.from);
      let to = to.or(settings.export.to).unwrap_or(today);
      let output = output.unwrap_or_else(|| settings.export.output.clone());

      let store = SqliteMarketStore::open(&settings.export.database)
        .await
        .with_context(|| format!("failed to open store at {:?}", settings.export.database))?;

      ExportFlattener::new(&store)
        .export_to_path(DateWindow::new(from, to)?, &output)
        .await
        .with_context(|| format!("failed to export to {}", output.display()))?;
    }
  }

  Ok(())
}
