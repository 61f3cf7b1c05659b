//! Command-line entry point.
//!
//! Subcommands mirror the pipeline stages: fetch raw history, derive
//! deltas, build the lagged dataset, run the training tournament, answer
//! forecast queries, and run the online-update cycle.

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use deltacast::api::QuoteClient;
use deltacast::data::{compute_deltas, Channel, DeltaStore, OhlcStore, TableStore};
use deltacast::features::{build_rows, Dataset};
use deltacast::predict::{run_update_cycle, PredictionService};
use deltacast::registry::ModelRegistry;
use deltacast::train::train_best;
use deltacast::{Config, LagPolicy};
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "deltacast")]
#[command(about = "Next-day OHLC delta forecasting")]
struct Cli {
    /// Directory holding per-symbol CSV stores
    #[arg(long, default_value = "markets")]
    data_dir: PathBuf,

    /// Directory holding champion model artifacts
    #[arg(long, default_value = "models")]
    model_dir: PathBuf,

    /// Symbol served by the prediction endpoint
    #[arg(long, default_value = "AAPL")]
    symbol: String,

    /// Give the first delta bar a zero-lagged feature row instead of
    /// dropping it
    #[arg(long)]
    zero_fill: bool,

    /// Exclude the date ordinal from the feature vector
    #[arg(long)]
    no_timestamp: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download historical daily OHLC bars for the configured symbols
    Fetch {
        /// First day of the window (defaults to the configured history start)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last day of the window (defaults to today)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Fetch every configured symbol, not just the primary one
        #[arg(long)]
        all: bool,
    },

    /// Derive and persist the delta series for the primary symbol
    Deltas,

    /// Build the lagged-feature dataset for the primary symbol
    Dataset,

    /// Train champions for all four channels
    Train,

    /// Forecast the bar for a calendar date
    Predict {
        /// Date to forecast, e.g. 2020-01-02
        #[arg(long)]
        date: NaiveDate,
    },

    /// Fold newly realized bars into the stores and champions
    Update {
        /// Keep running, one cycle every this many seconds
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

fn build_config(cli: &Cli) -> Config {
    let mut config = Config::default()
        .with_data_dir(&cli.data_dir)
        .with_model_dir(&cli.model_dir);
    config.primary_symbol = cli.symbol.clone();
    if cli.zero_fill {
        config.lag_policy = LagPolicy::ZeroFill;
    }
    if cli.no_timestamp {
        config.include_timestamp = false;
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = build_config(&cli);

    match cli.command {
        Commands::Fetch { start, end, all } => {
            let start = start.unwrap_or(config.history_start);
            let end = end.unwrap_or_else(|| Utc::now().date_naive());
            let client = QuoteClient::new();

            let symbols: Vec<String> = if all {
                config.symbols.clone()
            } else {
                vec![config.primary_symbol.clone()]
            };

            for symbol in symbols {
                info!(%symbol, %start, %end, "fetching history");
                match client.fetch(&symbol, start, end).await {
                    Ok(bars) => {
                        let count = bars.len();
                        OhlcStore::new(config.ohlc_path(&symbol))
                            .write_all(bars)
                            .with_context(|| format!("writing OHLC store for {symbol}"))?;
                        info!(%symbol, count, "history stored");
                    }
                    Err(err) => warn!(%symbol, %err, "fetch failed, skipping symbol"),
                }
            }
        }

        Commands::Deltas => {
            let symbol = &config.primary_symbol;
            let mut ohlc_store = OhlcStore::new(config.ohlc_path(symbol));
            let bars = ohlc_store.rows().context("reading OHLC store")?.to_vec();
            let deltas = compute_deltas(&bars).context("computing deltas")?;
            let count = deltas.len();
            DeltaStore::new(config.delta_path(symbol))
                .write_all(deltas)
                .context("writing delta store")?;
            info!(%symbol, count, "delta series stored");
        }

        Commands::Dataset => {
            let symbol = &config.primary_symbol;
            let mut delta_store = DeltaStore::new(config.delta_path(symbol));
            let deltas = delta_store.rows().context("reading delta store")?.to_vec();
            let rows = build_rows(&deltas, config.lag_policy).context("building feature rows")?;
            let count = rows.len();
            TableStore::new(config.dataset_path())
                .write_all(rows)
                .context("writing dataset")?;
            info!(%symbol, count, "lagged dataset stored");
        }

        Commands::Train => {
            let mut dataset_store = TableStore::new(config.dataset_path());
            let rows = dataset_store.rows().context("reading dataset")?.to_vec();
            let registry = ModelRegistry::new(&config.model_dir);

            for channel in Channel::ALL {
                let dataset = Dataset::from_rows(&rows, channel, config.include_timestamp);
                let champion = train_best(&dataset, channel, &config)
                    .with_context(|| format!("training channel {channel}"))?;
                info!(
                    %channel,
                    family = champion.model.family(),
                    rmse = champion.holdout_rmse,
                    "champion trained"
                );
                registry.save(&champion).context("persisting champion")?;
            }
        }

        Commands::Predict { date } => {
            let registry = ModelRegistry::new(&config.model_dir);
            let mut service = PredictionService::new(&config, &registry);
            let forecast = service.query(date)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "open": forecast.open,
                    "close": forecast.close,
                    "high": forecast.high,
                    "low": forecast.low,
                }))?
            );
        }

        Commands::Update { interval_secs } => {
            run_update(&config).await?;
            if let Some(secs) = interval_secs {
                let mut ticker = tokio::time::interval(std::time::Duration::from_secs(secs));
                ticker.tick().await; // the first tick fires immediately
                loop {
                    ticker.tick().await;
                    if let Err(err) = run_update(&config).await {
                        warn!(%err, "update cycle failed, will retry next interval");
                    }
                }
            }
        }
    }

    Ok(())
}

/// One online-update pass: fetch bars newer than the store and fold each
/// into history and the champions.
async fn run_update(config: &Config) -> anyhow::Result<()> {
    let symbol = config.primary_symbol.clone();
    let mut ohlc_store = OhlcStore::new(config.ohlc_path(&symbol));
    let mut delta_store = DeltaStore::new(config.delta_path(&symbol));
    let mut dataset_store = TableStore::new(config.dataset_path());
    let registry = ModelRegistry::new(&config.model_dir);

    let last_date = ohlc_store
        .rows()
        .context("reading OHLC store")?
        .last()
        .map(|bar| bar.date)
        .context("OHLC store is empty; run fetch first")?;

    let today = Utc::now().date_naive();
    if last_date >= today {
        info!(%symbol, %last_date, "history already current");
        return Ok(());
    }

    let client = QuoteClient::new();
    let bars = client
        .fetch(&symbol, last_date, today)
        .await
        .map_err(deltacast::DeltacastError::from)?;
    let fresh: Vec<_> = bars.into_iter().filter(|bar| bar.date > last_date).collect();
    if fresh.is_empty() {
        info!(%symbol, "no new bars to fold in");
        return Ok(());
    }

    for bar in fresh {
        let date = bar.date;
        run_update_cycle(
            config,
            &mut ohlc_store,
            &mut delta_store,
            &mut dataset_store,
            &registry,
            bar,
        )
        .with_context(|| format!("update cycle for {date}"))?;
    }
    Ok(())
}
