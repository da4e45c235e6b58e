use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use ironflow_core::{Symbol, Timestamp};
use ironflow_market::event::{MarketEvent, Tick};
use ironflow_market::sequencer::{SequenceOutcome, Sequencer};
use ironflow_session::{Config, SessionMode, SessionRequest};
use ironflow_strategy::StrategyStore;

use crate::error::CliError;
use crate::wiring;

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Path to a TOML config file; a missing file falls back to built-in defaults.
    #[arg(long, default_value = "ironflow.toml")]
    pub config: PathBuf,

    /// JSON Lines file: one `Tick` object per line, e.g. `{"symbol":"BTCUSDT","ts_millis":...}`.
    pub ticks_file: PathBuf,

    #[arg(long)]
    pub strategies_file: Option<PathBuf>,

    #[arg(long)]
    pub variants_file: Option<PathBuf>,

    #[arg(long, default_value_t = 10_000.0)]
    pub budget_cap: f64,
}

/// On-disk shape for one replay record: a `Symbol` alongside the bar it produced.
#[derive(Debug, serde::Deserialize)]
struct ReplayRecord {
    symbol: String,
    ts_millis: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    trades_count: u64,
    #[serde(default)]
    vwap: Option<f64>,
}

pub async fn run(args: ReplayArgs) -> Result<(), CliError> {
    ironflow_core::logging::init_logging();

    let config = Config::load(&args.config)?;
    let catalog = Arc::new(wiring::load_catalog(args.variants_file.as_deref())?);
    let store = Arc::new(ironflow_strategy::store::InMemoryStrategyStore::new(catalog.clone()));
    let loaded = wiring::load_strategies(args.strategies_file.as_deref(), &store).await?;
    tracing::info!(loaded, "seeded strategy store");

    let variant_ids = wiring::referenced_variant_ids(&store).await;
    let pipeline = wiring::build_pipeline(&config, catalog, variant_ids, store, args.budget_cap);

    let raw = std::fs::read_to_string(&args.ticks_file)
        .map_err(|e| CliError::Config(format!("reading {}: {e}", args.ticks_file.display())))?;
    let records: Vec<ReplayRecord> = raw
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .map_err(|e| CliError::Config(format!("parsing {}: {e}", args.ticks_file.display())))
        })
        .collect::<Result<_, _>>()?;

    let symbols: Vec<Symbol> = {
        let mut seen = Vec::new();
        for record in &records {
            let symbol = Symbol::new(record.symbol.as_str());
            if !seen.contains(&symbol) {
                seen.push(symbol);
            }
        }
        seen
    };
    let strategies = pipeline.store.get_enabled().await.into_iter().map(|s| s.strategy_id).collect();

    let request = SessionRequest {
        mode: SessionMode::Backtest,
        symbols,
        strategies,
        budget_cap: args.budget_cap,
        idempotent: false,
    };
    let session_id = pipeline.controller.start(request).await?;

    let sequencer = Sequencer::new(Duration::from_millis(config.market.staleness_tolerance_ms));
    let mut accepted = 0usize;
    let mut dropped = 0usize;
    for record in records {
        let symbol = Symbol::new(record.symbol.as_str());
        let ts = Timestamp::from_millis(record.ts_millis);
        match sequencer.observe(&symbol, ts) {
            SequenceOutcome::Accept => {
                accepted += 1;
                let tick = Tick {
                    symbol_idx: 0,
                    ts,
                    open: record.open,
                    high: record.high,
                    low: record.low,
                    close: record.close,
                    volume: record.volume,
                    trades_count: record.trades_count,
                    vwap: record.vwap,
                };
                pipeline
                    .market_bus
                    .publish(ironflow_bus::topic::MARKET_PRICE_UPDATE, "replay", MarketEvent::Tick { symbol, tick })
                    .await;
            }
            SequenceOutcome::DuplicateDropped | SequenceOutcome::StaleDropped => dropped += 1,
        }
    }

    // Give the background indicator/execution tasks a chance to drain what was just published
    // before the session is torn down; the replay file is finite so there is no live tail to wait on.
    tokio::time::sleep(Duration::from_millis(200)).await;

    pipeline.controller.stop(&session_id, false).await?;

    let open_positions = pipeline.execution.open_positions();
    println!("replayed {accepted} ticks ({dropped} dropped out of order)");
    println!("open positions at end of replay: {}", open_positions.len());
    for position in &open_positions {
        println!(
            "  {} {} qty={} entry={} unrealized_pnl={}",
            position.symbol, position.strategy_id, position.qty, position.entry_price, position.unrealized_pnl
        );
    }

    Ok(())
}
