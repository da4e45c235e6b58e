use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use ironflow_core::{StrategyId, Symbol};
use ironflow_session::{Config, SessionMode, SessionRequest};
use ironflow_strategy::store::InMemoryStrategyStore;
use ironflow_strategy::StrategyStore;

use crate::error::CliError;
use crate::wiring;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to a TOML config file; a missing file falls back to built-in defaults.
    #[arg(long, default_value = "ironflow.toml")]
    pub config: PathBuf,

    #[arg(long, value_enum, default_value = "paper")]
    pub mode: ModeArg,

    /// Comma-separated list of symbols this session trades.
    #[arg(long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Optional JSON file of strategy definitions to seed the in-memory store with.
    #[arg(long)]
    pub strategies_file: Option<PathBuf>,

    /// Optional JSON file of indicator variants to register.
    #[arg(long)]
    pub variants_file: Option<PathBuf>,

    #[arg(long, default_value_t = 10_000.0)]
    pub budget_cap: f64,

    /// Return the existing session id instead of refusing on a symbol-overlap conflict.
    #[arg(long)]
    pub idempotent: bool,

    /// Close open positions when the session is stopped (Ctrl-C), instead of leaving them
    /// for a future session to manage.
    #[arg(long)]
    pub close_positions_on_stop: bool,

    #[arg(long)]
    pub json_logs: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum ModeArg {
    Paper,
    Live,
    Backtest,
}

impl From<ModeArg> for SessionMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Paper => SessionMode::Paper,
            ModeArg::Live => SessionMode::Live,
            ModeArg::Backtest => SessionMode::Backtest,
        }
    }
}

pub async fn run(args: RunArgs) -> Result<(), CliError> {
    if args.json_logs {
        ironflow_core::logging::init_json_logging();
    } else {
        ironflow_core::logging::init_logging();
    }

    let config = Config::load(&args.config)?;
    let catalog = Arc::new(wiring::load_catalog(args.variants_file.as_deref())?);
    let store = Arc::new(InMemoryStrategyStore::new(catalog.clone()));
    let loaded = wiring::load_strategies(args.strategies_file.as_deref(), &store).await?;
    tracing::info!(loaded, "seeded strategy store");

    let variant_ids = wiring::referenced_variant_ids(&store).await;
    let pipeline = wiring::build_pipeline(&config, catalog, variant_ids, store, args.budget_cap);

    let symbols: Vec<Symbol> = args.symbols.iter().map(|s| Symbol::new(s.as_str())).collect();
    let strategies: Vec<StrategyId> =
        pipeline.store.get_enabled().await.into_iter().map(|s| s.strategy_id).collect();

    let request = SessionRequest {
        mode: args.mode.into(),
        symbols,
        strategies,
        budget_cap: args.budget_cap,
        idempotent: args.idempotent,
    };

    let session_id = pipeline.controller.start(request).await?;
    tracing::info!(%session_id, "session started, awaiting Ctrl-C");

    tokio::signal::ctrl_c().await.map_err(|e| CliError::Config(format!("signal handler: {e}")))?;
    tracing::info!(%session_id, "stopping session");
    pipeline.controller.stop(&session_id, args.close_positions_on_stop).await?;

    Ok(())
}
