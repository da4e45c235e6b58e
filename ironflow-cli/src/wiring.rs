//! Shared plumbing used by both the `run` and `replay` subcommands: catalog/store
//! construction from optional JSON seed files, and the bus/manager/controller wiring every
//! mode of operation needs.

use std::path::Path;
use std::sync::Arc;

use ironflow_bus::EventBus;
use ironflow_engine::StrategyManager;
use ironflow_execution::{PaperExecutionClient, PaperExecutionConfig};
use ironflow_indicator::catalog::OutputShape;
use ironflow_indicator::{builtin, IndicatorVariant, VariantCatalog};
use ironflow_market::event::MarketEvent;
use ironflow_session::{Config, SessionController};
use ironflow_strategy::store::InMemoryStrategyStore;
use ironflow_strategy::{Strategy, StrategyStore};

use crate::error::CliError;

/// Maps a variant's `base_type` string to the built-in factory that implements it. Unknown
/// base types are a config-file error, not a panic — an operator typo'd the wrong name.
fn factory_for(base_type: &str) -> Option<(OutputShape, ironflow_indicator::catalog::IndicatorFactory)> {
    match base_type {
        "SMA" => Some((OutputShape::Scalar, builtin::sma_factory as _)),
        "EMA" => Some((OutputShape::Scalar, builtin::ema_factory as _)),
        "RSI" => Some((OutputShape::Scalar, builtin::rsi_factory as _)),
        "BOLLINGER_BANDS" => Some((OutputShape::Composite, builtin::bollinger_bands_factory as _)),
        "PERCENT_CHANGE" => Some((OutputShape::Scalar, builtin::percent_change_factory as _)),
        _ => None,
    }
}

/// Builds a [`VariantCatalog`] from a JSON file holding a `Vec<IndicatorVariant>`. A
/// missing path yields an empty catalog rather than an error — a session with no
/// indicator-driven strategies legitimately needs none registered.
pub fn load_catalog(path: Option<&Path>) -> Result<VariantCatalog, CliError> {
    let mut catalog = VariantCatalog::new();
    let Some(path) = path else { return Ok(catalog) };
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CliError::Config(format!("reading {}: {e}", path.display())))?;
    let variants: Vec<IndicatorVariant> =
        serde_json::from_str(&raw).map_err(|e| CliError::Config(format!("parsing {}: {e}", path.display())))?;
    for variant in variants {
        let (output_shape, factory) = factory_for(&variant.base_type)
            .ok_or_else(|| CliError::Config(format!("unknown indicator base_type {:?}", variant.base_type)))?;
        let variant_id = variant.variant_id.clone();
        catalog
            .register(variant, output_shape, factory)
            .map_err(|e| CliError::Config(format!("registering variant {variant_id}: {e}")))?;
    }
    Ok(catalog)
}

/// Seeds an [`InMemoryStrategyStore`] from a JSON file holding a `Vec<Strategy>`. Each
/// strategy still goes through the store's own schema validation on `create`; a rejected
/// strategy is logged and skipped rather than aborting the whole load.
pub async fn load_strategies(
    path: Option<&Path>,
    store: &InMemoryStrategyStore,
) -> Result<usize, CliError> {
    let Some(path) = path else { return Ok(0) };
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CliError::Config(format!("reading {}: {e}", path.display())))?;
    let strategies: Vec<Strategy> =
        serde_json::from_str(&raw).map_err(|e| CliError::Config(format!("parsing {}: {e}", path.display())))?;
    let mut loaded = 0;
    for strategy in strategies {
        let strategy_id = strategy.strategy_id.clone();
        match store.create(strategy).await {
            Ok(()) => loaded += 1,
            Err(error) => tracing::warn!(%strategy_id, %error, "skipping strategy that failed to load"),
        }
    }
    Ok(loaded)
}

/// Every `variant_id` referenced by any enabled strategy currently in `store`, deduplicated.
/// This is what the indicator engine actually needs to run, so it must be computed from the
/// seeded store before `build_pipeline` constructs the engine's `IndicatorEngineConfig` --
/// otherwise the engine instantiates nothing and no indicator ever fires.
pub async fn referenced_variant_ids(store: &InMemoryStrategyStore) -> Vec<ironflow_core::VariantId> {
    let mut seen = Vec::new();
    for strategy in store.get_enabled().await {
        for variant_id in strategy.referenced_variant_ids() {
            if !seen.contains(variant_id) {
                seen.push(variant_id.clone());
            }
        }
    }
    seen
}

/// Everything the `run` and `replay` subcommands need: the market-facing bus plus the
/// fully wired strategy manager and session controller sitting behind it.
pub struct Pipeline {
    pub market_bus: Arc<EventBus<MarketEvent>>,
    pub order_bus: Arc<EventBus<ironflow_execution::OrderEvent>>,
    pub execution: Arc<PaperExecutionClient>,
    pub indicator_engine: Arc<ironflow_indicator::IndicatorEngine>,
    pub store: Arc<InMemoryStrategyStore>,
    pub manager: Arc<StrategyManager>,
    pub controller: Arc<SessionController>,
}

pub fn build_pipeline(
    config: &Config,
    catalog: Arc<VariantCatalog>,
    variant_ids: Vec<ironflow_core::VariantId>,
    store: Arc<InMemoryStrategyStore>,
    budget_cap: f64,
) -> Pipeline {
    let publish_deadline = std::time::Duration::from_millis(config.bus.publish_deadline_ms);
    let market_bus = Arc::new(EventBus::new(publish_deadline));
    let indicator_bus = Arc::new(EventBus::new(publish_deadline));
    let order_bus = Arc::new(EventBus::new(publish_deadline));
    let position_bus = Arc::new(EventBus::new(publish_deadline));
    let engine_bus = Arc::new(EventBus::new(publish_deadline));
    let session_bus = Arc::new(EventBus::new(publish_deadline));

    let execution = Arc::new(PaperExecutionClient::new(
        PaperExecutionConfig {
            slippage_bps: config.execution.slippage_bps,
            commission_bps: config.execution.commission_bps,
            min_qty: config.execution.min_qty,
            budget_cap,
        },
        order_bus.clone(),
        position_bus.clone(),
    ));

    let indicator_engine = Arc::new(ironflow_indicator::IndicatorEngine::new(
        catalog.clone(),
        ironflow_indicator::engine::IndicatorEngineConfig {
            variant_ids,
            epsilon: config.indicator.epsilon,
            tick_through_every: (config.indicator.tick_through_every > 0)
                .then_some(config.indicator.tick_through_every),
        },
    ));

    let manager = Arc::new(StrategyManager::new(
        store.clone() as Arc<dyn ironflow_strategy::StrategyStore>,
        catalog,
        indicator_bus.clone(),
        order_bus.clone(),
        position_bus.clone(),
        engine_bus,
        execution.clone() as Arc<dyn ironflow_execution::ExecutionClient>,
        budget_cap,
    ));

    let controller = Arc::new(SessionController::new(manager.clone(), session_bus, config.clone()));

    let market_indicator_sub = market_bus.subscribe(
        "market.*",
        ironflow_bus::topic::MARKET_PRICE_UPDATE,
        config.bus.indicator_queue_capacity,
        ironflow_bus::SlowConsumerPolicy::DropOldest,
    );
    tokio::spawn(indicator_engine.clone().run(market_indicator_sub, indicator_bus));

    let market_execution_sub = market_bus.subscribe(
        "market.*",
        ironflow_bus::topic::MARKET_PRICE_UPDATE,
        config.bus.indicator_queue_capacity,
        ironflow_bus::SlowConsumerPolicy::DropOldest,
    );
    tokio::spawn(execution.clone().run(market_execution_sub));

    Pipeline { market_bus, order_bus, execution, indicator_engine, store, manager, controller }
}
