//! The indicator engine: feeds market events through a per-symbol shard of running
//! indicator instances and emits values onto the bus.

use crate::catalog::VariantCatalog;
use crate::error::IndicatorError;
use crate::value::IndicatorValue;
use dashmap::DashMap;
use indexmap::IndexMap;
use ironflow_bus::{bus::EventBus, event::Delivery, topic};
use ironflow_core::{Symbol, Timestamp, VariantId};
use ironflow_market::event::MarketEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Which variants run for every symbol the engine observes. All symbols get the same set
/// of variants; a per-symbol override is not needed by anything in scope today.
#[derive(Debug, Clone)]
pub struct IndicatorEngineConfig {
    pub variant_ids: Vec<VariantId>,
    /// Minimum absolute change from the last emitted value required to emit again.
    pub epsilon: f64,
    /// Force an emission at least every `N` non-stale samples even if the value hasn't
    /// moved by more than `epsilon`, so a consumer can tell the indicator is still being
    /// fed rather than stuck. `None` disables tick-through: a flat value is suppressed
    /// indefinitely until it actually moves.
    pub tick_through_every: Option<u32>,
}

impl Default for IndicatorEngineConfig {
    fn default() -> Self {
        Self { variant_ids: Vec::new(), epsilon: 1e-9, tick_through_every: None }
    }
}

struct SymbolShard {
    instances: std::sync::Mutex<IndexMap<VariantId, Box<dyn crate::catalog::Indicator>>>,
    last_emitted_ts: std::sync::Mutex<IndexMap<VariantId, Timestamp>>,
    last_emitted_value: std::sync::Mutex<IndexMap<VariantId, f64>>,
    samples_since_emit: std::sync::Mutex<IndexMap<VariantId, u32>>,
}

/// Per-symbol sharded indicator runtime. Each shard is independently locked so unrelated
/// symbols never contend; within a shard, indicators update synchronously in the order
/// ticks are delivered.
pub struct IndicatorEngine {
    catalog: Arc<VariantCatalog>,
    config: IndicatorEngineConfig,
    shards: DashMap<Symbol, SymbolShard>,
    error_counters: DashMap<VariantId, AtomicU64>,
}

impl std::fmt::Debug for IndicatorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorEngine")
            .field("symbols_tracked", &self.shards.len())
            .field("variants", &self.config.variant_ids.len())
            .finish()
    }
}

impl IndicatorEngine {
    pub fn new(catalog: Arc<VariantCatalog>, config: IndicatorEngineConfig) -> Self {
        Self {
            catalog,
            config,
            shards: DashMap::new(),
            error_counters: DashMap::new(),
        }
    }

    /// Number of times `variant_id` produced a NaN/Inf result and was suppressed rather
    /// than emitted.
    pub fn suppressed_count(&self, variant_id: &VariantId) -> u64 {
        self.error_counters
            .get(variant_id)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    fn ensure_shard(&self, symbol: &Symbol) -> Result<(), IndicatorError> {
        if self.shards.contains_key(symbol) {
            return Ok(());
        }
        let mut instances = IndexMap::new();
        for variant_id in &self.config.variant_ids {
            let instance = self.catalog.instantiate(variant_id)?;
            instances.insert(variant_id.clone(), instance);
        }
        self.shards.entry(symbol.clone()).or_insert_with(|| SymbolShard {
            instances: std::sync::Mutex::new(instances),
            last_emitted_ts: std::sync::Mutex::new(IndexMap::new()),
            last_emitted_value: std::sync::Mutex::new(IndexMap::new()),
            samples_since_emit: std::sync::Mutex::new(IndexMap::new()),
        });
        Ok(())
    }

    /// Feeds a single `(symbol, ts, price)` sample through every configured variant for
    /// that symbol, returning the values that were actually emitted (i.e. not suppressed
    /// as NaN/Inf and not stale relative to that variant's last emission).
    pub fn on_sample(
        &self,
        symbol: &Symbol,
        ts: Timestamp,
        price: f64,
    ) -> Result<Vec<IndicatorValue>, IndicatorError> {
        self.ensure_shard(symbol)?;
        let shard = self.shards.get(symbol).expect("shard just ensured");

        let mut instances = shard.instances.lock().expect("shard instances poisoned");
        let mut last_emitted = shard.last_emitted_ts.lock().expect("shard last_emitted poisoned");
        let mut last_value = shard.last_emitted_value.lock().expect("shard last_value poisoned");
        let mut since_emit = shard.samples_since_emit.lock().expect("shard since_emit poisoned");
        let mut emitted = Vec::new();

        for (variant_id, indicator) in instances.iter_mut() {
            let output = indicator.on_sample(ts, price);
            match output {
                None => {
                    self.error_counters
                        .entry(variant_id.clone())
                        .or_insert_with(|| AtomicU64::new(0));
                }
                Some(output) if !output.is_finite() => {
                    self.error_counters
                        .entry(variant_id.clone())
                        .or_insert_with(|| AtomicU64::new(0))
                        .fetch_add(1, Ordering::SeqCst);
                }
                Some(output) => {
                    let is_stale = last_emitted.get(variant_id).is_some_and(|prev| ts <= *prev);
                    if is_stale {
                        continue;
                    }

                    let samples_since = since_emit.entry(variant_id.clone()).or_insert(0);
                    *samples_since += 1;
                    let tick_through_due = self
                        .config
                        .tick_through_every
                        .is_some_and(|every| every > 0 && *samples_since >= every);
                    let differs_enough = match (output.as_scalar(), last_value.get(variant_id)) {
                        (Some(new), Some(prev)) => (new - prev).abs() > self.config.epsilon,
                        // nothing to diff against yet, or a composite with no scalar
                        // projection: treat as a change so the first reading is never lost.
                        (_, None) | (None, _) => true,
                    };
                    if !differs_enough && !tick_through_due {
                        continue;
                    }

                    last_emitted.insert(variant_id.clone(), ts);
                    if let Some(scalar) = output.as_scalar() {
                        last_value.insert(variant_id.clone(), scalar);
                    }
                    *samples_since = 0;
                    emitted.push(IndicatorValue {
                        variant_id: variant_id.clone(),
                        symbol: symbol.clone(),
                        ts,
                        value: output,
                        metadata: IndexMap::new(),
                    });
                }
            }
        }

        Ok(emitted)
    }

    /// Consumes `input` (a bus subscription over raw market events) and publishes emitted
    /// indicator values onto `output` until the subscription is closed. Runs until the
    /// upstream subscription is explicitly closed — intended to be spawned as a task.
    pub async fn run(
        self: Arc<Self>,
        input: ironflow_bus::subscription::Subscriber<MarketEvent>,
        output: Arc<EventBus<IndicatorValue>>,
    ) {
        while let Some(delivery) = input.recv().await {
            let envelope = match delivery {
                Delivery::Item(envelope) => envelope,
                Delivery::Gap(gap) => {
                    tracing::warn!(dropped_total = gap.dropped_total, "indicator engine observed a gap on market input");
                    continue;
                }
            };

            let (symbol, ts, price) = match &envelope.payload {
                MarketEvent::Tick { symbol, tick } => (symbol.clone(), tick.ts, tick.close),
                MarketEvent::Trade { symbol, trade } => (symbol.clone(), trade.ts, trade.price),
                MarketEvent::Orderbook { symbol, snapshot } => match snapshot.mid() {
                    Some(mid) => (symbol.clone(), snapshot.ts, mid),
                    None => continue,
                },
                MarketEvent::Reconnected { .. } => continue,
            };

            match self.on_sample(&symbol, ts, price) {
                Ok(values) => {
                    for value in values {
                        output.publish(topic::INDICATOR_UPDATED, "indicator_engine", value).await;
                    }
                }
                Err(error) => {
                    tracing::error!(%error, %symbol, "indicator engine failed to process sample");
                }
            }
        }
    }
}
