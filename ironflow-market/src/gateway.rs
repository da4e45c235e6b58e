//! Venue connectivity abstraction with exponential backoff reconnection.
//!
//! A concrete adapter (MEXC, Binance, ...) implements [`GatewayConnection`] outside this
//! workspace; this crate only owns the reconnect/backoff policy and the normalization
//! pipeline (`Sequencer`) the adapter's raw stream is fed through.

use crate::{error::MarketDataError, event::MarketEvent};
use async_trait::async_trait;
use ironflow_core::{Symbol, Timestamp};
use std::time::Duration;

/// A single venue connection task implements this to supply raw (already symbol-tagged)
/// market events. `connect` may be called repeatedly by [`run_with_reconnect`] after a
/// disconnection.
#[async_trait]
pub trait GatewayConnection: Send {
    async fn connect(&mut self) -> Result<(), MarketDataError>;

    /// Pulls the next raw event, or `Ok(None)` if the underlying stream ended
    /// (triggering a reconnect).
    async fn next_event(&mut self) -> Result<Option<MarketEvent>, MarketDataError>;
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ReconnectionBackoffPolicy {
    pub backoff_ms_initial: u64,
    pub backoff_multiplier: u32,
    pub backoff_ms_max: u64,
}

impl Default for ReconnectionBackoffPolicy {
    fn default() -> Self {
        Self {
            backoff_ms_initial: 125,
            backoff_multiplier: 2,
            backoff_ms_max: 60_000,
        }
    }
}

impl ReconnectionBackoffPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self
            .backoff_ms_initial
            .saturating_mul(self.backoff_multiplier.saturating_pow(attempt) as u64);
        Duration::from_millis(scaled.min(self.backoff_ms_max))
    }
}

/// Wraps a [`GatewayConnection`], reconnecting with exponential backoff whenever the
/// stream ends or a connection attempt fails, and surfacing a `Reconnected` event marking
/// the missing interval so downstream indicator computations know to treat the gap.
pub async fn run_with_reconnect<C, F>(
    mut connection: C,
    symbol: Symbol,
    policy: ReconnectionBackoffPolicy,
    mut on_event: F,
) where
    C: GatewayConnection,
    F: FnMut(MarketEvent),
{
    let mut attempt = 0u32;
    let mut last_ts: Option<Timestamp> = None;

    loop {
        if let Err(error) = connection.connect().await {
            tracing::warn!(%error, attempt, "gateway connection attempt failed");
            tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
            attempt = attempt.saturating_add(1);
            continue;
        }

        if attempt > 0 {
            if let Some(gap_from) = last_ts {
                on_event(MarketEvent::Reconnected {
                    symbol: symbol.clone(),
                    gap_from,
                    gap_to: Timestamp::now(),
                });
            }
        }
        attempt = 0;

        loop {
            match connection.next_event().await {
                Ok(Some(event)) => {
                    last_ts = Some(event.ts());
                    on_event(event);
                }
                Ok(None) => {
                    tracing::info!(%symbol, "gateway stream ended, reconnecting");
                    break;
                }
                Err(error) => {
                    tracing::warn!(%error, %symbol, "gateway stream error, reconnecting");
                    break;
                }
            }
        }

        tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
        attempt = attempt.saturating_add(1);
    }
}
