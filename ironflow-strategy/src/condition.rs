//! The [`Condition`] model: a single comparison against an indicator's latest value, with
//! optional duration/window predicates layered on top of the raw comparison.

use ironflow_core::{Timestamp, VariantId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Between,
    InSet,
}

/// The comparison target: a single scalar, an inclusive `[lo, hi]` range, or a discrete set
/// of acceptable values. Which variant is legal depends on [`Operator`] — see
/// [`Condition::validate_shape`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComparisonTarget {
    Scalar(f64),
    Range([f64; 2]),
    Set(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: String,
    pub variant_id: VariantId,
    pub operator: Operator,
    pub target: ComparisonTarget,
    /// Predicate must hold continuously for at least this long before the condition fires.
    pub duration_ms: Option<u64>,
    /// A true observation within this trailing window counts, regardless of current state.
    pub window_ms: Option<u64>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ConditionShapeError {
    BetweenRequiresRange,
    InSetRequiresNonEmptySet,
    ScalarOperatorRequiresScalar,
}

impl std::fmt::Display for ConditionShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BetweenRequiresRange => write!(f, "operator `between` requires a [lo, hi] range target"),
            Self::InSetRequiresNonEmptySet => write!(f, "operator `in_set` requires a non-empty set target"),
            Self::ScalarOperatorRequiresScalar => write!(f, "comparison operator requires a scalar target"),
        }
    }
}

impl Condition {
    /// Structural validity of `operator` against `target`'s shape — the concrete reading of
    /// "each condition's operator is valid for the variant's value type" for a system whose
    /// indicator outputs are always reducible to `f64` via `IndicatorOutput::as_scalar`.
    pub fn validate_shape(&self) -> Result<(), ConditionShapeError> {
        match (&self.operator, &self.target) {
            (Operator::Between, ComparisonTarget::Range(_)) => Ok(()),
            (Operator::Between, _) => Err(ConditionShapeError::BetweenRequiresRange),
            (Operator::InSet, ComparisonTarget::Set(values)) if !values.is_empty() => Ok(()),
            (Operator::InSet, _) => Err(ConditionShapeError::InSetRequiresNonEmptySet),
            (_, ComparisonTarget::Scalar(_)) => Ok(()),
            (_, _) => Err(ConditionShapeError::ScalarOperatorRequiresScalar),
        }
    }

    fn compares(&self, value: f64) -> bool {
        match (&self.operator, &self.target) {
            (Operator::Gt, ComparisonTarget::Scalar(v)) => value > *v,
            (Operator::Lt, ComparisonTarget::Scalar(v)) => value < *v,
            (Operator::Gte, ComparisonTarget::Scalar(v)) => value >= *v,
            (Operator::Lte, ComparisonTarget::Scalar(v)) => value <= *v,
            (Operator::Eq, ComparisonTarget::Scalar(v)) => (value - *v).abs() < f64::EPSILON,
            (Operator::Between, ComparisonTarget::Range([lo, hi])) => value >= *lo && value <= *hi,
            (Operator::InSet, ComparisonTarget::Set(values)) => {
                values.iter().any(|v| (value - *v).abs() < f64::EPSILON)
            }
            _ => false,
        }
    }
}

/// Per-condition runtime state held by an evaluator: the raw comparison result plus
/// whatever `duration_ms`/`window_ms` bookkeeping the condition requires.
#[derive(Debug, Clone, Default)]
pub struct ConditionState {
    last_value: Option<f64>,
    last_ts: Option<Timestamp>,
    true_since_ts: Option<Timestamp>,
    window_transitions: VecDeque<(Timestamp, bool)>,
}

impl ConditionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the latest observed value for this condition's variant, updating internal
    /// duration/window bookkeeping, and returns whether the condition is true *right now*
    /// per its `duration_ms`/`window_ms` modifiers (a plain condition with neither modifier
    /// fires immediately on a true raw comparison).
    pub fn observe(&mut self, condition: &Condition, ts: Timestamp, value: f64) -> bool {
        self.last_value = Some(value);
        self.last_ts = Some(ts);
        let raw_true = condition.compares(value);

        if !raw_true {
            self.true_since_ts = None;
        } else if self.true_since_ts.is_none() {
            self.true_since_ts = Some(ts);
        }

        if let Some(window_ms) = condition.window_ms {
            self.window_transitions.push_back((ts, raw_true));
            let cutoff = ts.as_millis().saturating_sub(window_ms as i64);
            while let Some((front_ts, _)) = self.window_transitions.front() {
                if front_ts.as_millis() < cutoff {
                    self.window_transitions.pop_front();
                } else {
                    break;
                }
            }
            return self.window_transitions.iter().any(|(_, was_true)| *was_true);
        }

        match condition.duration_ms {
            Some(duration_ms) => match self.true_since_ts {
                Some(since) => (ts.as_millis() - since.as_millis()) as u64 >= duration_ms,
                None => false,
            },
            None => raw_true,
        }
    }

    pub fn last_value(&self) -> Option<f64> {
        self.last_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gt(value: f64, duration_ms: Option<u64>) -> Condition {
        Condition {
            id: "c1".into(),
            variant_id: VariantId::from("rsi_14"),
            operator: Operator::Gt,
            target: ComparisonTarget::Scalar(value),
            duration_ms,
            window_ms: None,
        }
    }

    #[test]
    fn duration_zero_fires_on_first_true_observation() {
        let condition = gt(50.0, Some(0));
        let mut state = ConditionState::new();
        assert!(state.observe(&condition, Timestamp::from_millis(0), 60.0));
    }

    #[test]
    fn duration_resets_on_any_false_observation() {
        let condition = gt(50.0, Some(1_000));
        let mut state = ConditionState::new();
        assert!(!state.observe(&condition, Timestamp::from_millis(0), 60.0));
        assert!(!state.observe(&condition, Timestamp::from_millis(500), 40.0));
        // resets; not yet 1000ms since the reset at t=500
        assert!(!state.observe(&condition, Timestamp::from_millis(1_200), 60.0));
        assert!(state.observe(&condition, Timestamp::from_millis(1_500), 61.0));
    }

    #[test]
    fn window_predicate_counts_any_true_within_trailing_window() {
        let condition = Condition {
            window_ms: Some(2_000),
            ..gt(50.0, None)
        };
        let mut state = ConditionState::new();
        assert!(state.observe(&condition, Timestamp::from_millis(0), 60.0));
        assert!(state.observe(&condition, Timestamp::from_millis(1_000), 10.0));
        // still within the 2s window of the t=0 true observation
        assert!(state.observe(&condition, Timestamp::from_millis(1_900), 10.0));
        assert!(!state.observe(&condition, Timestamp::from_millis(3_000), 10.0));
    }

    #[test]
    fn between_requires_range_target() {
        let mut condition = gt(0.0, None);
        condition.operator = Operator::Between;
        condition.target = ComparisonTarget::Scalar(5.0);
        assert_eq!(condition.validate_shape(), Err(ConditionShapeError::BetweenRequiresRange));
    }

    proptest! {
        /// Once a condition's raw comparison stays continuously true, its `duration_ms`
        /// predicate fires exactly when elapsed time since the first true observation
        /// reaches the threshold — never earlier, never later.
        #[test]
        fn duration_predicate_fires_exactly_once_elapsed_time_reaches_the_threshold(
            duration_ms in 0u64..5_000,
            deltas in prop::collection::vec(1u64..500, 1..20),
        ) {
            let condition = gt(50.0, Some(duration_ms));
            let mut state = ConditionState::new();
            let mut ts_millis: i64 = 0;
            let mut first_true_ts: Option<i64> = None;
            for delta in deltas {
                ts_millis += delta as i64;
                let fired = state.observe(&condition, Timestamp::from_millis(ts_millis), 60.0);
                let first_true_ts = *first_true_ts.get_or_insert(ts_millis);
                let expected = (ts_millis - first_true_ts) as u64 >= duration_ms;
                prop_assert_eq!(fired, expected);
            }
        }

        /// The `window_ms` predicate is "some observation within the trailing window was
        /// true" — checked here against a naive scan over every observation seen so far.
        #[test]
        fn window_predicate_matches_a_naive_trailing_scan(
            window_ms in 100u64..5_000,
            threshold in 10.0f64..90.0,
            samples in prop::collection::vec((1u64..400, 0.0f64..100.0), 1..20),
        ) {
            let condition = Condition { window_ms: Some(window_ms), ..gt(threshold, None) };
            let mut state = ConditionState::new();
            let mut history: Vec<(i64, bool)> = Vec::new();
            let mut ts_millis: i64 = 0;
            for (delta, value) in samples {
                ts_millis += delta as i64;
                let raw_true = value > threshold;
                history.push((ts_millis, raw_true));
                let cutoff = ts_millis - window_ms as i64;
                let expected = history.iter().any(|&(t, was_true)| t >= cutoff && was_true);
                let actual = state.observe(&condition, Timestamp::from_millis(ts_millis), value);
                prop_assert_eq!(actual, expected);
            }
        }
    }
}
