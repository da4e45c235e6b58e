//! Schema validation rules 1–5.

use crate::error::{SectionError, StrategyValidationError};
use crate::strategy::Strategy;
use ironflow_indicator::VariantCatalog;

/// Validates `strategy` against every rule, collecting all violations rather than
/// short-circuiting on the first one so a caller sees the whole picture at once.
pub fn validate(strategy: &Strategy, catalog: &VariantCatalog) -> Result<(), StrategyValidationError> {
    let mut errors = Vec::new();

    // Rule 1: every referenced variant_id exists in the indicator catalog.
    for variant_id in strategy.referenced_variant_ids() {
        if !catalog.contains(variant_id) {
            errors.push(SectionError::new(
                "conditions",
                format!("variant_id {variant_id} is not registered in the indicator catalog"),
            ));
        }
    }

    // Rule 2: each condition's operator is structurally valid for its target shape.
    let sections: [(&'static str, &[crate::condition::Condition]); 5] = [
        ("s1_signal", &strategy.s1_signal.conditions),
        ("o1_cancel", &strategy.o1_cancel.conditions),
        ("z1_entry", &strategy.z1_entry.conditions),
        ("ze1_close", &strategy.ze1_close.conditions),
        ("emergency_exit", &strategy.emergency_exit.conditions),
    ];
    for (section, conditions) in sections {
        for condition in conditions {
            if let Err(shape_error) = condition.validate_shape() {
                errors.push(SectionError::new(
                    section,
                    format!("condition {}: {shape_error}", condition.id),
                ));
            }
        }
    }

    // Rule 3: z1_entry.leverage in [1, 10]; warn above 3, reject above 10.
    let leverage = strategy.z1_entry.leverage;
    if !(1.0..=10.0).contains(&leverage) {
        errors.push(SectionError::new(
            "z1_entry",
            format!("leverage {leverage} is outside the allowed [1, 10] range"),
        ));
    } else if leverage > 3.0 {
        tracing::warn!(strategy_id = %strategy.strategy_id, leverage, "strategy uses leverage above the recommended 3x");
    }

    // Rule 4: the section graph is fixed (S1 -> O1/Z1 -> ZE1/E1) and always acyclic by
    // construction, and every section is reachable from S1 by the same fixed pipeline — a
    // user cannot author a cycle because sections are struct fields, not a user-defined
    // graph. Nothing further to check here.

    // Rule 5: ze1_close OR emergency_exit must have at least one condition, or the
    // strategy can never exit a position.
    if strategy.ze1_close.conditions.is_empty() && strategy.emergency_exit.conditions.is_empty() {
        errors.push(SectionError::new(
            "ze1_close/emergency_exit",
            "at least one of ze1_close or emergency_exit must have a condition, otherwise the strategy can never exit",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(StrategyValidationError(errors))
    }
}
