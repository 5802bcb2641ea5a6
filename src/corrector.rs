use crate::schema::{AmortizationSystem, RawExtractedRecord};
use crate::utils::RECONCILIATION_TOLERANCE;
use log::debug;

/// A single repair rule. Returns the repaired record, or `None` when the rule
/// does not apply to (or would not change) the record.
pub type CorrectionRule = fn(&RawExtractedRecord) -> Option<RawExtractedRecord>;

/// Repair rules in application order. Property reconciliation must stay after
/// the two derivation rules.
pub const CORRECTION_RULES: &[(&str, CorrectionRule)] = &[
    ("derive financed amount", derive_financed_amount),
    ("derive down payment", derive_down_payment),
    ("default total installment", default_total_installment),
    ("default term to maximum term", default_term),
    ("reconcile property value", reconcile_property_value),
    ("normalize amortization system", normalize_amortization_system),
    ("default down payment indexed", default_down_payment_indexed),
];

/// Applies every correction rule in order and returns the corrected record.
/// The input is never modified, and correcting an already corrected record
/// returns it unchanged.
pub fn correct_record(record: &RawExtractedRecord) -> RawExtractedRecord {
    CORRECTION_RULES
        .iter()
        .fold(record.clone(), |current, (name, rule)| match rule(&current) {
            Some(next) => {
                debug!("Auto-correction applied: {}", name);
                next
            }
            None => current,
        })
}

// Zero is what a failed numeric parse leaves behind, so it counts as missing.
fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && v.is_finite())
}

fn present_count(value: Option<u32>) -> Option<u32> {
    value.filter(|v| *v != 0)
}

pub fn derive_financed_amount(record: &RawExtractedRecord) -> Option<RawExtractedRecord> {
    if present(record.financed_amount).is_some() {
        return None;
    }
    let property = present(record.property_value)?;
    let down = present(record.down_payment)?;

    Some(RawExtractedRecord {
        financed_amount: Some(property - down),
        ..record.clone()
    })
}

pub fn derive_down_payment(record: &RawExtractedRecord) -> Option<RawExtractedRecord> {
    if present(record.down_payment).is_some() {
        return None;
    }
    let property = present(record.property_value)?;
    let financed = present(record.financed_amount)?;

    Some(RawExtractedRecord {
        down_payment: Some(property - financed),
        ..record.clone()
    })
}

pub fn default_total_installment(record: &RawExtractedRecord) -> Option<RawExtractedRecord> {
    if present(record.total_installment).is_some() {
        return None;
    }
    let first = present(record.first_installment)?;

    Some(RawExtractedRecord {
        total_installment: Some(first),
        ..record.clone()
    })
}

pub fn default_term(record: &RawExtractedRecord) -> Option<RawExtractedRecord> {
    if present_count(record.term_months).is_some() {
        return None;
    }
    let max_term = present_count(record.max_term_months)?;

    Some(RawExtractedRecord {
        term_months: Some(max_term),
        ..record.clone()
    })
}

/// Absorbs rounding drift under 1% of the property value into the property value.
pub fn reconcile_property_value(record: &RawExtractedRecord) -> Option<RawExtractedRecord> {
    let property = present(record.property_value)?;
    let financed = present(record.financed_amount)?;
    let down = present(record.down_payment)?;

    let sum = financed + down;
    let drift = (sum - property).abs();
    if drift == 0.0 || drift >= property * RECONCILIATION_TOLERANCE {
        return None;
    }

    Some(RawExtractedRecord {
        property_value: Some(sum),
        ..record.clone()
    })
}

pub fn normalize_amortization_system(record: &RawExtractedRecord) -> Option<RawExtractedRecord> {
    let label = record.amortization_system.as_deref()?;
    let canonical = AmortizationSystem::detect(label)?.label();
    if label == canonical {
        return None;
    }

    Some(RawExtractedRecord {
        amortization_system: Some(canonical.to_string()),
        ..record.clone()
    })
}

pub fn default_down_payment_indexed(record: &RawExtractedRecord) -> Option<RawExtractedRecord> {
    if record.down_payment_indexed.is_some() {
        return None;
    }

    Some(RawExtractedRecord {
        down_payment_indexed: Some(false),
        ..record.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_property_and_down() -> RawExtractedRecord {
        RawExtractedRecord {
            property_value: Some(500_000.0),
            down_payment: Some(100_000.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_financed_amount_derived_from_difference() {
        let corrected = correct_record(&record_with_property_and_down());
        assert_eq!(corrected.financed_amount, Some(400_000.0));
        assert_eq!(corrected.property_value, Some(500_000.0));
    }

    #[test]
    fn test_correction_is_idempotent() {
        let once = correct_record(&record_with_property_and_down());
        let twice = correct_record(&once);
        assert_eq!(once, twice);

        for (name, rule) in CORRECTION_RULES {
            assert!(rule(&once).is_none(), "rule '{}' fired on a corrected record", name);
        }
    }

    #[test]
    fn test_input_record_is_not_modified() {
        let original = record_with_property_and_down();
        let snapshot = original.clone();
        let _ = correct_record(&original);
        assert_eq!(original, snapshot);
    }

    #[test]
    fn test_down_payment_derived_from_difference() {
        let record = RawExtractedRecord {
            property_value: Some(500_000.0),
            financed_amount: Some(350_000.0),
            ..Default::default()
        };
        let corrected = correct_record(&record);
        assert_eq!(corrected.down_payment, Some(150_000.0));
    }

    #[test]
    fn test_zero_financed_amount_counts_as_missing() {
        let record = RawExtractedRecord {
            financed_amount: Some(0.0),
            ..record_with_property_and_down()
        };
        let corrected = correct_record(&record);
        assert_eq!(corrected.financed_amount, Some(400_000.0));
    }

    #[test]
    fn test_total_installment_and_term_defaults() {
        let record = RawExtractedRecord {
            first_installment: Some(3_214.55),
            max_term_months: Some(420),
            ..Default::default()
        };
        let corrected = correct_record(&record);
        assert_eq!(corrected.total_installment, Some(3_214.55));
        assert_eq!(corrected.term_months, Some(420));

        let with_term = RawExtractedRecord {
            term_months: Some(360),
            ..record
        };
        assert_eq!(correct_record(&with_term).term_months, Some(360));
    }

    #[test]
    fn test_small_drift_reconciled_into_property_value() {
        let record = RawExtractedRecord {
            property_value: Some(500_000.0),
            financed_amount: Some(399_000.0),
            down_payment: Some(100_000.0),
            ..Default::default()
        };
        let corrected = correct_record(&record);
        assert_eq!(corrected.property_value, Some(499_000.0));
    }

    #[test]
    fn test_large_drift_left_for_validation() {
        let record = RawExtractedRecord {
            property_value: Some(500_000.0),
            financed_amount: Some(300_000.0),
            down_payment: Some(100_000.0),
            ..Default::default()
        };
        let corrected = correct_record(&record);
        assert_eq!(corrected.property_value, Some(500_000.0));
    }

    #[test]
    fn test_amortization_label_normalized() {
        let record = RawExtractedRecord {
            amortization_system: Some("price tr mensal".to_string()),
            ..Default::default()
        };
        assert_eq!(
            correct_record(&record).amortization_system.as_deref(),
            Some("PRICE TR")
        );

        let unknown = RawExtractedRecord {
            amortization_system: Some("MISTO".to_string()),
            ..Default::default()
        };
        assert_eq!(
            correct_record(&unknown).amortization_system.as_deref(),
            Some("MISTO")
        );
    }

    #[test]
    fn test_down_payment_indexed_defaults_to_false() {
        let corrected = correct_record(&RawExtractedRecord::default());
        assert_eq!(corrected.down_payment_indexed, Some(false));

        let indexed = RawExtractedRecord {
            down_payment_indexed: Some(true),
            ..Default::default()
        };
        assert_eq!(correct_record(&indexed).down_payment_indexed, Some(true));
    }
}
