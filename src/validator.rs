use crate::error::{FinancingError, Result};
use crate::schema::{CanonicalFinancingInput, ExtraordinaryPayment, RawExtractedRecord};
use crate::utils::{within_relative_tolerance, RECONCILIATION_TOLERANCE};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

type FieldAccessor = fn(&RawExtractedRecord) -> Option<f64>;

/// Fields a record needs before it can be simulated.
const REQUIRED_FIELDS: &[(&str, FieldAccessor)] = &[
    ("property_value", |r| r.property_value),
    ("financed_amount", |r| r.financed_amount),
    ("down_payment", |r| r.down_payment),
    ("term_months", |r| r.term_months.map(f64::from)),
    ("first_installment", |r| r.first_installment),
    ("nominal_rate", |r| r.nominal_rate),
    ("effective_rate", |r| r.effective_rate),
];

/// Required fields that are absent, zero or negative.
pub fn missing_required_fields(record: &RawExtractedRecord) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .filter(|(_, accessor)| !matches!(accessor(record), Some(v) if v > 0.0))
        .map(|(name, _)| *name)
        .collect()
}

pub fn validate_structural(record: &RawExtractedRecord) -> bool {
    missing_required_fields(record).is_empty()
}

/// Property value must match financed amount plus down payment within 1%.
pub fn validate_semantic(record: &RawExtractedRecord) -> bool {
    match (
        record.property_value,
        record.financed_amount,
        record.down_payment,
    ) {
        (Some(property), Some(financed), Some(down)) => within_relative_tolerance(
            property,
            financed + down,
            property,
            RECONCILIATION_TOLERANCE,
        ),
        _ => false,
    }
}

/// Structural and semantic validation of a corrected record.
pub fn validate_raw_record(record: &RawExtractedRecord) -> bool {
    let missing = missing_required_fields(record);
    if !missing.is_empty() {
        for field in &missing {
            warn!("Required field missing or invalid: {}", field);
        }
        return false;
    }

    if !validate_semantic(record) {
        warn!("Property value is inconsistent with financed amount plus down payment");
        return false;
    }

    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Checks a canonical input and explains every problem found.
pub fn validate_canonical_input(input: &CanonicalFinancingInput) -> ValidationReport {
    let mut errors = Vec::new();

    if !is_positive(input.property_value) {
        errors.push("Property value is invalid".to_string());
    }
    if !is_positive(input.financed_amount) {
        errors.push("Financed amount is invalid".to_string());
    }
    if !matches!(input.term_months, Some(term) if term > 0) {
        errors.push("Term is invalid".to_string());
    }
    if !is_positive(input.nominal_annual_rate) {
        errors.push("Nominal interest rate is invalid".to_string());
    }

    if let (Some(financed), Some(property)) = (input.financed_amount, input.property_value) {
        if financed > property {
            errors.push("Financed amount cannot exceed the property value".to_string());
        }

        if let Some(down) = input.down_payment {
            if down + financed > property * 1.1 {
                errors.push(
                    "Down payment plus financed amount is inconsistent with the property value"
                        .to_string(),
                );
            }
        }
    }

    for error in &errors {
        warn!("Canonical input validation: {}", error);
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// Rejects malformed or conflicting extraordinary payments for a term of `term_months`.
pub fn validate_extraordinary_payments(
    payments: &[ExtraordinaryPayment],
    term_months: u32,
) -> Result<()> {
    let mut seen = BTreeSet::new();

    for payment in payments {
        if payment.month == 0 || payment.month > term_months {
            return Err(FinancingError::InvalidExtraordinaryPayment {
                month: payment.month,
                details: format!("month must be between 1 and {}", term_months),
            });
        }

        if !payment.amount.is_finite() || payment.amount <= 0.0 {
            return Err(FinancingError::InvalidExtraordinaryPayment {
                month: payment.month,
                details: format!("amount {} must be a positive number", payment.amount),
            });
        }

        if !seen.insert(payment.month) {
            return Err(FinancingError::DuplicateExtraordinaryPayment {
                month: payment.month,
            });
        }
    }

    Ok(())
}

fn is_positive(value: Option<f64>) -> bool {
    matches!(value, Some(v) if v.is_finite() && v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PaymentEffect;

    fn valid_record() -> RawExtractedRecord {
        RawExtractedRecord {
            property_value: Some(500_000.0),
            financed_amount: Some(400_000.0),
            down_payment: Some(100_000.0),
            term_months: Some(360),
            first_installment: Some(3_500.0),
            nominal_rate: Some(9.0),
            effective_rate: Some(9.38),
            ..Default::default()
        }
    }

    fn payment(month: u32, amount: f64) -> ExtraordinaryPayment {
        ExtraordinaryPayment {
            month,
            amount,
            effect: PaymentEffect::ReduceInstallment,
        }
    }

    #[test]
    fn test_valid_record_passes() {
        let record = valid_record();
        assert!(validate_structural(&record));
        assert!(validate_semantic(&record));
        assert!(validate_raw_record(&record));
        assert!(missing_required_fields(&record).is_empty());
    }

    #[test]
    fn test_structural_rejects_absent_zero_negative() {
        let absent = RawExtractedRecord {
            effective_rate: None,
            ..valid_record()
        };
        assert!(!validate_structural(&absent));
        assert_eq!(missing_required_fields(&absent), vec!["effective_rate"]);

        let zero = RawExtractedRecord {
            term_months: Some(0),
            ..valid_record()
        };
        assert!(!validate_structural(&zero));

        let negative = RawExtractedRecord {
            down_payment: Some(-1.0),
            ..valid_record()
        };
        assert!(!validate_structural(&negative));
        assert!(!validate_raw_record(&negative));
    }

    #[test]
    fn test_semantic_tolerance() {
        let drift = RawExtractedRecord {
            financed_amount: Some(396_000.0),
            ..valid_record()
        };
        assert!(validate_semantic(&drift));

        let broken = RawExtractedRecord {
            financed_amount: Some(380_000.0),
            ..valid_record()
        };
        assert!(!validate_semantic(&broken));
        assert!(!validate_raw_record(&broken));
    }

    #[test]
    fn test_canonical_report_lists_reasons() {
        let input = CanonicalFinancingInput {
            property_value: Some(300_000.0),
            financed_amount: Some(350_000.0),
            down_payment: Some(50_000.0),
            term_months: Some(0),
            nominal_annual_rate: Some(9.0),
            ..Default::default()
        };
        let report = validate_canonical_input(&input);
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 3);
        assert!(report.errors.iter().any(|e| e.contains("Term")));
        assert!(report.errors.iter().any(|e| e.contains("exceed")));
    }

    #[test]
    fn test_canonical_report_valid() {
        let input = CanonicalFinancingInput {
            property_value: Some(500_000.0),
            down_payment: Some(100_000.0),
            ..CanonicalFinancingInput::new(400_000.0, 9.0, 360, Default::default())
        };
        let report = validate_canonical_input(&input);
        assert!(report.is_valid, "{:?}", report.errors);
    }

    #[test]
    fn test_duplicate_payment_month_rejected() {
        let result = validate_extraordinary_payments(&[payment(12, 1_000.0), payment(12, 500.0)], 360);
        assert!(matches!(
            result,
            Err(FinancingError::DuplicateExtraordinaryPayment { month: 12 })
        ));
    }

    #[test]
    fn test_invalid_payments_rejected() {
        assert!(validate_extraordinary_payments(&[payment(0, 1_000.0)], 360).is_err());
        assert!(validate_extraordinary_payments(&[payment(361, 1_000.0)], 360).is_err());
        assert!(validate_extraordinary_payments(&[payment(5, -1.0)], 360).is_err());
        assert!(validate_extraordinary_payments(&[payment(5, f64::NAN)], 360).is_err());
        assert!(validate_extraordinary_payments(&[payment(5, 1.0), payment(6, 2.0)], 360).is_ok());
        assert!(validate_extraordinary_payments(&[], 360).is_ok());
    }
}
