//! # Mortgage Simulation Builder
//!
//! A library for turning the text of a mortgage-simulation document into a
//! validated financing record, and that record into a deterministic
//! month-by-month amortization schedule.
//!
//! ## Core Concepts
//!
//! - **Raw Record**: fields recovered from noisy text by ordered pattern chains, each optional
//! - **Correction**: pure repair rules that derive missing fields from their siblings
//! - **Canonical Input**: the typed record the engine consumes (PRICE, PRICE TR or SAC)
//! - **Schedule**: one line per month with balance, principal, interest and add-ons
//! - **Extraordinary Payments**: out-of-schedule principal reductions; the schedule is not re-amortized
//!
//! ## Example
//!
//! ```rust,ignore
//! use mortgage_simulation_builder::*;
//! use chrono::NaiveDate;
//!
//! let text = std::fs::read_to_string("simulation.txt")?;
//! let options = SimulationOptions::new(NaiveDate::from_ymd_opt(2025, 2, 10).unwrap());
//!
//! let payments = vec![ExtraordinaryPayment {
//!     month: 24,
//!     amount: 20_000.0,
//!     effect: PaymentEffect::ReduceInstallment,
//! }];
//!
//! let result = process_document(&text, &payments, &options)?;
//! println!("Total paid: {}", format_currency(result.total_paid));
//! ```

pub mod corrector;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod normalizer;
pub mod schema;
pub mod utils;
pub mod validator;

pub use corrector::{correct_record, CorrectionRule, CORRECTION_RULES};
pub use engine::{monthly_rate, price_installment, summarize, AmortizationEngine};
pub use error::{FinancingError, Result};
pub use extractor::{extract_raw_record, Field, FieldExtractor, PatternTable};
pub use normalizer::convert_to_canonical_input;
pub use schema::*;
pub use utils::{format_currency, parse_monetary};
pub use validator::{
    missing_required_fields, validate_canonical_input, validate_extraordinary_payments,
    validate_raw_record, validate_semantic, validate_structural, ValidationReport,
};

use log::{error, info};

pub struct MortgageSimulationProcessor;

impl MortgageSimulationProcessor {
    /// Extracts and corrects a record from document text.
    ///
    /// `None` means extraction itself broke; fields that simply were not
    /// found are left empty in the returned record.
    pub fn parse(text: &str) -> Option<RawExtractedRecord> {
        match extract_raw_record(text) {
            Ok(raw) => {
                let corrected = correct_record(&raw);
                info!(
                    "Parsed document text: {} required fields missing",
                    missing_required_fields(&corrected).len()
                );
                Some(corrected)
            }
            Err(e) => {
                error!("Failed to parse document text: {}", e);
                None
            }
        }
    }

    pub fn simulate(
        input: &CanonicalFinancingInput,
        payments: &[ExtraordinaryPayment],
        options: &SimulationOptions,
    ) -> Result<SimulationResult> {
        AmortizationEngine::new(options.clone()).simulate(input, payments)
    }

    /// Runs the whole pipeline: extract, correct, validate, normalize, simulate.
    pub fn process_document(
        text: &str,
        payments: &[ExtraordinaryPayment],
        options: &SimulationOptions,
    ) -> Result<SimulationResult> {
        let record = Self::parse(text).ok_or(FinancingError::ExtractionFailed)?;

        if !validate_raw_record(&record) {
            let mut reasons: Vec<String> = missing_required_fields(&record)
                .into_iter()
                .map(|field| format!("missing or invalid field '{}'", field))
                .collect();
            if reasons.is_empty() {
                reasons.push(
                    "property value differs from financed amount plus down payment by more than 1%"
                        .to_string(),
                );
            }
            return Err(FinancingError::ValidationFailed(reasons));
        }

        let input = convert_to_canonical_input(&record);
        Self::simulate(&input, payments, options)
    }

    pub fn process_request(request: &SimulationRequest) -> Result<SimulationResult> {
        Self::simulate(
            &request.input,
            &request.extraordinary_payments,
            &request.options,
        )
    }
}

pub fn parse_document_text(text: &str) -> Option<RawExtractedRecord> {
    MortgageSimulationProcessor::parse(text)
}

pub fn run_simulation(
    input: &CanonicalFinancingInput,
    payments: &[ExtraordinaryPayment],
    options: &SimulationOptions,
) -> Result<SimulationResult> {
    MortgageSimulationProcessor::simulate(input, payments, options)
}

pub fn process_document(
    text: &str,
    payments: &[ExtraordinaryPayment],
    options: &SimulationOptions,
) -> Result<SimulationResult> {
    MortgageSimulationProcessor::process_document(text, payments, options)
}

/// Parses a JSON [`SimulationRequest`] and runs it.
pub fn process_simulation_request(json: &str) -> Result<SimulationResult> {
    let request = SimulationRequest::from_json_str(json)?;
    MortgageSimulationProcessor::process_request(&request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn options() -> SimulationOptions {
        SimulationOptions::new(NaiveDate::from_ymd_opt(2025, 3, 5).unwrap())
    }

    #[test]
    fn test_parse_then_simulate() {
        let text = "\
Valor do imóvel: R$ 500.000,00
Valor de entrada: R$ 100.000,00
Prazo: 360 meses
Sistema de Amortização: SAC
Primeira Prestação R$ 4.333,33
Juros Nominais 10,00%
Juros Efetivos 10,47%";

        let record = parse_document_text(text).unwrap();
        assert_eq!(record.financed_amount, Some(400_000.0));
        assert!(validate_raw_record(&record));

        let input = convert_to_canonical_input(&record);
        assert_eq!(input.amortization_system, AmortizationSystem::Sac);

        let result = run_simulation(&input, &[], &options()).unwrap();
        assert_eq!(result.installments.len(), 360);
        assert!((result.installments[0].principal - 400_000.0 / 360.0).abs() < 1e-9);
    }

    #[test]
    fn test_process_document_reports_missing_fields() {
        let text = "Valor do imóvel: R$ 500.000,00\nPrazo: 360 meses";
        match process_document(text, &[], &options()) {
            Err(FinancingError::ValidationFailed(reasons)) => {
                assert!(reasons.iter().any(|r| r.contains("nominal_rate")));
                assert!(reasons.iter().any(|r| r.contains("down_payment")));
            }
            other => panic!("expected validation failure, got {:?}", other.map(|r| r.installments.len())),
        }
    }

    #[test]
    fn test_process_simulation_request_json() {
        let json = r#"{
            "input": {
                "financed_amount": 300000.0,
                "nominal_annual_rate": 9.0,
                "term_months": 360,
                "amortization_system": "PRICE"
            },
            "extraordinary_payments": [
                { "month": 12, "amount": 10000.0, "effect": "reduce_installment" }
            ],
            "options": { "start_date": "2025-01-10" }
        }"#;

        let result = process_simulation_request(json).unwrap();
        assert_eq!(result.realized_term_months, 360);
        assert_eq!(result.total_savings, 10_000.0);
        assert!((result.installments[0].interest - 2250.0).abs() < 1e-6);
    }

    #[test]
    fn test_process_simulation_request_rejects_unreachable_term() {
        let json = r#"{
            "input": {
                "financed_amount": 300000.0,
                "nominal_annual_rate": 9.0,
                "term_months": 4000000000,
                "amortization_system": "PRICE"
            },
            "options": { "start_date": "2025-01-10" }
        }"#;

        assert!(matches!(
            process_simulation_request(json),
            Err(FinancingError::DateError(_))
        ));
    }

    #[test]
    fn test_process_simulation_request_rejects_bad_json() {
        assert!(matches!(
            process_simulation_request("{ not json"),
            Err(FinancingError::SerializationError(_))
        ));
    }
}
