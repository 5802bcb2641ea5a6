use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::utils::DEFAULT_BALANCE_EPSILON;

/// Fields recovered from the text of a mortgage-simulation document.
///
/// Every field is populated independently and may be missing; nothing here is
/// trusted until it has gone through correction and validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawExtractedRecord {
    #[schemars(description = "Appraised or purchase value of the property")]
    pub property_value: Option<f64>,

    #[schemars(description = "Longest term offered for this simulation, in months")]
    pub max_term_months: Option<u32>,

    #[schemars(description = "Amortization system label as written in the document (e.g. 'PRICE TR', 'SAC')")]
    pub amortization_system: Option<String>,

    #[schemars(description = "Maximum financing quota as a whole percentage of the property value")]
    pub max_financing_quota: Option<u32>,

    pub down_payment: Option<f64>,

    #[schemars(description = "Whether the down payment is indexed/updated ('Entrada Atualizada')")]
    pub down_payment_indexed: Option<bool>,

    #[schemars(description = "Chosen term, in months")]
    pub term_months: Option<u32>,

    pub financed_amount: Option<f64>,

    #[schemars(description = "Notary or auctioneer expense paid upfront")]
    pub notary_auction_expense: Option<f64>,

    pub insurance_policy: Option<u64>,

    #[schemars(description = "Whether upfront fees are incorporated into the financed amount")]
    pub incorporate_fees: Option<bool>,

    pub first_installment: Option<f64>,

    #[schemars(description = "Nominal annual interest rate, in percent")]
    pub nominal_rate: Option<f64>,

    #[schemars(description = "Effective annual interest rate, in percent")]
    pub effective_rate: Option<f64>,

    pub upfront_insurance: Option<f64>,
    pub upfront_fees: Option<f64>,
    pub iof: Option<f64>,

    #[schemars(description = "Principal plus interest component of the first installment")]
    pub principal_and_interest: Option<f64>,

    #[schemars(description = "Monthly property-damage insurance premium (DFI)")]
    pub dfi_insurance: Option<f64>,

    #[schemars(description = "Monthly borrower-life insurance premium (MIP)")]
    pub mip_insurance: Option<f64>,

    pub total_insurance: Option<f64>,
    pub administration_fee: Option<f64>,
    pub credit_risk_fee: Option<f64>,
    pub monthly_operating_fee: Option<f64>,

    #[schemars(description = "Total of the installment components, add-ons included")]
    pub total_installment: Option<f64>,

    pub resource_origin: Option<String>,
    pub person_type: Option<String>,
    pub person_category: Option<String>,
    pub financing_type: Option<String>,
    pub property_category: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub construction_term_months: Option<u32>,
    pub family_income: Option<f64>,
    pub participants: Option<u32>,
    pub birth_pact_rate: Option<f64>,

    #[schemars(description = "Birth date attached to the birth pact, as DD/MM/YYYY")]
    pub birth_date: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AmortizationSystem {
    #[schemars(description = "French system: fixed installment, growing principal share")]
    #[default]
    Price,

    #[schemars(description = "PRICE with a reference-rate (TR) adjustment label; computed exactly like PRICE")]
    PriceTr,

    #[schemars(description = "Constant amortization: fixed principal share, shrinking installment")]
    Sac,
}

impl AmortizationSystem {
    /// Classifies a free-form label by substring, PRICE+TR before PRICE before SAC.
    pub fn detect(label: &str) -> Option<Self> {
        let upper = label.trim().to_uppercase();
        if upper.contains("PRICE") && upper.contains("TR") {
            Some(Self::PriceTr)
        } else if upper.contains("PRICE") {
            Some(Self::Price)
        } else if upper.contains("SAC") {
            Some(Self::Sac)
        } else {
            None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Price => "PRICE",
            Self::PriceTr => "PRICE TR",
            Self::Sac => "SAC",
        }
    }

    pub fn has_fixed_installment(&self) -> bool {
        matches!(self, Self::Price | Self::PriceTr)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum PersonType {
    #[schemars(description = "Natural person ('Pessoa Física')")]
    Individual,

    #[schemars(description = "Legal entity ('Pessoa Jurídica')")]
    Company,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceOrigin {
    Sbpe,
    Fgts,
}

/// The typed financing input the amortization engine consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CanonicalFinancingInput {
    pub property_value: Option<f64>,

    #[schemars(description = "Amount borrowed; required by the engine")]
    pub financed_amount: Option<f64>,

    pub appraisal_value: Option<f64>,
    pub down_payment: Option<f64>,

    #[schemars(description = "Nominal annual rate in percent; divided by 12 for the monthly rate. Required by the engine")]
    pub nominal_annual_rate: Option<f64>,

    #[schemars(description = "Effective annual rate in percent; informational only")]
    pub effective_annual_rate: Option<f64>,

    #[schemars(description = "Number of monthly installments; required by the engine")]
    pub term_months: Option<u32>,

    pub construction_term_months: Option<u32>,

    #[serde(default)]
    pub amortization_system: AmortizationSystem,

    pub max_financing_quota: Option<u32>,
    pub family_income: Option<f64>,
    pub participants: Option<u32>,
    pub person_type: Option<PersonType>,
    pub person_category: Option<String>,
    pub resource_origin: Option<ResourceOrigin>,
    pub financing_type: Option<String>,
    pub property_category: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,

    #[schemars(description = "Monthly DFI premium added to every installment")]
    pub dfi_insurance: Option<f64>,

    #[schemars(description = "Monthly MIP premium added to every installment")]
    pub mip_insurance: Option<f64>,

    pub administration_fee: Option<f64>,
    pub credit_risk_fee: Option<f64>,
    pub monthly_operating_fee: Option<f64>,

    pub notary_expense: Option<f64>,
    pub auctioneer_expense: Option<f64>,
    pub insurance_policy: Option<u64>,

    #[serde(default)]
    pub incorporate_fees: bool,

    pub upfront_insurance: Option<f64>,
    pub upfront_fees: Option<f64>,
    pub iof: Option<f64>,
}

impl CanonicalFinancingInput {
    /// Minimal input carrying only what the engine needs.
    pub fn new(
        financed_amount: f64,
        nominal_annual_rate: f64,
        term_months: u32,
        amortization_system: AmortizationSystem,
    ) -> Self {
        Self {
            financed_amount: Some(financed_amount),
            nominal_annual_rate: Some(nominal_annual_rate),
            term_months: Some(term_months),
            amortization_system,
            ..Default::default()
        }
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(CanonicalFinancingInput)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEffect {
    #[schemars(description = "Intended to shorten the remaining term. The schedule is not re-amortized")]
    ShortenTerm,

    #[schemars(description = "Intended to lower the following installments. The schedule is not re-amortized")]
    ReduceInstallment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtraordinaryPayment {
    #[schemars(description = "1-based month in which the payment is made")]
    pub month: u32,

    #[schemars(description = "Positive amount subtracted from the balance in that month")]
    pub amount: f64,

    pub effect: PaymentEffect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InstallmentLine {
    pub month: u32,
    pub due_date: NaiveDate,
    pub opening_balance: f64,
    pub principal: f64,
    pub interest: f64,

    #[schemars(description = "Principal plus interest, before add-ons")]
    pub base_installment: f64,

    pub dfi_insurance: f64,
    pub mip_insurance: f64,
    pub administration_fee: f64,
    pub credit_risk_fee: f64,
    pub monthly_operating_fee: f64,
    pub extraordinary_amount: Option<f64>,
    pub total_installment: f64,
    pub closing_balance: f64,
}

impl InstallmentLine {
    pub fn insurance(&self) -> f64 {
        self.dfi_insurance + self.mip_insurance
    }

    pub fn fees(&self) -> f64 {
        self.administration_fee + self.credit_risk_fee + self.monthly_operating_fee
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SimulationResult {
    pub input: CanonicalFinancingInput,
    pub installments: Vec<InstallmentLine>,
    pub total_interest: f64,
    pub total_principal: f64,
    pub total_insurance: f64,
    pub total_fees: f64,
    pub total_paid: f64,

    #[schemars(description = "Always equal to the input term; the schedule is never shortened")]
    pub realized_term_months: u32,

    #[schemars(description = "Raw sum of the extraordinary payment amounts")]
    pub total_savings: f64,

    pub extraordinary_payments: Vec<ExtraordinaryPayment>,
}

/// Headline figures of a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FinancingSummary {
    pub property_value: f64,
    pub financed_amount: f64,
    pub down_payment: f64,
    pub total_interest: f64,
    pub total_insurance: f64,
    pub total_fees: f64,
    pub total_paid: f64,
    pub original_term_months: u32,
    pub realized_term_months: u32,

    #[schemars(description = "First month whose closing balance reaches zero, if the balance is ever settled")]
    pub payoff_month: Option<u32>,

    pub first_installment: f64,
    pub last_installment: f64,
    pub total_savings: f64,
}

fn default_balance_epsilon() -> f64 {
    DEFAULT_BALANCE_EPSILON
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SimulationOptions {
    #[schemars(description = "Due date of the first installment; month N falls N-1 calendar months later")]
    pub start_date: NaiveDate,

    #[serde(default = "default_balance_epsilon")]
    #[schemars(description = "Closing balances below this amount are clamped to zero")]
    pub balance_epsilon: f64,
}

impl SimulationOptions {
    pub fn new(start_date: NaiveDate) -> Self {
        Self {
            start_date,
            balance_epsilon: DEFAULT_BALANCE_EPSILON,
        }
    }
}

/// A complete, JSON-loadable simulation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SimulationRequest {
    pub input: CanonicalFinancingInput,

    #[serde(default)]
    pub extraordinary_payments: Vec<ExtraordinaryPayment>,

    pub options: SimulationOptions,
}

impl SimulationRequest {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(SimulationRequest)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_amortization_system_priority() {
        assert_eq!(
            AmortizationSystem::detect("price tr"),
            Some(AmortizationSystem::PriceTr)
        );
        assert_eq!(
            AmortizationSystem::detect(" PRICE "),
            Some(AmortizationSystem::Price)
        );
        assert_eq!(
            AmortizationSystem::detect("SAC"),
            Some(AmortizationSystem::Sac)
        );
        assert_eq!(AmortizationSystem::detect("MISTO"), None);
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = SimulationRequest::schema_as_json().unwrap();
        assert!(schema_json.contains("extraordinary_payments"));
        assert!(schema_json.contains("start_date"));
        assert!(schema_json.contains("financed_amount"));
    }

    #[test]
    fn test_request_deserialization_defaults() {
        let json = r#"{
            "input": {
                "financed_amount": 300000.0,
                "nominal_annual_rate": 9.0,
                "term_months": 360,
                "amortization_system": "PRICE_TR"
            },
            "options": { "start_date": "2025-01-10" }
        }"#;

        let request = SimulationRequest::from_json_str(json).unwrap();
        assert_eq!(
            request.input.amortization_system,
            AmortizationSystem::PriceTr
        );
        assert!(request.extraordinary_payments.is_empty());
        assert_eq!(request.options.balance_epsilon, DEFAULT_BALANCE_EPSILON);
        assert!(!request.input.incorporate_fees);
    }

    #[test]
    fn test_payment_effect_serialization() {
        let payment = ExtraordinaryPayment {
            month: 12,
            amount: 10_000.0,
            effect: PaymentEffect::ShortenTerm,
        };

        let json = serde_json::to_string(&payment).unwrap();
        assert!(json.contains("shorten_term"));

        let back: ExtraordinaryPayment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payment);
    }
}
