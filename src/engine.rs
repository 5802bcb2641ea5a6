use crate::error::{FinancingError, Result};
use crate::schema::*;
use crate::utils::installment_due_date;
use crate::validator::validate_extraordinary_payments;
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Monthly add-ons charged on top of the base installment.
#[derive(Debug, Clone, Copy)]
struct MonthlyAddOns {
    dfi_insurance: f64,
    mip_insurance: f64,
    administration_fee: f64,
    credit_risk_fee: f64,
    monthly_operating_fee: f64,
}

impl MonthlyAddOns {
    fn from_input(input: &CanonicalFinancingInput) -> Self {
        let or_zero = |v: Option<f64>| v.filter(|x| x.is_finite()).unwrap_or(0.0);
        Self {
            dfi_insurance: or_zero(input.dfi_insurance),
            mip_insurance: or_zero(input.mip_insurance),
            administration_fee: or_zero(input.administration_fee),
            credit_risk_fee: or_zero(input.credit_risk_fee),
            monthly_operating_fee: or_zero(input.monthly_operating_fee),
        }
    }

    fn insurance(&self) -> f64 {
        self.dfi_insurance + self.mip_insurance
    }

    fn fees(&self) -> f64 {
        self.administration_fee + self.credit_risk_fee + self.monthly_operating_fee
    }
}

/// Nominal annual percentage to monthly rate, without compounding.
pub fn monthly_rate(nominal_annual_rate: f64) -> f64 {
    nominal_annual_rate / 100.0 / 12.0
}

/// Fixed PRICE installment from the annuity formula; `principal / n` at a zero rate.
///
/// Written with the discount factor `(1 + r)^-n` so very long terms approach
/// `principal * rate` instead of overflowing.
pub fn price_installment(principal: f64, rate: f64, term_months: u32) -> f64 {
    let n = term_months as f64;
    if rate == 0.0 {
        return principal / n;
    }
    principal * rate / (1.0 - (1.0 + rate).powf(-n))
}

pub struct AmortizationEngine {
    options: SimulationOptions,
}

impl AmortizationEngine {
    pub fn new(options: SimulationOptions) -> Self {
        Self { options }
    }

    /// Builds the full schedule for `input`.
    ///
    /// Fails only when the financed amount, term or nominal rate is missing, or
    /// when the extraordinary payments are malformed or collide on a month.
    /// Extraordinary payments reduce the balance in their month without
    /// re-amortizing the remaining installments.
    pub fn simulate(
        &self,
        input: &CanonicalFinancingInput,
        payments: &[ExtraordinaryPayment],
    ) -> Result<SimulationResult> {
        let financed = input
            .financed_amount
            .filter(|v| v.is_finite() && *v > 0.0)
            .ok_or_else(|| FinancingError::MissingRequiredField("financed_amount".to_string()))?;
        let term = input
            .term_months
            .ok_or_else(|| FinancingError::MissingRequiredField("term_months".to_string()))?;
        if term == 0 {
            return Err(FinancingError::InvalidTerm(term));
        }
        let nominal = input
            .nominal_annual_rate
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| {
                FinancingError::MissingRequiredField("nominal_annual_rate".to_string())
            })?;

        // The last due date must exist before the schedule is allocated
        installment_due_date(self.options.start_date, term)?;

        validate_extraordinary_payments(payments, term)?;
        let by_month: BTreeMap<u32, &ExtraordinaryPayment> =
            payments.iter().map(|p| (p.month, p)).collect();

        for payment in payments {
            match payment.effect {
                PaymentEffect::ShortenTerm => warn!(
                    "Extraordinary payment in month {} asks for a shorter term; the schedule keeps {} months and is not re-amortized",
                    payment.month, term
                ),
                PaymentEffect::ReduceInstallment => debug!(
                    "Extraordinary payment in month {} reduces the balance; installments are not recomputed",
                    payment.month
                ),
            }
        }

        let rate = monthly_rate(nominal);
        let system = input.amortization_system;
        let fixed_installment = system
            .has_fixed_installment()
            .then(|| price_installment(financed, rate, term));
        let constant_principal = financed / term as f64;
        let add_ons = MonthlyAddOns::from_input(input);

        info!(
            "Simulating {} over {} months: financed {:.2} at {}% nominal",
            system.label(),
            term,
            financed,
            nominal
        );

        let mut installments = Vec::with_capacity(term as usize);
        let mut balance = financed;

        for month in 1..=term {
            let opening_balance = balance;
            let interest = opening_balance * rate;

            let (principal, base_installment) = match fixed_installment {
                Some(installment) => (installment - interest, installment),
                None => (constant_principal, constant_principal + interest),
            };

            let extraordinary_amount = by_month.get(&month).map(|p| p.amount);
            let extra = extraordinary_amount.unwrap_or(0.0);

            let mut closing_balance = opening_balance - extra - principal;
            if closing_balance < self.options.balance_epsilon {
                closing_balance = 0.0;
            }

            let total_installment = base_installment + add_ons.insurance() + add_ons.fees() + extra;

            installments.push(InstallmentLine {
                month,
                due_date: installment_due_date(self.options.start_date, month)?,
                opening_balance,
                principal,
                interest,
                base_installment,
                dfi_insurance: add_ons.dfi_insurance,
                mip_insurance: add_ons.mip_insurance,
                administration_fee: add_ons.administration_fee,
                credit_risk_fee: add_ons.credit_risk_fee,
                monthly_operating_fee: add_ons.monthly_operating_fee,
                extraordinary_amount,
                total_installment,
                closing_balance,
            });

            balance = closing_balance;
        }

        let total_interest: f64 = installments.iter().map(|l| l.interest).sum();
        let total_principal: f64 = installments.iter().map(|l| l.principal).sum();
        let total_insurance: f64 = installments.iter().map(|l| l.insurance()).sum();
        let total_fees: f64 = installments.iter().map(|l| l.fees()).sum();
        let total_paid: f64 = installments.iter().map(|l| l.total_installment).sum();
        let total_savings: f64 = payments.iter().map(|p| p.amount).sum();

        Ok(SimulationResult {
            input: input.clone(),
            installments,
            total_interest,
            total_principal,
            total_insurance,
            total_fees,
            total_paid,
            realized_term_months: term,
            total_savings,
            extraordinary_payments: payments.to_vec(),
        })
    }
}

/// Headline figures of a finished simulation.
pub fn summarize(result: &SimulationResult) -> FinancingSummary {
    let input = &result.input;
    let first_installment = result
        .installments
        .first()
        .map(|l| l.total_installment)
        .unwrap_or(0.0);
    let last_installment = result
        .installments
        .last()
        .map(|l| l.total_installment)
        .unwrap_or(0.0);

    FinancingSummary {
        property_value: input.property_value.unwrap_or(0.0),
        financed_amount: input.financed_amount.unwrap_or(0.0),
        down_payment: input.down_payment.unwrap_or(0.0),
        total_interest: result.total_interest,
        total_insurance: result.total_insurance,
        total_fees: result.total_fees,
        total_paid: result.total_paid,
        original_term_months: input.term_months.unwrap_or(0),
        realized_term_months: result.realized_term_months,
        payoff_month: result
            .installments
            .iter()
            .find(|l| l.closing_balance == 0.0)
            .map(|l| l.month),
        first_installment,
        last_installment,
        total_savings: result.total_savings,
    }
}
