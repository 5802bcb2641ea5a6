use crate::schema::{
    AmortizationSystem, CanonicalFinancingInput, PersonType, RawExtractedRecord, ResourceOrigin,
};
use log::debug;

/// Maps a corrected raw record onto the typed input of the amortization engine.
///
/// Unrecognized amortization labels default to PRICE. Non-finite numbers
/// become `None`.
pub fn convert_to_canonical_input(record: &RawExtractedRecord) -> CanonicalFinancingInput {
    let amortization_system = normalize_amortization_system(record.amortization_system.as_deref());

    CanonicalFinancingInput {
        property_value: finite(record.property_value),
        financed_amount: finite(record.financed_amount),
        appraisal_value: finite(record.property_value),
        down_payment: finite(record.down_payment),
        nominal_annual_rate: finite(record.nominal_rate),
        effective_annual_rate: finite(record.effective_rate),
        term_months: record.term_months,
        construction_term_months: record.construction_term_months,
        amortization_system,
        max_financing_quota: record.max_financing_quota,
        family_income: finite(record.family_income),
        participants: record.participants,
        person_type: record.person_type.as_deref().map(normalize_person_type),
        person_category: record.person_category.clone(),
        resource_origin: record
            .resource_origin
            .as_deref()
            .map(normalize_resource_origin),
        financing_type: record.financing_type.clone(),
        property_category: record.property_category.clone(),
        city: record.city.clone(),
        state: record.state.clone(),
        dfi_insurance: finite(record.dfi_insurance),
        mip_insurance: finite(record.mip_insurance),
        administration_fee: finite(record.administration_fee),
        credit_risk_fee: finite(record.credit_risk_fee),
        monthly_operating_fee: finite(record.monthly_operating_fee),
        notary_expense: finite(record.notary_auction_expense),
        auctioneer_expense: Some(0.0),
        insurance_policy: record.insurance_policy,
        incorporate_fees: true,
        upfront_insurance: finite(record.upfront_insurance),
        upfront_fees: finite(record.upfront_fees),
        iof: finite(record.iof),
    }
}

pub fn normalize_amortization_system(label: Option<&str>) -> AmortizationSystem {
    match label.and_then(AmortizationSystem::detect) {
        Some(system) => system,
        None => {
            debug!(
                "Amortization system {:?} not recognized, defaulting to PRICE",
                label
            );
            AmortizationSystem::Price
        }
    }
}

/// "Física" is an individual; anything else is treated as a company.
pub fn normalize_person_type(label: &str) -> PersonType {
    let upper = label.trim().to_uppercase();
    if upper.starts_with("FISICA") || upper.starts_with("FÍSICA") {
        PersonType::Individual
    } else {
        PersonType::Company
    }
}

/// "SBPE" funding; anything else is FGTS.
pub fn normalize_resource_origin(label: &str) -> ResourceOrigin {
    if label.trim().eq_ignore_ascii_case("SBPE") {
        ResourceOrigin::Sbpe
    } else {
        ResourceOrigin::Fgts
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}
