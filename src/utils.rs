use crate::error::{FinancingError, Result};
use chrono::{Months, NaiveDate};

/// Closing balances below this many currency units are treated as settled.
pub const DEFAULT_BALANCE_EPSILON: f64 = 0.01;

/// Relative drift allowed between property value and financed + down payment.
pub const RECONCILIATION_TOLERANCE: f64 = 0.01;

/// Converts Brazilian-formatted money text ("R$ 1.234,56") into a number.
///
/// Never fails: text with no usable digits yields `0.0`.
pub fn parse_monetary(value: &str) -> f64 {
    let cleaned: String = value
        .replace("R$", "")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    let has_dot = cleaned.contains('.');
    let has_comma = cleaned.contains(',');

    let normalized = if has_dot && has_comma {
        cleaned.replace('.', "").replacen(',', ".", 1)
    } else if has_comma {
        cleaned.replacen(',', ".", 1)
    } else if cleaned.matches('.').count() > 1 {
        // "1.234.567" only makes sense as thousands grouping
        cleaned.replace('.', "")
    } else {
        cleaned
    };

    parse_leading_float(&normalized).unwrap_or(0.0)
}

/// Parses the longest `digits[.digits]` prefix, ignoring anything after it.
fn parse_leading_float(value: &str) -> Option<f64> {
    let mut end = 0;
    let mut seen_dot = false;

    for (idx, c) in value.char_indices() {
        match c {
            '0'..='9' => end = idx + 1,
            '.' if !seen_dot => {
                seen_dot = true;
                end = idx + 1;
            }
            _ => break,
        }
    }

    let prefix = &value[..end];
    if !prefix.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    prefix
        .trim_end_matches('.')
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Reads the leading run of digits as a count ("360 meses" -> 360).
pub fn parse_integer(value: &str) -> Option<u32> {
    let digits: String = value
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Reads a yes/no answer written in Portuguese.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "sim" => Some(true),
        "nao" | "não" => Some(false),
        _ => None,
    }
}

/// Renders a value as Brazilian reais, e.g. `R$ 1.234,56`.
///
/// The separator after the symbol is a non-breaking space, as produced by
/// pt-BR locale formatting.
pub fn format_currency(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let cents = (value.abs() * 100.0).round() as u64;
    let integer = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (idx, digit) in integer.chars().enumerate() {
        if idx > 0 && (integer.len() - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}R$\u{a0}{},{:02}", sign, grouped, fraction)
}

/// Due date of a 1-based installment month counted from `start`.
pub fn installment_due_date(start: NaiveDate, month: u32) -> Result<NaiveDate> {
    let offset = month.saturating_sub(1);
    start.checked_add_months(Months::new(offset)).ok_or_else(|| {
        FinancingError::DateError(format!(
            "Cannot add {} months to start date {}",
            offset, start
        ))
    })
}

/// `|a - b| <= tolerance * |reference|`
pub fn within_relative_tolerance(a: f64, b: f64, reference: f64, tolerance: f64) -> bool {
    (a - b).abs() <= reference.abs() * tolerance
}
