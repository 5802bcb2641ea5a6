//! Field extraction from the plain text of a mortgage-simulation document.
//!
//! Every field is recovered by an ordered chain of matchers: the field's own
//! regular expressions first, then (for the two interest rates) the tabular
//! "installment / nominal / effective" layout, then a scan of the lines that
//! mention the field's label. A field that no matcher recovers stays `None`.

use crate::error::Result;
use crate::schema::RawExtractedRecord;
use crate::utils::{parse_flag, parse_integer, parse_monetary};
use log::debug;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    PropertyValue,
    MaxTerm,
    AmortizationSystem,
    MaxFinancingQuota,
    DownPayment,
    DownPaymentIndexed,
    Term,
    FinancedAmount,
    NotaryAuctionExpense,
    InsurancePolicy,
    FirstInstallment,
    NominalRate,
    EffectiveRate,
    UpfrontInsurance,
    UpfrontFees,
    Iof,
    PrincipalAndInterest,
    DfiInsurance,
    MipInsurance,
    TotalInsurance,
    AdministrationFee,
    CreditRiskFee,
    MonthlyOperatingFee,
    TotalInstallment,
    ResourceOrigin,
    PersonType,
    PersonCategory,
    FinancingType,
    PropertyCategory,
    City,
    ConstructionTerm,
    FamilyIncome,
    Participants,
}

struct FieldSpec {
    field: Field,
    /// Label searched (case-insensitively) by the line-scan fallback.
    label: &'static str,
    patterns: &'static [&'static str],
    /// Position of this field among the percentages of the rate table row.
    rate_column: Option<usize>,
}

const fn spec(field: Field, label: &'static str, patterns: &'static [&'static str]) -> FieldSpec {
    FieldSpec {
        field,
        label,
        patterns,
        rate_column: None,
    }
}

const FIELD_SPECS: &[FieldSpec] = &[
    spec(
        Field::PropertyValue,
        "Valor do imóvel",
        &[
            r"Valor do imóvel:\s*R?\$\s*([\d.,]+)",
            r"Valor Do Imóvel:\s*R?\$\s*([\d.,]+)",
            r"Valor do imovel:\s*R?\$\s*([\d.,]+)",
            r"(?i)valor imovel[:\s]*R?\$\s*([\d.,]+)",
        ],
    ),
    spec(
        Field::MaxTerm,
        "Prazo Máximo",
        &[
            r"(?i)Prazo Máximo:\s*(\d+)\s*meses",
            r"(?i)Prazo maximo:\s*(\d+)\s*meses",
            r"(?i)prazo maximo[:\s]*(\d+)\s*meses",
        ],
    ),
    spec(
        Field::AmortizationSystem,
        "Sistema de Amortização",
        &[
            r"(?m)Sistema de Amortização:[ \t]*([A-Z ]+?)[ \t]*$",
            r"(?im)Sistema[: \t]*([A-Z ]+?)[ \t]*$",
            r"(?im)amortização[: \t]*([A-Z ]+?)[ \t]*$",
        ],
    ),
    spec(
        Field::MaxFinancingQuota,
        "Cota máx. financiamento",
        &[
            r"(?i)Cota máx\.\s*financiamento:\s*(\d+)%",
            r"(?i)Cota max[:\s]*financiamento[:\s]*(\d+)%",
            r"(?i)financiamento[:\s]*(\d+)%",
        ],
    ),
    spec(
        Field::DownPayment,
        "Valor de entrada",
        &[
            r"(?i)Valor de entrada:\s*R?\$\s*([\d.,]+)",
            r"(?i)entrada[:\s]*R?\$\s*([\d.,]+)",
            r"(?i)Valor entrada[:\s]*R?\$\s*([\d.,]+)",
        ],
    ),
    spec(
        Field::DownPaymentIndexed,
        "Entrada Atualizada",
        &[
            r"(?i)Entrada Atualizada:\s*(Sim|Nao|Não)",
            r"(?i)entrada atualizada[:\s]*(Sim|Nao|Não)",
        ],
    ),
    spec(
        Field::Term,
        "Prazo",
        &[r"(?i)Prazo:\s*(\d+)\s*meses", r"(?i)prazo[:\s]*(\d+)\s*meses"],
    ),
    spec(
        Field::FinancedAmount,
        "Valor de Financiamento",
        &[
            r"Valor de Financiamento[\s\S]*?R?\$\s*([\d.,]+)",
            r"(?i)financiamento[:\s]*R?\$\s*([\d.,]+)",
            r"(?i)Valor Financiamento[:\s]*R?\$\s*([\d.,]+)",
            r"Financiamento.*?R\$\s*([\d.,]+)",
        ],
    ),
    spec(
        Field::NotaryAuctionExpense,
        "Despesa Cartorária",
        &[
            r"(?i)Despesa Cartorária/Leiloeiro:\s*R?\$\s*([\d.,]+)",
            r"(?i)Despesa Cartoraria[:\s]*R?\$\s*([\d.,]+)",
            r"(?i)despesa[:\s]*R?\$\s*([\d.,]+)",
        ],
    ),
    spec(
        Field::InsurancePolicy,
        "Apólice de Seguro",
        &[
            r"(?i)Apólice de Seguro:\s*(\d+)",
            r"(?i)Apolice[:\s]*(\d+)",
            r"(?i)seguro[:\s]*(\d+)",
        ],
    ),
    spec(
        Field::FirstInstallment,
        "Primeira Prestação",
        &[
            r"Primeira Prestação[\s\S]*?R?\$\s*([\d.,]+)",
            r"(?i)Primeira prestacao[:\s]*R?\$\s*([\d.,]+)",
            r"(?i)prestação[:\s]*R?\$\s*([\d.,]+)",
        ],
    ),
    FieldSpec {
        field: Field::NominalRate,
        label: "Juros Nominais",
        patterns: &[
            r"(?i)Juros Nominais\s*([\d.,]+)%",
            r"(?i)juros nominais[:\s]*([\d.,]+)%",
        ],
        rate_column: Some(0),
    },
    FieldSpec {
        field: Field::EffectiveRate,
        label: "Juros Efetivos",
        patterns: &[
            r"(?i)Juros Efetivos\s*([\d.,]+)%",
            r"(?i)juros efetivos[:\s]*([\d.,]+)%",
        ],
        rate_column: Some(1),
    },
    spec(
        Field::UpfrontInsurance,
        "Seguro à vista",
        &[
            r"(?i)Seguro à vista\s*R?\$\s*([\d.,]+)",
            r"(?i)Seguro a vista[:\s]*R?\$\s*([\d.,]+)",
            r"(?i)seguro vista[:\s]*R?\$\s*([\d.,]+)",
        ],
    ),
    spec(
        Field::UpfrontFees,
        "Tarifas",
        &[
            r"(?i)Tarifas\s*R?\$\s*([\d.,]+)",
            r"(?i)tarifas[:\s]*R?\$\s*([\d.,]+)",
        ],
    ),
    spec(
        Field::Iof,
        "IOF",
        &[r"(?i)IOF\s*R?\$\s*([\d.,]+)", r"(?i)iof[:\s]*R?\$\s*([\d.,]+)"],
    ),
    spec(
        Field::PrincipalAndInterest,
        "Amortização + Juros",
        &[
            r"(?i)Amortização \+ Juros\s*R?\$\s*([\d.,]+)",
            r"(?i)Amortizacao[\s+]*Juros[:\s]*R?\$\s*([\d.,]+)",
            r"(?i)amortizacao[:\s]*R?\$\s*([\d.,]+)",
        ],
    ),
    spec(
        Field::DfiInsurance,
        "Seguro DFI",
        &[
            r"(?i)Seguro DFI\s*R?\$\s*([\d.,]+)",
            r"(?i)seguro DFI[:\s]*R?\$\s*([\d.,]+)",
            r"(?i)DFI[:\s]*R?\$\s*([\d.,]+)",
        ],
    ),
    spec(
        Field::MipInsurance,
        "Seguro MIP",
        &[
            r"(?i)Seguro MIP\s*R?\$\s*([\d.,]+)",
            r"(?i)seguro MIP[:\s]*R?\$\s*([\d.,]+)",
            r"(?i)MIP[:\s]*R?\$\s*([\d.,]+)",
        ],
    ),
    spec(
        Field::TotalInsurance,
        "Total Seguros",
        &[
            r"(?i)Total Seguros\s*R?\$\s*([\d.,]+)",
            r"(?i)total seguros[:\s]*R?\$\s*([\d.,]+)",
        ],
    ),
    spec(
        Field::AdministrationFee,
        "Taxa de administração",
        &[
            r"(?i)Taxa de administração\s*R?\$\s*([\d.,]+)",
            r"(?i)taxa administracao[:\s]*R?\$\s*([\d.,]+)",
        ],
    ),
    spec(
        Field::CreditRiskFee,
        "Taxa de risco de crédito",
        &[
            r"(?i)Taxa de risco de crédito\s*R?\$\s*([\d.,]+)",
            r"(?i)taxa risco[:\s]*R?\$\s*([\d.,]+)",
        ],
    ),
    spec(
        Field::MonthlyOperatingFee,
        "Taxa operacional mensal",
        &[
            r"(?i)Taxa operacional mensal\s*R?\$\s*([\d.,]+)",
            r"(?i)taxa operacional[:\s]*R?\$\s*([\d.,]+)",
        ],
    ),
    spec(
        Field::TotalInstallment,
        "TOTAL",
        &[
            r"(?i)Componentes da prestação[\s\S]*?TOTAL\s*R?\$\s*([\d.,]+)",
            r"(?i)TOTAL[:\s]*R?\$\s*([\d.,]+)",
        ],
    ),
    spec(
        Field::ResourceOrigin,
        "Origem De Recurso",
        &[
            r"(?i)Origem De Recurso:\s*(\w+)",
            r"(?i)origem recurso[:\s]*(\w+)",
        ],
    ),
    spec(
        Field::PersonType,
        "Tipo De Pessoa",
        &[r"(?i)Tipo De Pessoa:\s*(\w+)", r"(?i)tipo pessoa[:\s]*(\w+)"],
    ),
    spec(
        Field::PersonCategory,
        "Categoria De Pessoa",
        &[
            r"(?i)Categoria De Pessoa:[ \t]*([^\n]+)",
            r"(?i)categoria pessoa[: \t]*([^\n]+)",
        ],
    ),
    spec(
        Field::FinancingType,
        "Tipo De Financiamento",
        &[
            r"(?i)Tipo De Financiamento:[ \t]*([^\n]+)",
            r"(?i)tipo financiamento[: \t]*([^\n]+)",
        ],
    ),
    spec(
        Field::PropertyCategory,
        "Categoria De Imóvel",
        &[
            r"(?i)Categoria De Imóvel:[ \t]*([^\n]+)",
            r"(?i)categoria imovel[: \t]*([^\n]+)",
        ],
    ),
    spec(
        Field::City,
        "Cidade",
        &[r"(?i)Cidade:[ \t]*([^\n]+)", r"(?i)cidade[: \t]*([^\n]+)"],
    ),
    spec(
        Field::ConstructionTerm,
        "Prazo De Obra",
        &[
            r"(?i)Prazo De Obra:\s*(\d+)\s*Meses",
            r"(?i)prazo obra[:\s]*(\d+)\s*meses",
        ],
    ),
    spec(
        Field::FamilyIncome,
        "Renda Familiar",
        &[
            r"(?i)Renda Familiar:\s*R?\$\s*([\d.,]+)",
            r"(?i)renda familiar[:\s]*R?\$\s*([\d.,]+)",
            r"(?i)Renda[:\s]*R?\$\s*([\d.,]+)",
        ],
    ),
    spec(
        Field::Participants,
        "Número De Participantes",
        &[
            r"(?i)Número De Participantes:\s*(\d+)",
            r"(?i)numero participantes[:\s]*(\d+)",
            r"(?i)participantes[:\s]*(\d+)",
        ],
    ),
];

const BIRTH_PACT_PATTERNS: &[&str] = &[
    r"(?i)Pactuação Nascimento\s*([\d.,]+)%\s*(\d{2}/\d{2}/\d{4})",
    r"(?i)pactuacao nascimento[:\s]*([\d.,]+)%\s*(\d{2}/\d{2}/\d{4})",
];

const RATE_TABLE_HEADER: [&str; 3] = ["Primeira Prestação", "Juros Nominais", "Juros Efetivos"];

const RATE_TABLE_PATTERN: &str = r"Primeira Prestação.*?Juros Nominais.*?Juros Efetivos[ \t]*\n[ \t]*R?\$[ \t]*[\d.,]+[ \t]+([\d.,]+)%[ \t]*([\d.,]+)%";

struct CompiledField {
    label: &'static str,
    patterns: Vec<Regex>,
    rate_column: Option<usize>,
}

/// Every regular expression the extractor uses, compiled once per process.
pub struct PatternTable {
    fields: BTreeMap<Field, CompiledField>,
    birth_pact: Vec<Regex>,
    rate_table: Regex,
    line_token: Regex,
    line_currency: Regex,
    rate_row_token: Regex,
}

impl PatternTable {
    fn compile() -> std::result::Result<Self, regex::Error> {
        let mut fields = BTreeMap::new();
        for spec in FIELD_SPECS {
            let patterns = spec
                .patterns
                .iter()
                .map(|p| Regex::new(p))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            fields.insert(
                spec.field,
                CompiledField {
                    label: spec.label,
                    patterns,
                    rate_column: spec.rate_column,
                },
            );
        }

        Ok(Self {
            fields,
            birth_pact: BIRTH_PACT_PATTERNS
                .iter()
                .map(|p| Regex::new(p))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            rate_table: Regex::new(RATE_TABLE_PATTERN)?,
            line_token: Regex::new(r"(\d[\d.,]*%?)")?,
            line_currency: Regex::new(r"R?\$\s*(\d[\d.,]*)")?,
            rate_row_token: Regex::new(r"R?\$\s*(\d[\d.,]*)|(\d[\d.,]*)%")?,
        })
    }

    pub fn shared() -> Result<&'static PatternTable> {
        static TABLE: OnceLock<std::result::Result<PatternTable, regex::Error>> = OnceLock::new();
        TABLE
            .get_or_init(PatternTable::compile)
            .as_ref()
            .map_err(|e| e.clone().into())
    }
}

type Matcher = fn(&FieldExtractor<'_>, &CompiledField) -> Option<String>;

/// Matchers in priority order; the first one to produce a capture wins.
const MATCHERS: &[(&str, Matcher)] = &[
    ("pattern", match_patterns),
    ("rate table", match_rate_table),
    ("line scan", scan_labelled_lines),
];

type LineProbe = fn(&PatternTable, &[&str], usize) -> Option<String>;

/// Probes tried on each line that mentions a field's label.
const LINE_PROBES: &[LineProbe] = &[same_line_token, next_line_currency, next_line_token];

pub struct FieldExtractor<'a> {
    text: &'a str,
    lines: Vec<&'a str>,
    table: &'static PatternTable,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(text: &'a str, table: &'static PatternTable) -> Self {
        let lines = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        Self { text, lines, table }
    }

    /// Runs the matcher chain for one field; `None` when every strategy is exhausted.
    pub fn extract_field(&self, field: Field) -> Option<String> {
        let compiled = self.table.fields.get(&field)?;
        MATCHERS.iter().find_map(|(name, matcher)| {
            let value = matcher(self, compiled)?;
            if *name != "pattern" {
                debug!("{:?} recovered by {} fallback: '{}'", field, name, value);
            }
            Some(value)
        })
    }

    pub fn money(&self, field: Field) -> Option<f64> {
        self.extract_field(field).map(|v| parse_monetary(&v))
    }

    pub fn count(&self, field: Field) -> Option<u32> {
        self.extract_field(field).and_then(|v| parse_integer(&v))
    }

    pub fn text(&self, field: Field) -> Option<String> {
        self.extract_field(field).filter(|v| !v.is_empty())
    }

    pub fn flag(&self, field: Field) -> Option<bool> {
        self.extract_field(field).and_then(|v| parse_flag(&v))
    }

    /// Birth-pact rate and date, which only make sense captured together.
    pub fn birth_pact(&self) -> Option<(f64, String)> {
        self.table.birth_pact.iter().find_map(|re| {
            let caps = re.captures(self.text)?;
            let rate = caps.get(1)?.as_str();
            let date = caps.get(2)?.as_str();
            Some((parse_monetary(rate), date.to_string()))
        })
    }
}

fn match_patterns(extractor: &FieldExtractor<'_>, field: &CompiledField) -> Option<String> {
    field.patterns.iter().find_map(|re| {
        re.captures(extractor.text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    })
}

/// Reads a rate from the row under the "Primeira Prestação | Juros Nominais |
/// Juros Efetivos" header, first with a whole-text pattern and then by
/// splitting the data line into tokens.
fn match_rate_table(extractor: &FieldExtractor<'_>, field: &CompiledField) -> Option<String> {
    let column = field.rate_column?;
    let table = extractor.table;

    if let Some(value) = table
        .rate_table
        .captures(extractor.text)
        .and_then(|caps| caps.get(column + 1))
    {
        return Some(value.as_str().to_string());
    }

    let header: Vec<String> = RATE_TABLE_HEADER.iter().map(|h| h.to_lowercase()).collect();
    for (idx, line) in extractor.lines.iter().enumerate() {
        let lower = line.to_lowercase();
        if !header.iter().all(|h| lower.contains(h.as_str())) {
            continue;
        }
        let Some(data_line) = extractor.lines.get(idx + 1) else {
            continue;
        };

        let tokens: Vec<&str> = table
            .rate_row_token
            .captures_iter(data_line)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str())
            .collect();

        // installment, nominal, effective
        if tokens.len() >= 3 {
            if let Some(value) = tokens.get(column + 1) {
                return Some(value.to_string());
            }
        }
    }

    None
}

fn scan_labelled_lines(extractor: &FieldExtractor<'_>, field: &CompiledField) -> Option<String> {
    if field.label.is_empty() {
        return None;
    }
    let label = field.label.to_lowercase();

    extractor
        .lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.to_lowercase().contains(&label))
        .find_map(|(idx, _)| {
            LINE_PROBES
                .iter()
                .find_map(|probe| probe(extractor.table, &extractor.lines, idx))
        })
}

fn same_line_token(table: &PatternTable, lines: &[&str], idx: usize) -> Option<String> {
    first_capture(&table.line_token, lines.get(idx)?)
}

fn next_line_currency(table: &PatternTable, lines: &[&str], idx: usize) -> Option<String> {
    first_capture(&table.line_currency, lines.get(idx + 1)?)
}

fn next_line_token(table: &PatternTable, lines: &[&str], idx: usize) -> Option<String> {
    first_capture(&table.line_token, lines.get(idx + 1)?)
}

fn first_capture(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Keeps only capital letters and single spaces ("PRICE  TR." -> "PRICE TR").
fn clean_system_label(raw: &str) -> String {
    raw.to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits "Cidade - UF" into city and state.
fn split_city_state(raw: &str) -> (Option<String>, Option<String>) {
    let mut parts = raw.splitn(2, '-').map(str::trim);
    let city = parts
        .next()
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .or_else(|| Some(raw.trim().to_string()).filter(|c| !c.is_empty()));
    let state = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    (city, state)
}

/// Extracts every known field from `text` without any cross-field correction.
pub fn extract_raw_record(text: &str) -> Result<RawExtractedRecord> {
    let normalized = text.replace("\r\n", "\n");
    let table = PatternTable::shared()?;
    let ex = FieldExtractor::new(&normalized, table);

    let (city, state) = match ex.text(Field::City) {
        Some(raw) => split_city_state(&raw),
        None => (None, None),
    };
    let (birth_pact_rate, birth_date) = match ex.birth_pact() {
        Some((rate, date)) => (Some(rate), Some(date)),
        None => (None, None),
    };

    Ok(RawExtractedRecord {
        property_value: ex.money(Field::PropertyValue),
        max_term_months: ex.count(Field::MaxTerm),
        amortization_system: ex
            .text(Field::AmortizationSystem)
            .map(|s| clean_system_label(&s))
            .filter(|s| !s.is_empty()),
        max_financing_quota: ex.count(Field::MaxFinancingQuota),
        down_payment: ex.money(Field::DownPayment),
        down_payment_indexed: ex.flag(Field::DownPaymentIndexed),
        term_months: ex.count(Field::Term),
        financed_amount: ex.money(Field::FinancedAmount),
        notary_auction_expense: ex.money(Field::NotaryAuctionExpense),
        insurance_policy: ex
            .extract_field(Field::InsurancePolicy)
            .and_then(|v| v.parse().ok()),
        incorporate_fees: Some(true),
        first_installment: ex.money(Field::FirstInstallment),
        nominal_rate: ex.money(Field::NominalRate),
        effective_rate: ex.money(Field::EffectiveRate),
        upfront_insurance: ex.money(Field::UpfrontInsurance),
        upfront_fees: ex.money(Field::UpfrontFees),
        iof: ex.money(Field::Iof),
        principal_and_interest: ex.money(Field::PrincipalAndInterest),
        dfi_insurance: ex.money(Field::DfiInsurance),
        mip_insurance: ex.money(Field::MipInsurance),
        total_insurance: ex.money(Field::TotalInsurance),
        administration_fee: ex.money(Field::AdministrationFee),
        credit_risk_fee: ex.money(Field::CreditRiskFee),
        monthly_operating_fee: ex.money(Field::MonthlyOperatingFee),
        total_installment: ex.money(Field::TotalInstallment),
        resource_origin: ex.text(Field::ResourceOrigin),
        person_type: ex.text(Field::PersonType),
        person_category: ex.text(Field::PersonCategory),
        financing_type: ex.text(Field::FinancingType),
        property_category: ex.text(Field::PropertyCategory),
        city,
        state,
        construction_term_months: ex.count(Field::ConstructionTerm),
        family_income: ex.money(Field::FamilyIncome),
        participants: ex.count(Field::Participants),
        birth_pact_rate,
        birth_date,
    })
}
