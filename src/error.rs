use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinancingError {
    #[error("Missing required financing field: {0}")]
    MissingRequiredField(String),

    #[error("Invalid term {0}: must be at least one month")]
    InvalidTerm(u32),

    #[error("More than one extraordinary payment scheduled for month {month}")]
    DuplicateExtraordinaryPayment { month: u32 },

    #[error("Invalid extraordinary payment for month {month}: {details}")]
    InvalidExtraordinaryPayment { month: u32, details: String },

    #[error("Could not extract a financing record from the document text")]
    ExtractionFailed,

    #[error("Extracted record failed validation: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Pattern compilation error: {0}")]
    PatternError(#[from] regex::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FinancingError>;
