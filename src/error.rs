use thiserror::Error;

use crate::models::{Fundamental, TransactionType};

/// Which column role an extractor was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Date,
    Description,
    Amount,
    Debit,
    Credit,
}

impl FieldRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Description => "description",
            Self::Amount => "amount",
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

impl std::fmt::Display for FieldRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The invariant an assembled record broke.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Violation {
    #[error("date '{0}' is not a valid YYYY-MM-DD date")]
    InvalidDate(String),

    #[error("name is empty")]
    EmptyName,

    #[error("amount {0} is not a finite number")]
    NonFiniteAmount(f64),

    #[error("fundamental {fundamental} does not match type {kind}")]
    FundamentalMismatch {
        kind: TransactionType,
        fundamental: Fundamental,
    },

    #[error("amount {amount} has the wrong sign for type {kind}")]
    SignMismatch { kind: TransactionType, amount: f64 },
}

/// Why a single row was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowErrorKind {
    #[error("missing {role} field")]
    MissingField { role: FieldRole },

    #[error("unparseable date '{raw}'")]
    UnparseableDate { raw: String },

    #[error("unparseable amount '{raw}'")]
    UnparseableAmount { raw: String },

    #[error("invalid record: {0}")]
    InvalidRecord(Violation),
}

impl RowErrorKind {
    /// Short machine-friendly name of the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "missing_field",
            Self::UnparseableDate { .. } => "unparseable_date",
            Self::UnparseableAmount { .. } => "unparseable_amount",
            Self::InvalidRecord(_) => "invalid_record",
        }
    }
}

/// A rejected row: its zero-based position in the input plus the cause.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("row {row}: {kind}")]
pub struct RowError {
    pub row: usize,
    pub kind: RowErrorKind,
}

impl RowError {
    pub fn new(row: usize, kind: RowErrorKind) -> Self {
        Self { row, kind }
    }
}

/// Configuration problems. Always raised before any row is processed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("rule '{rule}': invalid pattern: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule '{0}' has no patterns")]
    EmptyRule(String),

    #[error("rule '{0}' has an empty category")]
    EmptyCategory(String),

    #[error("noise pattern '{name}' is invalid: {source}")]
    InvalidNoisePattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("no column found for the {0} role")]
    MissingColumn(FieldRole),

    #[error("worker count must be at least 1")]
    ZeroWorkers,
}

#[derive(Error, Debug)]
pub enum TxnormError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Row(#[from] RowError),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, TxnormError>;
