use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single raw cell as handed over by a format adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text rendering used in error messages and by the name cleaner.
    pub fn to_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s)
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

/// One input row: cells in source order, each tagged with its column header.
///
/// Adapters without a header row use an empty string as the header; such cells
/// are still reachable by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    cells: Vec<(String, CellValue)>,
}

fn normalize_header(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<CellValue>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Build a header-less row from positional values.
    pub fn from_values<V, I>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        Self {
            cells: values
                .into_iter()
                .map(|v| (String::new(), v.into()))
                .collect(),
        }
    }

    pub fn push(&mut self, header: impl Into<String>, value: impl Into<CellValue>) {
        self.cells.push((header.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.cells.get(index).map(|(_, v)| v)
    }

    /// Look a cell up by header, ignoring case and whitespace differences.
    pub fn get_by_name(&self, name: &str) -> Option<&CellValue> {
        let wanted = normalize_header(name);
        self.cells
            .iter()
            .find(|(h, _)| normalize_header(h) == wanted)
            .map(|(_, v)| v)
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(h, _)| h.as_str())
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.is_blank())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
    Debt,
    Savings,
    Investment,
}

impl TransactionType {
    pub const ALL: [TransactionType; 5] = [
        Self::Income,
        Self::Expense,
        Self::Debt,
        Self::Savings,
        Self::Investment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Debt => "debt",
            Self::Savings => "savings",
            Self::Investment => "investment",
        }
    }

    /// The fixed type → fundamental bijection.
    pub fn fundamental(&self) -> Fundamental {
        match self {
            Self::Income => Fundamental::Income,
            Self::Expense => Fundamental::Expenses,
            Self::Debt => Fundamental::Debts,
            Self::Savings => Fundamental::Savings,
            Self::Investment => Fundamental::Investments,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fundamental {
    Income,
    Expenses,
    Debts,
    Savings,
    Investments,
}

impl Fundamental {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "Income",
            Self::Expenses => "Expenses",
            Self::Debts => "Debts",
            Self::Savings => "Savings",
            Self::Investments => "Investments",
        }
    }
}

impl fmt::Display for Fundamental {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The normalized output record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    pub date: String,
    pub name: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
    pub fundamental: Fundamental,
    pub essential: bool,
    pub fixed: bool,
}
