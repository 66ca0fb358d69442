//! Field extraction: locate the date, description and amount cells of a row.

use crate::error::{ConfigError, FieldRole, RowErrorKind};
use crate::models::{CellValue, RawRow};

const DATE_ALIASES: &[&str] = &[
    "date",
    "transaction date",
    "trans date",
    "post date",
    "posted date",
    "posting date",
    "effective date",
    "time",
];
const DESCRIPTION_ALIASES: &[&str] = &[
    "description",
    "transaction",
    "merchant",
    "details",
    "name",
    "payee",
    "memo",
];
const AMOUNT_ALIASES: &[&str] = &["amount", "amt", "value", "transaction amount"];
const DEBIT_ALIASES: &[&str] = &["debit", "withdrawal", "charge", "expense", "payment"];
const CREDIT_ALIASES: &[&str] = &["credit", "deposit", "refund", "return"];

/// A reference to a column: by header name or by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    Name(String),
    Index(usize),
}

impl ColumnRef {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    fn resolve<'a>(&self, row: &'a RawRow) -> Option<&'a CellValue> {
        match self {
            Self::Name(name) => row.get_by_name(name),
            Self::Index(i) => row.get(*i),
        }
    }
}

/// Ordered candidate columns for one role. The first one present in a row wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    candidates: Vec<ColumnRef>,
}

impl ColumnSpec {
    pub fn new(candidates: Vec<ColumnRef>) -> Self {
        Self { candidates }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(vec![ColumnRef::name(name)])
    }

    pub fn index(index: usize) -> Self {
        Self::new(vec![ColumnRef::Index(index)])
    }

    /// Add a positional fallback tried after the named candidates.
    pub fn or_index(mut self, index: usize) -> Self {
        self.candidates.push(ColumnRef::Index(index));
        self
    }

    pub fn or_name(mut self, name: impl Into<String>) -> Self {
        self.candidates.push(ColumnRef::name(name));
        self
    }

    pub fn candidates(&self) -> &[ColumnRef] {
        &self.candidates
    }

    fn locate<'a>(&self, row: &'a RawRow) -> Option<&'a CellValue> {
        self.candidates.iter().find_map(|c| c.resolve(row))
    }

    /// Like `locate`, but skips candidates whose cell is blank when a later
    /// candidate has a value. Used for dates, where statements often leave the
    /// transaction date empty and fill the posting date.
    fn locate_filled<'a>(&self, row: &'a RawRow) -> Option<&'a CellValue> {
        let mut first = None;
        for cell in self.candidates.iter().filter_map(|c| c.resolve(row)) {
            if !cell.is_blank() {
                return Some(cell);
            }
            first.get_or_insert(cell);
        }
        first
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountColumns {
    Single(ColumnSpec),
    Split { debit: ColumnSpec, credit: ColumnSpec },
}

/// The adapter's declaration of where each role lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRoles {
    pub date: ColumnSpec,
    pub description: ColumnSpec,
    pub amount: AmountColumns,
}

impl Default for ColumnRoles {
    /// `Date`, `Description`, `Amount` by name, falling back to positions 0, 1, 2.
    fn default() -> Self {
        Self {
            date: ColumnSpec::named("date").or_index(0),
            description: ColumnSpec::named("description").or_index(1),
            amount: AmountColumns::Single(ColumnSpec::named("amount").or_index(2)),
        }
    }
}

fn find_alias(normalized: &[String], aliases: &[&str]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|alias| normalized.iter().position(|h| h == alias))
}

impl ColumnRoles {
    /// Purely positional roles for header-less sources.
    pub fn positional(date: usize, description: usize, amount: usize) -> Self {
        Self {
            date: ColumnSpec::index(date),
            description: ColumnSpec::index(description),
            amount: AmountColumns::Single(ColumnSpec::index(amount)),
        }
    }

    /// Infer roles from a header row using the usual bank-export column names.
    ///
    /// A single amount column is preferred; otherwise both a debit and a
    /// credit column are required.
    pub fn detect<S: AsRef<str>>(headers: &[S]) -> Result<Self, ConfigError> {
        let normalized: Vec<String> = headers
            .iter()
            .map(|h| {
                h.as_ref()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase()
            })
            .collect();
        let original = |i: usize| headers[i].as_ref().to_string();

        let date_idx =
            find_alias(&normalized, DATE_ALIASES).ok_or(ConfigError::MissingColumn(FieldRole::Date))?;
        let mut date = ColumnSpec::named(original(date_idx));
        for (i, h) in normalized.iter().enumerate() {
            if i != date_idx && DATE_ALIASES.contains(&h.as_str()) {
                date = date.or_name(original(i));
            }
        }

        let desc_idx = find_alias(&normalized, DESCRIPTION_ALIASES)
            .ok_or(ConfigError::MissingColumn(FieldRole::Description))?;
        let description = ColumnSpec::named(original(desc_idx));

        let amount = match find_alias(&normalized, AMOUNT_ALIASES) {
            Some(i) => AmountColumns::Single(ColumnSpec::named(original(i))),
            None => {
                let debit = find_alias(&normalized, DEBIT_ALIASES);
                let credit = find_alias(&normalized, CREDIT_ALIASES);
                match (debit, credit) {
                    (Some(d), Some(c)) => AmountColumns::Split {
                        debit: ColumnSpec::named(original(d)),
                        credit: ColumnSpec::named(original(c)),
                    },
                    _ => return Err(ConfigError::MissingColumn(FieldRole::Amount)),
                }
            }
        };

        Ok(Self {
            date,
            description,
            amount,
        })
    }
}

/// Raw amount cell(s) pulled from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAmount {
    Single(CellValue),
    Split { debit: CellValue, credit: CellValue },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawFields {
    pub date: CellValue,
    pub description: CellValue,
    pub amount: RawAmount,
}

pub trait FieldExtractor: Send + Sync {
    fn extract(&self, row: &RawRow) -> Result<RawFields, RowErrorKind>;
}

/// Extractor driven by declared [`ColumnRoles`].
#[derive(Debug, Clone, Default)]
pub struct RoleExtractor {
    roles: ColumnRoles,
}

impl RoleExtractor {
    pub fn new(roles: ColumnRoles) -> Self {
        Self { roles }
    }

    pub fn roles(&self) -> &ColumnRoles {
        &self.roles
    }
}

fn required(cell: Option<&CellValue>, role: FieldRole) -> Result<CellValue, RowErrorKind> {
    cell.cloned().ok_or(RowErrorKind::MissingField { role })
}

impl FieldExtractor for RoleExtractor {
    fn extract(&self, row: &RawRow) -> Result<RawFields, RowErrorKind> {
        let date = required(self.roles.date.locate_filled(row), FieldRole::Date)?;
        let description = required(
            self.roles.description.locate(row),
            FieldRole::Description,
        )?;
        let amount = match &self.roles.amount {
            AmountColumns::Single(spec) => {
                RawAmount::Single(required(spec.locate(row), FieldRole::Amount)?)
            }
            AmountColumns::Split { debit, credit } => RawAmount::Split {
                debit: required(debit.locate(row), FieldRole::Debit)?,
                credit: required(credit.locate(row), FieldRole::Credit)?,
            },
        };
        Ok(RawFields {
            date,
            description,
            amount,
        })
    }
}
