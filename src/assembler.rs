//! Record assembly and final invariant checks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::categorizer::Classification;
use crate::error::Violation;
use crate::models::{CanonicalTransaction, TransactionType};

/// Which amounts a transaction type accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignRule {
    Any,
    NonNegative,
    NonPositive,
}

impl SignRule {
    pub fn admits(&self, amount: f64) -> bool {
        match self {
            Self::Any => true,
            Self::NonNegative => amount >= 0.0,
            Self::NonPositive => amount <= 0.0,
        }
    }
}

/// Per-type sign expectations. Missing keys in settings take these defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignPolicy {
    pub income: SignRule,
    pub expense: SignRule,
    pub debt: SignRule,
    pub savings: SignRule,
    pub investment: SignRule,
}

impl Default for SignPolicy {
    fn default() -> Self {
        Self {
            income: SignRule::NonNegative,
            expense: SignRule::NonPositive,
            debt: SignRule::NonPositive,
            savings: SignRule::Any,
            investment: SignRule::Any,
        }
    }
}

impl SignPolicy {
    /// Accepts any sign for every type.
    pub fn permissive() -> Self {
        Self {
            income: SignRule::Any,
            expense: SignRule::Any,
            debt: SignRule::Any,
            savings: SignRule::Any,
            investment: SignRule::Any,
        }
    }

    pub fn rule_for(&self, kind: TransactionType) -> SignRule {
        match kind {
            TransactionType::Income => self.income,
            TransactionType::Expense => self.expense,
            TransactionType::Debt => self.debt,
            TransactionType::Savings => self.savings,
            TransactionType::Investment => self.investment,
        }
    }

    /// A refund rule lets money flow back on an expense or debt line.
    pub fn admits(&self, kind: TransactionType, amount: f64, refund: bool) -> bool {
        let refunded = refund
            && amount > 0.0
            && matches!(kind, TransactionType::Expense | TransactionType::Debt);
        refunded || self.rule_for(kind).admits(amount)
    }
}

fn is_canonical_date(date: &str) -> bool {
    date.len() == 10 && NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
}

/// Build the canonical record and re-check every invariant on it.
pub fn assemble(
    date: String,
    name: String,
    amount: f64,
    classification: Classification,
    policy: &SignPolicy,
) -> Result<CanonicalTransaction, Violation> {
    if !is_canonical_date(&date) {
        return Err(Violation::InvalidDate(date));
    }
    if name.trim().is_empty() {
        return Err(Violation::EmptyName);
    }
    if !amount.is_finite() {
        return Err(Violation::NonFiniteAmount(amount));
    }
    let Classification {
        kind,
        category,
        fundamental,
        essential,
        fixed,
        refund,
        ..
    } = classification;
    if fundamental != kind.fundamental() {
        return Err(Violation::FundamentalMismatch { kind, fundamental });
    }
    if !policy.admits(kind, amount, refund) {
        return Err(Violation::SignMismatch { kind, amount });
    }
    Ok(CanonicalTransaction {
        date,
        name,
        amount,
        kind,
        category,
        fundamental,
        essential,
        fixed,
    })
}
