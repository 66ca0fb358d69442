//! Amount parsing: currency text to a signed `f64`.

use serde::{Deserialize, Serialize};

use crate::error::RowErrorKind;
use crate::models::CellValue;

/// How the source writes signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountConvention {
    /// Expenses are negative, income positive.
    #[default]
    Signed,
    /// Card statements that list purchases as positive numbers.
    ChargesPositive,
}

impl AmountConvention {
    pub fn apply(&self, amount: f64) -> f64 {
        match self {
            Self::Signed => amount,
            Self::ChargesPositive => -amount,
        }
    }
}

pub trait AmountNormalizer: Send + Sync {
    fn normalize(&self, raw: &CellValue) -> Result<f64, RowErrorKind>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardAmountNormalizer;

impl AmountNormalizer for StandardAmountNormalizer {
    fn normalize(&self, raw: &CellValue) -> Result<f64, RowErrorKind> {
        let parsed = match raw {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Text(s) => parse_amount(s),
            _ => None,
        };
        parsed.ok_or_else(|| RowErrorKind::UnparseableAmount { raw: raw.to_text() })
    }
}

const CURRENCY_CODES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "CAD", "AUD", "CHF", "CNY", "INR", "MXN", "NZD", "SEK", "NOK",
    "DKK",
];
const DEBIT_MARKERS: &[&str] = &["DEBIT", "DR"];
const CREDIT_MARKERS: &[&str] = &["CREDIT", "CR"];

fn is_currency_symbol(c: char) -> bool {
    matches!(
        c,
        '$' | '¢' | '£' | '¤' | '¥' | '֏' | '؋' | '৲' | '৳' | '฿' | '៛' | '﷼' | '﹩' | '＄'
            | '￠' | '￡' | '￥' | '￦' | '\u{20A0}'..='\u{20CF}'
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ForcedSign {
    Negative,
    Positive,
}

/// Strip a trailing `CR`/`DR`-style marker, case-insensitively.
fn strip_marker(s: &str) -> (&str, Option<ForcedSign>) {
    let upper = s.to_ascii_uppercase();
    let groups = [
        (DEBIT_MARKERS, ForcedSign::Negative),
        (CREDIT_MARKERS, ForcedSign::Positive),
    ];
    for (markers, sign) in groups {
        for marker in markers {
            if let Some(head) = upper.strip_suffix(marker) {
                if head.chars().last().map_or(true, |c| !c.is_ascii_alphabetic()) {
                    return (s[..head.len()].trim_end(), Some(sign));
                }
            }
        }
    }
    (s, None)
}

fn strip_currency_code(s: &str) -> &str {
    let upper = s.to_ascii_uppercase();
    for code in CURRENCY_CODES {
        if upper.starts_with(code) {
            return s[code.len()..].trim_start();
        }
        if upper.ends_with(code) {
            return s[..s.len() - code.len()].trim_end();
        }
    }
    s
}

fn is_thousands_grouped(s: &str, sep: char) -> bool {
    let mut groups = s.split(sep);
    let head_ok = groups
        .next()
        .map_or(false, |g| (1..=3).contains(&g.len()));
    head_ok && groups.all(|g| g.len() == 3)
}

/// Resolve thousands separators and decimal commas into a plain `1234.56`.
fn normalize_separators(s: &str) -> Option<String> {
    let s: String = s
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}' | '\'' | '_'))
        .collect();
    let commas = s.matches(',').count();
    let dots = s.matches('.').count();
    let out = match (commas, dots) {
        (0, 0) | (0, 1) => s,
        (0, _) if is_thousands_grouped(&s, '.') => s.replace('.', ""),
        (0, _) => return None,
        (_, 0) if is_thousands_grouped(&s, ',') => s.replace(',', ""),
        (1, 0) => s.replace(',', "."),
        (_, 0) => return None,
        _ => {
            let last_comma = s.rfind(',')?;
            let last_dot = s.rfind('.')?;
            if last_dot > last_comma {
                s.replace(',', "")
            } else {
                s.replace('.', "").replace(',', ".")
            }
        }
    };
    Some(out)
}

/// Parse currency-formatted text. `None` when no numeric value can be found.
///
/// Parentheses, a trailing `-` or a `DR` marker force a negative result; `CR`
/// or a trailing `+` force a positive one. Otherwise the written sign is kept.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.trim().trim_matches('"').trim();
    let (s, mut forced) = strip_marker(s);
    let s: String = s.chars().filter(|c| !is_currency_symbol(*c)).collect();
    let mut s = strip_currency_code(s.trim()).trim();

    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        s = inner.trim();
        forced = Some(ForcedSign::Negative);
    }

    let mut negative = false;
    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest.trim_start();
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest.trim_start();
    }
    if let Some(rest) = s.strip_suffix('-') {
        forced.get_or_insert(ForcedSign::Negative);
        s = rest.trim_end();
    } else if let Some(rest) = s.strip_suffix('+') {
        forced.get_or_insert(ForcedSign::Positive);
        s = rest.trim_end();
    }

    let body = normalize_separators(s)?;
    if !body.chars().any(|c| c.is_ascii_digit())
        || !body
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return None;
    }
    let value: f64 = body.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    Some(match forced {
        Some(ForcedSign::Negative) => -value,
        Some(ForcedSign::Positive) => value,
        None if negative => -value,
        None => value,
    })
}
