//! Merchant name cleaning.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub trait NameCleaner: Send + Sync {
    /// Never returns an empty string for non-blank input.
    fn clean(&self, raw: &str) -> String;
}

/// A named noise pattern as written in settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoisePatternDef {
    pub name: String,
    pub pattern: String,
}

impl NoisePatternDef {
    pub fn new(name: &str, pattern: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
        }
    }
}

/// Built-in noise classes, applied in this order.
pub fn default_noise_patterns() -> Vec<NoisePatternDef> {
    vec![
        NoisePatternDef::new(
            "card_purchase_prefix",
            r"^(?:debit card purchase|check ?card purchase|check ?card(?:\s+\d{4})?|purchase authorized on \d{1,2}/\d{1,2}|recurring payment(?: authorized on \d{1,2}/\d{1,2})?|ach (?:debit|credit)|point of sale)\b",
        ),
        NoisePatternDef::new(
            "pos_boilerplate",
            r"\b(?:pos|dbt|atm)\s+(?:debit|purchase|withdrawal|transaction)\b",
        ),
        NoisePatternDef::new(
            "masked_card",
            r"\bcard\s+ending\s+(?:in\s+)?(?:x+|\*+)?\d{4}\b|(?:x{2,}|\*{2,})\d{4}\b",
        ),
        NoisePatternDef::new("date_fragment", r"\b\d{1,2}/\d{2}(?:/\d{2,4})?\b"),
        NoisePatternDef::new("store_number", r"#\s*\d+\b"),
        // Four or more digits, or a digit-led token of five or more characters.
        // Short tokens such as 401K or 365 are part of the name.
        NoisePatternDef::new(
            "trailing_reference",
            r"(?:\s+[#*]?(?:\d{4,}|\d[\w\-/.]{4,}))+$",
        ),
    ]
}

/// Brands whose own capitalization beats title-casing.
pub const DEFAULT_BRAND_EXCEPTIONS: &[&str] = &[
    "eBay", "iCloud", "iTunes", "iPhone", "PayPal", "McDonald's", "YouTube", "DoorDash",
    "GitHub", "LinkedIn", "WhatsApp", "JetBlue", "FedEx", "HomeGoods", "TJMaxx", "AT&T",
    "UPS", "USPS", "CVS", "KFC", "IKEA", "H&M", "HBO", "AMC", "BP", "IRS", "USAA", "ATM",
];

const SMALL_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "by", "for", "in", "of", "or", "the", "to", "with",
];

const EDGE_SEPARATORS: &[char] = &['-', '*', ',', ':', ';', '/', '|', '~'];

const MAX_PASSES: usize = 16;

#[derive(Debug, Clone)]
struct NoisePattern {
    name: String,
    regex: Regex,
}

#[derive(Debug, Clone)]
pub struct PatternNameCleaner {
    noise: Vec<NoisePattern>,
    brands: HashMap<String, String>,
}

impl PatternNameCleaner {
    /// Compile noise patterns (case-insensitive) and the brand list.
    pub fn new<S: AsRef<str>>(
        patterns: &[NoisePatternDef],
        brands: &[S],
    ) -> Result<Self, ConfigError> {
        let noise = patterns
            .iter()
            .map(|def| {
                Regex::new(&format!("(?i){}", def.pattern))
                    .map(|regex| NoisePattern {
                        name: def.name.clone(),
                        regex,
                    })
                    .map_err(|source| ConfigError::InvalidNoisePattern {
                        name: def.name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let brands = brands
            .iter()
            .map(|b| (b.as_ref().to_lowercase(), b.as_ref().to_string()))
            .collect();
        Ok(Self { noise, brands })
    }

    /// Defaults plus any extra patterns and brands from settings.
    pub fn with_extras(
        extra_patterns: &[NoisePatternDef],
        extra_brands: &[String],
    ) -> Result<Self, ConfigError> {
        let mut patterns = default_noise_patterns();
        patterns.extend_from_slice(extra_patterns);
        let mut brands: Vec<String> = DEFAULT_BRAND_EXCEPTIONS
            .iter()
            .map(|b| b.to_string())
            .collect();
        brands.extend_from_slice(extra_brands);
        Self::new(&patterns, &brands)
    }

    pub fn standard() -> Result<Self, ConfigError> {
        Self::with_extras(&[], &[])
    }

    pub fn pattern_names(&self) -> impl Iterator<Item = &str> {
        self.noise.iter().map(|p| p.name.as_str())
    }

    fn strip_noise(&self, text: &str) -> String {
        let mut out = text.to_string();
        for pattern in &self.noise {
            out = pattern.regex.replace(&out, " ").into_owned();
        }
        out
    }

    fn title_case_token(&self, token: &str, first: bool) -> String {
        let lower = token.to_lowercase();
        if let Some(brand) = self.brands.get(&lower) {
            return brand.clone();
        }
        let has_lower = token.chars().any(char::is_lowercase);
        let has_upper = token.chars().any(char::is_uppercase);
        if has_lower && has_upper {
            return token.to_string();
        }
        if !first && SMALL_WORDS.contains(&lower.as_str()) {
            return lower;
        }
        let mut out = String::with_capacity(token.len());
        let mut at_boundary = true;
        for c in token.chars() {
            if c.is_alphabetic() {
                if at_boundary {
                    out.extend(c.to_uppercase());
                } else {
                    out.extend(c.to_lowercase());
                }
                at_boundary = false;
            } else {
                out.push(c);
                if matches!(c, '-' | '/' | '.' | '(' | '&' | '+') {
                    at_boundary = true;
                }
            }
        }
        out
    }

    fn pass(&self, text: &str) -> String {
        let stripped = self.strip_noise(&collapse_whitespace(text));
        let trimmed = collapse_whitespace(&stripped)
            .trim_matches(|c: char| c.is_whitespace() || EDGE_SEPARATORS.contains(&c))
            .to_string();
        trimmed
            .split(' ')
            .filter(|t| !t.is_empty())
            .enumerate()
            .map(|(i, token)| self.title_case_token(token, i == 0))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl NameCleaner for PatternNameCleaner {
    fn clean(&self, raw: &str) -> String {
        let mut current = collapse_whitespace(raw);
        for _ in 0..MAX_PASSES {
            let next = self.pass(&current);
            if next == current {
                break;
            }
            current = next;
        }
        if current.is_empty() {
            raw.trim().to_string()
        } else {
            current
        }
    }
}
