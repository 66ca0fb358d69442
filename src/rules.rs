//! Rule definitions as written in JSON, and the compiled, read-only rule table.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, Result};
use crate::models::{Fundamental, TransactionType};

const BUILTIN_RULES: &str = include_str!("default_rules.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    #[default]
    Contains,
    StartsWith,
    /// Whole-word match of any listed keyword.
    Keyword,
    Regex,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::Keyword => "keyword",
            Self::Regex => "regex",
        }
    }
}

/// Restricts a rule to one side of zero. `positive` admits zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignConstraint {
    #[default]
    Any,
    Negative,
    Positive,
}

impl SignConstraint {
    pub fn admits(&self, amount: f64) -> bool {
        match self {
            Self::Any => true,
            Self::Negative => amount < 0.0,
            Self::Positive => amount >= 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Negative => "negative",
            Self::Positive => "positive",
        }
    }
}

/// One rule as it appears in a rule file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub match_type: MatchType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub sign: SignConstraint,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
    #[serde(default)]
    pub essential: bool,
    #[serde(default)]
    pub fixed: bool,
    /// Lets a positive expense or debt amount through the sign policy.
    #[serde(default)]
    pub refund: bool,
    /// Accepted for compatibility; the fundamental always follows `type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fundamental: Option<Fundamental>,
}

impl RuleDef {
    /// Rule with a single pattern, for building tables in code.
    pub fn new(
        name: &str,
        match_type: MatchType,
        pattern: &str,
        kind: TransactionType,
        category: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            match_type,
            pattern: Some(pattern.to_string()),
            patterns: Vec::new(),
            sign: SignConstraint::Any,
            kind,
            category: category.to_string(),
            essential: false,
            fixed: false,
            refund: false,
            fundamental: None,
        }
    }

    pub fn with_sign(mut self, sign: SignConstraint) -> Self {
        self.sign = sign;
        self
    }

    pub fn with_flags(mut self, essential: bool, fixed: bool) -> Self {
        self.essential = essential;
        self.fixed = fixed;
        self
    }

    fn label(&self, index: usize) -> String {
        if self.name.trim().is_empty() {
            format!("#{}", index + 1)
        } else {
            self.name.clone()
        }
    }

    fn all_patterns(&self) -> Vec<String> {
        self.pattern
            .iter()
            .chain(self.patterns.iter())
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Contains(Vec<String>),
    StartsWith(Vec<String>),
    Pattern(Regex),
}

impl Matcher {
    fn compile(
        match_type: MatchType,
        patterns: &[String],
        label: &str,
    ) -> std::result::Result<Self, ConfigError> {
        let lowered = || -> Vec<String> { patterns.iter().map(|p| p.to_lowercase()).collect() };
        let source = match match_type {
            MatchType::Contains => return Ok(Self::Contains(lowered())),
            MatchType::StartsWith => return Ok(Self::StartsWith(lowered())),
            MatchType::Keyword => {
                let alternatives = patterns
                    .iter()
                    .map(|p| regex::escape(p))
                    .collect::<Vec<_>>()
                    .join("|");
                format!(r"(?i)(?:^|[^\p{{L}}\p{{N}}])(?:{alternatives})(?:$|[^\p{{L}}\p{{N}}])")
            }
            MatchType::Regex => {
                // Compile each one on its own so the error points at the bad pattern.
                for p in patterns {
                    Regex::new(p).map_err(|source| ConfigError::InvalidPattern {
                        rule: label.to_string(),
                        source,
                    })?;
                }
                let alternatives = patterns
                    .iter()
                    .map(|p| format!("(?:{p})"))
                    .collect::<Vec<_>>()
                    .join("|");
                format!("(?i){alternatives}")
            }
        };
        Regex::new(&source)
            .map(Self::Pattern)
            .map_err(|source| ConfigError::InvalidPattern {
                rule: label.to_string(),
                source,
            })
    }

    fn is_match(&self, normalized: &str) -> bool {
        match self {
            Self::Contains(needles) => needles.iter().any(|n| normalized.contains(n.as_str())),
            Self::StartsWith(prefixes) => prefixes.iter().any(|p| normalized.starts_with(p.as_str())),
            Self::Pattern(re) => re.is_match(normalized),
        }
    }
}

/// What a matching rule assigns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub kind: TransactionType,
    pub category: String,
    pub essential: bool,
    pub fixed: bool,
    pub refund: bool,
}

/// A validated rule. Immutable once compiled.
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    match_type: MatchType,
    patterns: Vec<String>,
    matcher: Matcher,
    sign: SignConstraint,
    outcome: RuleOutcome,
}

impl Rule {
    /// Validate and compile one definition. `index` names unnamed rules in errors.
    pub fn compile(def: &RuleDef, index: usize) -> std::result::Result<Self, ConfigError> {
        let label = def.label(index);
        let patterns = def.all_patterns();
        if patterns.is_empty() {
            return Err(ConfigError::EmptyRule(label));
        }
        let category = def.category.trim();
        if category.is_empty() {
            return Err(ConfigError::EmptyCategory(label));
        }
        if let Some(fundamental) = def.fundamental {
            if fundamental != def.kind.fundamental() {
                warn!(
                    rule = %label,
                    given = %fundamental,
                    used = %def.kind.fundamental(),
                    "ignoring rule fundamental that disagrees with its type"
                );
            }
        }
        let matcher = Matcher::compile(def.match_type, &patterns, &label)?;
        Ok(Self {
            name: label,
            match_type: def.match_type,
            patterns,
            matcher,
            sign: def.sign,
            outcome: RuleOutcome {
                kind: def.kind,
                category: category.to_string(),
                essential: def.essential,
                fixed: def.fixed,
                refund: def.refund,
            },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn sign(&self) -> SignConstraint {
        self.sign
    }

    pub fn outcome(&self) -> &RuleOutcome {
        &self.outcome
    }

    /// `normalized` must come from [`normalize_for_matching`].
    pub fn matches(&self, normalized: &str, amount: f64) -> bool {
        self.sign.admits(amount) && self.matcher.is_match(normalized)
    }
}

/// Lowercased, whitespace-collapsed form that rules are matched against.
pub fn normalize_for_matching(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Ordered rule table. Shared read-only across worker threads.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn compile(defs: &[RuleDef]) -> std::result::Result<Self, ConfigError> {
        let rules = defs
            .iter()
            .enumerate()
            .map(|(i, def)| Rule::compile(def, i))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let defs: Vec<RuleDef> = serde_json::from_str(json)?;
        Ok(Self::compile(&defs)?)
    }

    /// Load a JSON rule file. Fails on unreadable files as well as bad rules.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let set = Self::from_json(&content)?;
        debug!(path = %path.display(), rules = set.len(), "loaded rule file");
        Ok(set)
    }

    pub fn builtin_defs() -> Result<Vec<RuleDef>> {
        Ok(serde_json::from_str(BUILTIN_RULES)?)
    }

    /// The default table shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_RULES)
    }

    /// `first` is consulted before `then`.
    pub fn layered(first: RuleSet, then: RuleSet) -> Self {
        let mut rules = first.rules;
        rules.extend(then.rules);
        Self { rules }
    }

    /// The table in effect for an optional user rule file.
    pub fn effective(rules_file: Option<&Path>, replace_defaults: bool) -> Result<Self> {
        let user = match rules_file {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if replace_defaults {
            Ok(user)
        } else {
            Ok(Self::layered(user, Self::builtin()?))
        }
    }

    /// First rule, in table order, whose matcher and sign constraint accept.
    pub fn first_match(&self, name: &str, amount: f64) -> Option<&Rule> {
        let normalized = normalize_for_matching(name);
        self.rules.iter().find(|r| r.matches(&normalized, amount))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(match_type: MatchType, pattern: &str, category: &str) -> RuleDef {
        RuleDef::new(category, match_type, pattern, TransactionType::Expense, category)
    }

    fn first_category(set: &RuleSet, name: &str, amount: f64) -> Option<String> {
        set.first_match(name, amount)
            .map(|r| r.outcome().category.clone())
    }

    #[test]
    fn test_builtin_table_compiles() {
        let set = RuleSet::builtin().unwrap();
        assert!(set.len() > 10);
        assert_eq!(set.len(), RuleSet::builtin_defs().unwrap().len());
    }

    #[test]
    fn test_contains_and_starts_with_ignore_case() {
        let set = RuleSet::compile(&[
            rule(MatchType::StartsWith, "STRIPE", "Fees"),
            rule(MatchType::Contains, "adobe", "Software"),
        ])
        .unwrap();
        assert_eq!(first_category(&set, "Adobe Creative Cloud", -10.0).as_deref(), Some("Software"));
        assert_eq!(first_category(&set, "Stripe Payment", -1.0).as_deref(), Some("Fees"));
        assert_eq!(first_category(&set, "Pay Stripe Fee", -1.0), None);
    }

    #[test]
    fn test_keyword_matches_whole_words_only() {
        let set = RuleSet::compile(&[rule(MatchType::Keyword, "shell", "Transportation")]).unwrap();
        assert!(set.first_match("Shell Gas Station", -40.0).is_some());
        assert!(set.first_match("Gas - Shell", -40.0).is_some());
        assert!(set.first_match("Shellfish Shack", -40.0).is_none());
    }

    #[test]
    fn test_keyword_escapes_metacharacters() {
        let set = RuleSet::compile(&[rule(MatchType::Keyword, "at&t", "Utilities")]).unwrap();
        assert!(set.first_match("AT&T Wireless", -80.0).is_some());
        assert!(set.first_match("Matt Store", -80.0).is_none());
    }

    #[test]
    fn test_regex_rule_is_case_insensitive() {
        let set = RuleSet::compile(&[rule(MatchType::Regex, r"^aws.*\d+$", "Hosting")]).unwrap();
        assert!(set.first_match("AWS Services 12345", -9.0).is_some());
        assert!(set.first_match("My AWS", -9.0).is_none());
    }

    #[test]
    fn test_sign_constraint_filters() {
        let mut def = rule(MatchType::Contains, "venmo", "Transfers");
        def.sign = SignConstraint::Positive;
        let set = RuleSet::compile(&[def]).unwrap();
        assert!(set.first_match("Venmo", 20.0).is_some());
        assert!(set.first_match("Venmo", 0.0).is_some());
        assert!(set.first_match("Venmo", -20.0).is_none());
    }

    #[test]
    fn test_first_match_wins_for_overlapping_rules() {
        let set = RuleSet::compile(&[
            rule(MatchType::Contains, "payment", "Client Services"),
            rule(MatchType::Contains, "payment", "Bank Fees"),
        ])
        .unwrap();
        for _ in 0..3 {
            assert_eq!(
                first_category(&set, "PAYMENT RECEIVED", -1.0).as_deref(),
                Some("Client Services")
            );
        }
    }

    #[test]
    fn test_empty_rule_rejected() {
        let mut def = rule(MatchType::Contains, "  ", "Dining");
        def.name = String::new();
        let err = RuleSet::compile(&[def]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyRule(ref label) if label == "#1"));
    }

    #[test]
    fn test_empty_category_rejected() {
        let err = RuleSet::compile(&[rule(MatchType::Contains, "cafe", " ")]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyCategory(_)));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let err = RuleSet::compile(&[rule(MatchType::Regex, "(unclosed", "Broken")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { ref rule, .. } if rule == "Broken"));
    }

    #[test]
    fn test_rule_file_with_single_pattern_and_fundamental() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(
            &path,
            r#"[
                {"pattern": "starbucks", "type": "expense", "category": "Dining", "fundamental": "Income"},
                {"name": "rent", "match_type": "keyword", "patterns": ["rent"], "sign": "negative",
                 "type": "expense", "category": "Housing", "essential": true, "fixed": true}
            ]"#,
        )
        .unwrap();
        let set = RuleSet::load(&path).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.rules()[0].name(), "#1");
        assert_eq!(set.rules()[0].match_type(), MatchType::Contains);
        let housing = set.first_match("Rent Payment", -1500.0).unwrap().outcome();
        assert!(housing.essential && housing.fixed);
    }

    #[test]
    fn test_unreadable_rule_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RuleSet::load(&dir.path().join("missing.json")).is_err());
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(RuleSet::load(&path).is_err());
    }

    #[test]
    fn test_user_rules_precede_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(
            &path,
            r#"[{"pattern": "starbucks", "type": "expense", "category": "Coffee Budget"}]"#,
        )
        .unwrap();
        let layered = RuleSet::effective(Some(&path), false).unwrap();
        assert_eq!(first_category(&layered, "Starbucks", -5.0).as_deref(), Some("Coffee Budget"));
        assert_eq!(first_category(&layered, "Netflix", -15.0).as_deref(), Some("Entertainment"));

        let replaced = RuleSet::effective(Some(&path), true).unwrap();
        assert_eq!(replaced.len(), 1);
        assert_eq!(first_category(&replaced, "Netflix", -15.0), None);
    }
}
