use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use txnorm::fmt::flag;
use txnorm::rules::{Rule, RuleSet};
use txnorm::settings::load_settings;

const SHOWN_PATTERNS: usize = 4;

pub fn list(rules_file: Option<&Path>, replace_defaults: bool, config: Option<&Path>) -> Result<()> {
    let settings = load_settings(config)?;
    let path = rules_file.map(Path::to_path_buf).or_else(|| settings.rules_path());
    let replace = replace_defaults || settings.replace_default_rules;
    let rules = RuleSet::effective(path.as_deref(), replace).with_context(|| match &path {
        Some(p) => format!("loading rules from {}", p.display()),
        None => "loading built-in rules".to_string(),
    })?;

    let mut table = Table::new();
    table.set_header(vec![
        "#", "Name", "Match", "Patterns", "Sign", "Type", "Category", "Essential", "Fixed",
    ]);
    for (i, rule) in rules.rules().iter().enumerate() {
        let outcome = rule.outcome();
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(rule.name()),
            Cell::new(rule.match_type().as_str()),
            Cell::new(pattern_summary(rule)),
            Cell::new(rule.sign().as_str()),
            Cell::new(outcome.kind),
            Cell::new(&outcome.category),
            Cell::new(flag(outcome.essential)),
            Cell::new(flag(outcome.fixed)),
        ]);
    }
    println!("Rules (first match wins)\n{table}");
    Ok(())
}

fn pattern_summary(rule: &Rule) -> String {
    let patterns = rule.patterns();
    let shown = patterns
        .iter()
        .take(SHOWN_PATTERNS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    match patterns.len().saturating_sub(SHOWN_PATTERNS) {
        0 => shown,
        more => format!("{shown} (+{more} more)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txnorm::models::TransactionType;
    use txnorm::rules::{MatchType, RuleDef};

    #[test]
    fn test_pattern_summary_truncates() {
        let mut def = RuleDef::new("x", MatchType::Keyword, "a", TransactionType::Expense, "X");
        def.patterns = ["b", "c", "d", "e", "f"].iter().map(|s| s.to_string()).collect();
        let set = RuleSet::compile(&[def]).unwrap();
        assert_eq!(pattern_summary(&set.rules()[0]), "a, b, c, d (+2 more)");
    }

    #[test]
    fn test_pattern_summary_short() {
        let def = RuleDef::new("x", MatchType::Contains, "cafe", TransactionType::Expense, "X");
        let set = RuleSet::compile(&[def]).unwrap();
        assert_eq!(pattern_summary(&set.rules()[0]), "cafe");
    }
}
