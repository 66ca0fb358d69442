use crate::models::{Fundamental, TransactionType};
use crate::rules::{normalize_for_matching, Rule, RuleSet};

pub const UNCATEGORIZED: &str = "Uncategorized";

/// Any expense whose name mentions one of these is a fixed cost, whatever
/// category it landed in.
const FIXED_MARKERS: &[&str] = &["subscription", "membership"];

/// Classification tuple for one cleaned name and signed amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: TransactionType,
    pub category: String,
    pub fundamental: Fundamental,
    pub essential: bool,
    pub fixed: bool,
    pub refund: bool,
    /// Name of the rule that matched, `None` for the fallback.
    pub rule: Option<String>,
}

impl Classification {
    /// Used when no rule matches: the sign alone picks expense or income.
    pub fn fallback(amount: f64) -> Self {
        let kind = if amount < 0.0 {
            TransactionType::Expense
        } else {
            TransactionType::Income
        };
        Self {
            kind,
            category: UNCATEGORIZED.to_string(),
            fundamental: kind.fundamental(),
            essential: false,
            fixed: false,
            refund: false,
            rule: None,
        }
    }

    fn from_rule(rule: &Rule) -> Self {
        let outcome = rule.outcome();
        Self {
            kind: outcome.kind,
            category: outcome.category.clone(),
            fundamental: outcome.kind.fundamental(),
            essential: outcome.essential,
            fixed: outcome.fixed,
            refund: outcome.refund,
            rule: Some(rule.name().to_string()),
        }
    }
}

pub trait Classifier: Send + Sync {
    /// Must be a pure function of its inputs.
    fn classify(&self, name: &str, amount: f64) -> Classification;
}

/// First-match scan over an ordered [`RuleSet`].
#[derive(Debug, Clone, Default)]
pub struct RuleClassifier {
    rules: RuleSet,
}

impl RuleClassifier {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }
}

impl Classifier for RuleClassifier {
    fn classify(&self, name: &str, amount: f64) -> Classification {
        let mut result = self
            .rules
            .first_match(name, amount)
            .map(Classification::from_rule)
            .unwrap_or_else(|| Classification::fallback(amount));
        if result.kind == TransactionType::Expense && !result.fixed {
            let normalized = normalize_for_matching(name);
            result.fixed = FIXED_MARKERS.iter().any(|m| normalized.contains(m));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{MatchType, RuleDef, SignConstraint};

    fn classifier(defs: &[RuleDef]) -> RuleClassifier {
        RuleClassifier::new(RuleSet::compile(defs).unwrap())
    }

    fn builtin() -> RuleClassifier {
        RuleClassifier::new(RuleSet::builtin().unwrap())
    }

    #[test]
    fn test_contains_rule() {
        let c = classifier(&[RuleDef::new(
            "software",
            MatchType::Contains,
            "adobe",
            TransactionType::Expense,
            "Software & Subscriptions",
        )]);
        let result = c.classify("Adobe Creative Cloud", -54.99);
        assert_eq!(result.category, "Software & Subscriptions");
        assert_eq!(result.rule.as_deref(), Some("software"));
    }

    #[test]
    fn test_higher_rule_wins() {
        let c = classifier(&[
            RuleDef::new("a", MatchType::Contains, "payment", TransactionType::Income, "Client Services"),
            RuleDef::new("b", MatchType::Contains, "payment", TransactionType::Expense, "Bank Fees"),
        ]);
        let result = c.classify("Payment Received", 100.0);
        assert_eq!(result.category, "Client Services");
        assert_eq!(result.kind, TransactionType::Income);
    }

    #[test]
    fn test_unmatched_uses_sign_fallback() {
        let c = classifier(&[]);
        let spent = c.classify("Mystery Vendor", -12.0);
        assert_eq!(spent.kind, TransactionType::Expense);
        assert_eq!(spent.category, UNCATEGORIZED);
        assert_eq!(spent.fundamental, Fundamental::Expenses);
        assert!(!spent.essential && !spent.fixed);

        let received = c.classify("Mystery Vendor", 0.0);
        assert_eq!(received.kind, TransactionType::Income);
        assert_eq!(received.fundamental, Fundamental::Income);
    }

    #[test]
    fn test_fundamental_follows_type() {
        let mut def = RuleDef::new("odd", MatchType::Contains, "odd", TransactionType::Savings, "Savings");
        def.fundamental = Some(Fundamental::Income);
        let result = classifier(&[def]).classify("Odd Transfer", -10.0);
        assert_eq!(result.fundamental, Fundamental::Savings);
    }

    #[test]
    fn test_scenario_rule_dining() {
        let c = classifier(&[RuleDef::new(
            "dining",
            MatchType::Contains,
            "starbucks",
            TransactionType::Expense,
            "Dining",
        )
        .with_sign(SignConstraint::Any)]);
        let result = c.classify("Starbucks", -5.75);
        assert_eq!(result.kind, TransactionType::Expense);
        assert_eq!(result.category, "Dining");
        assert!(!result.essential && !result.fixed);
    }

    #[test]
    fn test_builtin_categories() {
        let c = builtin();
        let cases = [
            ("Starbucks Coffee", -5.0, "Dining", TransactionType::Expense),
            ("Walmart Supercenter", -80.0, "Groceries", TransactionType::Expense),
            ("Shell Gas Station", -40.0, "Transportation", TransactionType::Expense),
            ("City Water Payment", -60.0, "Utilities", TransactionType::Expense),
            ("Netflix", -15.99, "Entertainment", TransactionType::Expense),
            ("Doctor Visit", -120.0, "Healthcare", TransactionType::Expense),
            ("Rent Payment", -1500.0, "Housing", TransactionType::Expense),
            ("State Farm", -110.0, "Insurance", TransactionType::Expense),
            ("Mortgage Payment", -2100.0, "Housing", TransactionType::Debt),
            ("Transfer to Savings", -500.0, "Savings", TransactionType::Savings),
            ("Vanguard 401k", -300.0, "Investment", TransactionType::Investment),
            ("Dividend Payment", 25.0, "Investment", TransactionType::Investment),
            ("Payroll Direct Deposit", 2500.0, "Income", TransactionType::Income),
            ("Amazon Refund", 30.0, "Refunds", TransactionType::Income),
        ];
        for (name, amount, category, kind) in cases {
            let result = c.classify(name, amount);
            assert_eq!(result.category, category, "{name}");
            assert_eq!(result.kind, kind, "{name}");
        }
    }

    #[test]
    fn test_builtin_flags() {
        let c = builtin();
        let walmart = c.classify("Walmart", -50.0);
        assert!(walmart.essential);
        assert!(!walmart.fixed);

        let gym = c.classify("Crunch Monthly Membership", -24.99);
        assert_eq!(gym.category, "Subscriptions");
        assert!(gym.fixed);

        let dinner = c.classify("Restaurant Bill", -45.0);
        assert!(!dinner.essential && !dinner.fixed);
    }

    #[test]
    fn test_membership_keeps_category_and_marks_fixed() {
        let c = builtin();
        let costco = c.classify("Costco Membership", -65.0);
        assert_eq!(costco.category, "Groceries");
        assert!(costco.essential);
        assert!(costco.fixed);

        let spotify = c.classify("Spotify Subscription", -9.99);
        assert_eq!(spotify.category, "Entertainment");
        assert!(spotify.fixed);

        let unknown = c.classify("Mystery Club Membership", -10.0);
        assert_eq!(unknown.category, "Subscriptions");
        assert!(unknown.fixed);
    }

    #[test]
    fn test_builtin_respects_sign() {
        let c = builtin();
        // A positive Starbucks line is not an expense rule hit.
        let result = c.classify("Starbucks", 5.0);
        assert_eq!(result.kind, TransactionType::Income);
        assert_eq!(result.category, UNCATEGORIZED);
    }
}
