//! Ordered pattern-substitution rules.
//!
//! A [`Rule`] pairs a matcher with a rewrite template. A [`RuleSet`] is an
//! ordered rule list plus the hooks that supplement it for particular files.
//! Rules compose: each one runs against the previous rule's output, and the
//! count it reports is taken from its own input.

pub mod errors;
pub mod matcher;
pub mod rule;

pub use errors::RuleError;
pub use matcher::{Found, Matcher, RegexMatcher, StructuralMatcher};
pub use rule::{
    apply_rules, MatchRecord, PatternKind, Rule, RuleApplication, RuleFailure, RulePass,
};

use crate::hooks::Hook;

/// Ordered rules plus identity-gated hooks.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub name: String,
    pub rules: Vec<Rule>,
    pub hooks: Vec<Hook>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn hook(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }
}
