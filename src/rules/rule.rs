use crate::cache;
use crate::rules::errors::RuleError;
use crate::rules::matcher::{normalize_template, Found, Matcher, RegexMatcher, StructuralMatcher};
use ast_grep_language::SupportLang;
use serde::Serialize;

/// Pattern language of a rule's matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternKind {
    Regex,
    /// ast-grep pattern over the C grammar
    Structural,
}

/// A single matcher/rewrite pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub kind: PatternKind,
    pub pattern: String,
    pub rewrite: String,
}

/// What one rule did to one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleApplication {
    pub output: String,
    /// Literal text of every match, in input order
    pub matched: Vec<String>,
}

impl RuleApplication {
    pub fn count(&self) -> usize {
        self.matched.len()
    }
}

/// Audit entry: which rule (or hook) fired and what it matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub description: String,
    pub matched: Vec<String>,
}

impl MatchRecord {
    pub fn count(&self) -> usize {
        self.matched.len()
    }
}

/// A rule that could not be applied to one file.
#[derive(Debug, Clone)]
pub struct RuleFailure {
    pub description: String,
    pub error: RuleError,
}

impl Rule {
    /// Regex rule. Sed-style `\1` references in `rewrite` are accepted.
    pub fn regex(pattern: impl Into<String>, rewrite: impl AsRef<str>) -> Self {
        Self {
            kind: PatternKind::Regex,
            pattern: pattern.into(),
            rewrite: normalize_template(rewrite.as_ref()),
        }
    }

    /// ast-grep rule; `rewrite` refers to captures as `$NAME`.
    pub fn structural(pattern: impl Into<String>, rewrite: impl Into<String>) -> Self {
        Self {
            kind: PatternKind::Structural,
            pattern: pattern.into(),
            rewrite: rewrite.into(),
        }
    }

    /// Ledger key for this rule.
    pub fn description(&self) -> String {
        format!("{} -> {}", self.pattern, self.rewrite)
    }

    pub fn compile(&self) -> Result<Box<dyn Matcher>, RuleError> {
        match self.kind {
            PatternKind::Regex => {
                let regex = cache::get_or_compile_regex(&self.pattern).map_err(|source| {
                    RuleError::InvalidRegex {
                        pattern: self.pattern.clone(),
                        source,
                    }
                })?;
                Ok(Box::new(RegexMatcher::new(regex)))
            }
            PatternKind::Structural => {
                let pattern = cache::get_or_compile_pattern(&self.pattern, SupportLang::C)
                    .map_err(|message| RuleError::InvalidStructural {
                        pattern: self.pattern.clone(),
                        message,
                    })?;
                Ok(Box::new(StructuralMatcher::new(pattern, SupportLang::C)))
            }
        }
    }

    /// Global, non-overlapping, leftmost-first substitution.
    ///
    /// The returned count is the number of matches in `input`.
    pub fn apply(&self, input: &str) -> Result<RuleApplication, RuleError> {
        let found = self.compile()?.find_all(input, &self.rewrite);
        Ok(splice(input, &found))
    }

    /// Like [`Rule::apply`], but matches whose replacement equals the matched
    /// text are neither counted nor recorded.
    pub fn apply_changes_only(&self, input: &str) -> Result<RuleApplication, RuleError> {
        let found: Vec<Found> = self
            .compile()?
            .find_all(input, &self.rewrite)
            .into_iter()
            .filter(|f| input[f.byte_start..f.byte_end] != f.replacement)
            .collect();
        Ok(splice(input, &found))
    }
}

fn splice(input: &str, found: &[Found]) -> RuleApplication {
    if found.is_empty() {
        return RuleApplication {
            output: input.to_string(),
            matched: Vec::new(),
        };
    }

    let mut output = String::with_capacity(input.len());
    let mut matched = Vec::with_capacity(found.len());
    let mut cursor = 0;
    for f in found {
        output.push_str(&input[cursor..f.byte_start]);
        output.push_str(&f.replacement);
        matched.push(input[f.byte_start..f.byte_end].to_string());
        cursor = f.byte_end;
    }
    output.push_str(&input[cursor..]);

    RuleApplication { output, matched }
}

/// Output of running an ordered rule list over one text.
#[derive(Debug, Clone, Default)]
pub struct RulePass {
    pub output: String,
    pub records: Vec<MatchRecord>,
    pub failures: Vec<RuleFailure>,
}

/// Apply `rules` in list order; each rule sees the previous rule's output.
///
/// Rules with zero matches leave no record. A rule that fails to compile is
/// reported in `failures` and the next rule runs on the unchanged text.
pub fn apply_rules(rules: &[Rule], input: &str) -> RulePass {
    let mut pass = RulePass {
        output: input.to_string(),
        ..RulePass::default()
    };

    for rule in rules {
        match rule.apply(&pass.output) {
            Ok(app) => {
                if app.count() > 0 {
                    pass.records.push(MatchRecord {
                        description: rule.description(),
                        matched: app.matched,
                    });
                    pass.output = app.output;
                }
            }
            Err(error) => pass.failures.push(RuleFailure {
                description: rule.description(),
                error,
            }),
        }
    }

    pass
}
