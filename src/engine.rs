//! The rewrite engine.
//!
//! A pure function of `(content, classification)`. It holds no state between
//! files; everything it learns about a file is returned in a
//! [`RewriteOutcome`] for the caller to fold into its ledger.

use crate::classify::Classification;
use crate::hooks::{Hook, HookPhase};
use crate::rules::{apply_rules, MatchRecord, RuleFailure};

#[derive(Debug, Clone, Default)]
pub struct RewriteOutcome {
    pub content: String,
    /// Pre-hook, generic and post-hook records, in emission order
    pub records: Vec<MatchRecord>,
    pub failures: Vec<RuleFailure>,
    /// Advisory notes raised by hooks
    pub notes: Vec<String>,
}

impl RewriteOutcome {
    pub fn substitutions(&self) -> usize {
        self.records.iter().map(MatchRecord::count).sum()
    }
}

/// Run pre hooks, the generic rules, then post hooks.
///
/// Files the classifier marked as not rewritable come back unchanged.
pub fn rewrite(content: &str, classification: &Classification<'_>) -> RewriteOutcome {
    let mut outcome = RewriteOutcome {
        content: content.to_string(),
        ..RewriteOutcome::default()
    };
    let Some(rules) = classification.rules else {
        return outcome;
    };

    run_hooks(&mut outcome, &classification.hooks, HookPhase::Pre);

    let pass = apply_rules(&rules.rules, &outcome.content);
    outcome.content = pass.output;
    outcome.records.extend(pass.records);
    outcome.failures.extend(pass.failures);

    run_hooks(&mut outcome, &classification.hooks, HookPhase::Post);

    outcome
}

fn run_hooks(outcome: &mut RewriteOutcome, hooks: &[&Hook], phase: HookPhase) {
    for hook in hooks.iter().filter(|h| h.phase == phase) {
        let result = hook.run(&outcome.content);
        outcome.content = result.content;
        outcome.records.extend(result.record);
        outcome.failures.extend(result.failure);
        outcome.notes.extend(result.note);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, FilePredicate};
    use crate::hooks::HookAction;
    use crate::rules::{Rule, RuleSet};
    use std::path::Path;

    fn marker_hook(name: &str, phase: HookPhase, from: &str, to: &str) -> Hook {
        let action = HookAction::Substitute(Rule::regex(from, to));
        match phase {
            HookPhase::Pre => Hook::pre(name, FilePredicate::Any, action),
            HookPhase::Post => Hook::post(name, FilePredicate::Any, action),
        }
    }

    #[test]
    fn hooks_bracket_the_generic_rules() {
        let set = RuleSet::new("order")
            .rule(Rule::regex("b", "c"))
            .hook(marker_hook("post", HookPhase::Post, "c", "d"))
            .hook(marker_hook("pre", HookPhase::Pre, "a", "b"));

        let c = classify(Path::new("x.c"), &set);
        let out = rewrite("a", &c);
        assert_eq!(out.content, "d");
        let order: Vec<_> = out.records.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(order, ["pre", "b -> c", "post"]);
        assert_eq!(out.substitutions(), 3);
    }

    #[test]
    fn unrewritable_files_pass_through() {
        let set = RuleSet::new("noop").rule(Rule::regex("x", "y"));
        let c = classify(Path::new("meson.build"), &set);
        let out = rewrite("x = files()", &c);
        assert_eq!(out.content, "x = files()");
        assert!(out.records.is_empty());
    }

    #[test]
    fn scenario_struct_rename() {
        let set = RuleSet::new("scene").rule(Rule::regex(r"\bwlr_scene_(\w+)\b", r"sway_scene_\1"));
        let c = classify(Path::new("scene.c"), &set);
        let out = rewrite("struct wlr_scene_node *n;", &c);
        assert_eq!(out.content, "struct sway_scene_node *n;");
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].count(), 1);
    }

    #[test]
    fn notes_and_failures_are_collected() {
        let set = RuleSet::new("mixed")
            .rule(Rule::regex("(", "x"))
            .hook(Hook::post(
                "advice",
                FilePredicate::Any,
                HookAction::Advisory {
                    marker: "damage".to_string(),
                    note: "uses damage tracking".to_string(),
                },
            ));
        let c = classify(Path::new("output.c"), &set);
        let out = rewrite("output_damage();", &c);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.notes, ["uses damage tracking"]);
        assert_eq!(out.content, "output_damage();");
    }
}
