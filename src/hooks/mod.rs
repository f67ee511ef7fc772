//! Identity-gated transforms that plain rules cannot express.
//!
//! Hooks are declared in a rule set's hook table, selected at classification
//! time through their [`FilePredicate`], and run by the engine either before
//! (`Pre`) or after (`Post`) the generic rule pass. Every action is written
//! so that running it on its own output changes nothing.

pub mod call;

use crate::cache;
use crate::classify::FilePredicate;
use crate::rules::{MatchRecord, Rule, RuleError, RuleFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Pre,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookAction {
    /// Localized substitution; identity replacements are not counted.
    Substitute(Rule),
    /// Turn each matching include line into `// <line> // <note>`.
    CommentOutInclude { pattern: String, note: String },
    /// Insert `block` on its own line after the last include directive.
    InsertAfterLastInclude {
        block: String,
        /// Skip when any of these is already in the file
        unless_present: Vec<String>,
        /// Only run when this text is in the file
        only_if_present: Option<String>,
    },
    /// Insert `block` right after the first match of `anchor`.
    InsertAfterMatch {
        anchor: String,
        block: String,
        unless_present: Vec<String>,
    },
    /// Rewrite `function(a1..a_arity)` to `replacement(a1..a_keep)`.
    /// Calls with any other argument count are left alone.
    ReduceCallArity {
        function: String,
        replacement: String,
        arity: usize,
        keep: usize,
    },
    /// Replace the whole argument list of `function(...)` calls with `args`.
    /// With `lead`, only calls whose line text before the name matches it.
    ReplaceCallArgs {
        function: String,
        lead: Option<String>,
        args: Vec<String>,
    },
    /// Log `note` when `marker` occurs. Never edits.
    Advisory { marker: String, note: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hook {
    /// Ledger key for everything this hook records
    pub name: String,
    pub phase: HookPhase,
    pub when: FilePredicate,
    pub action: HookAction,
}

/// Result of running one hook over one text.
#[derive(Debug, Clone, Default)]
pub struct HookOutcome {
    pub content: String,
    pub record: Option<MatchRecord>,
    pub failure: Option<RuleFailure>,
    pub note: Option<String>,
}

const INCLUDE_DIRECTIVE: &str = r#"(?m)^[ \t]*#[ \t]*include[ \t]*[<"][^>"\n]+[>"]"#;

impl Hook {
    pub fn pre(name: impl Into<String>, when: FilePredicate, action: HookAction) -> Self {
        Self {
            name: name.into(),
            phase: HookPhase::Pre,
            when,
            action,
        }
    }

    pub fn post(name: impl Into<String>, when: FilePredicate, action: HookAction) -> Self {
        Self {
            name: name.into(),
            phase: HookPhase::Post,
            when,
            action,
        }
    }

    pub fn run(&self, content: &str) -> HookOutcome {
        let result = match &self.action {
            HookAction::Substitute(rule) => rule
                .apply_changes_only(content)
                .map(|app| (app.output, app.matched)),
            HookAction::CommentOutInclude { pattern, note } => {
                comment_out_includes(content, pattern, note)
            }
            HookAction::InsertAfterLastInclude {
                block,
                unless_present,
                only_if_present,
            } => {
                let triggered = only_if_present
                    .as_deref()
                    .is_none_or(|needle| content.contains(needle));
                if triggered && !already_present(content, block, unless_present) {
                    insert_after_last(content, INCLUDE_DIRECTIVE, block)
                } else {
                    Ok((content.to_string(), Vec::new()))
                }
            }
            HookAction::InsertAfterMatch {
                anchor,
                block,
                unless_present,
            } => {
                if already_present(content, block, unless_present) {
                    Ok((content.to_string(), Vec::new()))
                } else {
                    insert_after_first(content, anchor, block)
                }
            }
            HookAction::ReduceCallArity {
                function,
                replacement,
                arity,
                keep,
            } => reduce_call_arity(content, function, replacement, *arity, *keep),
            HookAction::ReplaceCallArgs {
                function,
                lead,
                args,
            } => replace_call_args(content, function, lead.as_deref(), args),
            HookAction::Advisory { marker, note } => {
                return HookOutcome {
                    content: content.to_string(),
                    note: content.contains(marker.as_str()).then(|| note.clone()),
                    ..HookOutcome::default()
                };
            }
        };

        match result {
            Ok((updated, matched)) => HookOutcome {
                content: updated,
                record: (!matched.is_empty()).then(|| MatchRecord {
                    description: self.name.clone(),
                    matched,
                }),
                ..HookOutcome::default()
            },
            Err(error) => HookOutcome {
                content: content.to_string(),
                failure: Some(RuleFailure {
                    description: self.name.clone(),
                    error,
                }),
                ..HookOutcome::default()
            },
        }
    }
}

type Edited = Result<(String, Vec<String>), RuleError>;

fn compile(pattern: &str) -> Result<regex::Regex, RuleError> {
    cache::get_or_compile_regex(pattern).map_err(|source| RuleError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

fn already_present(content: &str, block: &str, markers: &[String]) -> bool {
    let block = block.trim();
    (!block.is_empty() && content.contains(block))
        || markers.iter().any(|m| content.contains(m.as_str()))
}

fn comment_out_includes(content: &str, pattern: &str, note: &str) -> Edited {
    let re = compile(pattern)?;
    let mut out = String::with_capacity(content.len());
    let mut matched = Vec::new();

    for line in content.split_inclusive('\n') {
        let (body, ending) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        if body.trim_start().starts_with('#') && re.is_match(body) {
            matched.push(body.to_string());
            out.push_str("// ");
            out.push_str(body.trim());
            out.push_str(" // ");
            out.push_str(note);
            out.push_str(ending);
        } else {
            out.push_str(line);
        }
    }
    Ok((out, matched))
}

fn insert_after_last(content: &str, anchor: &str, block: &str) -> Edited {
    let re = compile(anchor)?;
    Ok(match re.find_iter(content).last() {
        Some(m) => insert_at(content, m.end(), m.as_str(), block),
        None => (content.to_string(), Vec::new()),
    })
}

fn insert_after_first(content: &str, anchor: &str, block: &str) -> Edited {
    let re = compile(anchor)?;
    Ok(match re.find(content) {
        Some(m) => insert_at(content, m.end(), m.as_str(), block),
        None => (content.to_string(), Vec::new()),
    })
}

fn insert_at(content: &str, at: usize, anchor_text: &str, block: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(content.len() + block.len() + 1);
    out.push_str(&content[..at]);
    if !block.starts_with('\n') {
        out.push('\n');
    }
    out.push_str(block);
    out.push_str(&content[at..]);
    (out, vec![anchor_text.to_string()])
}

fn calls_to(content: &str, function: &str) -> Result<Vec<call::CallSite>, RuleError> {
    call::find_calls(content, function).map_err(|source| RuleError::InvalidRegex {
        pattern: function.to_string(),
        source,
    })
}

fn reduce_call_arity(
    content: &str,
    function: &str,
    replacement: &str,
    arity: usize,
    keep: usize,
) -> Edited {
    let calls = calls_to(content, function)?;

    let mut out = String::with_capacity(content.len());
    let mut matched = Vec::new();
    let mut cursor = 0;
    for site in calls.iter().filter(|c| c.args.len() == arity) {
        out.push_str(&content[cursor..site.byte_start]);
        out.push_str(replacement);
        out.push('(');
        out.push_str(&site.args[..keep.min(arity)].join(", "));
        out.push(')');
        matched.push(content[site.byte_start..site.byte_end].to_string());
        cursor = site.byte_end;
    }
    out.push_str(&content[cursor..]);
    Ok((out, matched))
}

fn replace_call_args(content: &str, function: &str, lead: Option<&str>, args: &[String]) -> Edited {
    let lead = lead.map(compile).transpose()?;
    let calls = calls_to(content, function)?;

    let mut out = String::with_capacity(content.len());
    let mut matched = Vec::new();
    let mut cursor = 0;
    for site in calls {
        if site.args == args {
            continue;
        }
        let line_start = content[..site.byte_start].rfind('\n').map_or(0, |i| i + 1);
        if let Some(re) = &lead {
            if !re.is_match(&content[line_start..site.byte_start]) {
                continue;
            }
        }
        out.push_str(&content[cursor..site.byte_start]);
        out.push_str(function);
        out.push('(');
        out.push_str(&args.join(", "));
        out.push(')');
        matched.push(content[site.byte_start..site.byte_end].to_string());
        cursor = site.byte_end;
    }
    out.push_str(&content[cursor..]);
    Ok((out, matched))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook(action: HookAction) -> Hook {
        Hook::post("test hook", FilePredicate::Any, action)
    }

    fn run_twice(h: &Hook, input: &str) -> (HookOutcome, HookOutcome) {
        let first = h.run(input);
        let second = h.run(&first.content);
        (first, second)
    }

    #[test]
    fn comment_out_keeps_original_line() {
        let h = hook(HookAction::CommentOutInclude {
            pattern: r#"#include "sway/.*""#.to_string(),
            note: "commented out for standalone build".to_string(),
        });
        let input = "#include <stdlib.h>\n#include \"sway/tree/view.h\"\nint x;\n";
        let (first, second) = run_twice(&h, input);
        assert_eq!(
            first.content,
            "#include <stdlib.h>\n// #include \"sway/tree/view.h\" // commented out for standalone build\nint x;\n"
        );
        assert_eq!(first.record.unwrap().count(), 1);
        assert_eq!(second.content, first.content);
        assert!(second.record.is_none());
    }

    #[test]
    fn insert_after_last_include_only_once() {
        let h = hook(HookAction::InsertAfterLastInclude {
            block: "#include <scenefx/render/fx_renderer/fx_renderer.h>".to_string(),
            unless_present: vec!["#include <scenefx/render/pass.h>".to_string()],
            only_if_present: Some("fx_renderer".to_string()),
        });
        let input = "#include <a.h>\n#include \"b.h\"\n\nstruct fx_renderer *r;\n";
        let (first, second) = run_twice(&h, input);
        assert_eq!(
            first.content,
            "#include <a.h>\n#include \"b.h\"\n#include <scenefx/render/fx_renderer/fx_renderer.h>\n\nstruct fx_renderer *r;\n"
        );
        assert_eq!(second.content, first.content);
        assert!(second.record.is_none());
    }

    #[test]
    fn insert_after_last_include_respects_trigger_and_markers() {
        let h = hook(HookAction::InsertAfterLastInclude {
            block: "#include <x.h>".to_string(),
            unless_present: vec!["#include <y.h>".to_string()],
            only_if_present: Some("fx_renderer".to_string()),
        });
        let untriggered = "#include <a.h>\nint a;\n";
        assert_eq!(h.run(untriggered).content, untriggered);

        let marked = "#include <y.h>\nfx_renderer *r;\n";
        assert_eq!(h.run(marked).content, marked);

        let no_includes = "fx_renderer *r;\n";
        assert_eq!(h.run(no_includes).content, no_includes);
    }

    #[test]
    fn insert_after_match_is_guarded() {
        let h = hook(HookAction::InsertAfterMatch {
            anchor: r"server->renderer\s*=\s*fx_renderer_create[^;]+;".to_string(),
            block: "\n\tserver->effect_fbos = fx_effect_framebuffers_create(server->renderer);"
                .to_string(),
            unless_present: vec!["fx_effect_framebuffers_create".to_string()],
        });
        let input = "\tserver->renderer = fx_renderer_create(server->backend);\n\treturn true;\n";
        let (first, second) = run_twice(&h, input);
        assert!(first.content.contains(
            "fx_renderer_create(server->backend);\n\tserver->effect_fbos = fx_effect_framebuffers_create(server->renderer);\n\treturn true;"
        ));
        assert_eq!(second.content, first.content);
        assert!(second.record.is_none());
    }

    #[test]
    fn reduce_call_arity_only_rewrites_expected_arity() {
        let h = hook(HookAction::ReduceCallArity {
            function: "fx_renderer_begin".to_string(),
            replacement: "fx_renderer_begin".to_string(),
            arity: 3,
            keep: 2,
        });
        let input = "fx_renderer_begin(r, w, h);\nfx_renderer_begin(r, w);\nfx_renderer_begin(a, b, c, d);\n";
        let (first, second) = run_twice(&h, input);
        assert_eq!(
            first.content,
            "fx_renderer_begin(r, w);\nfx_renderer_begin(r, w);\nfx_renderer_begin(a, b, c, d);\n"
        );
        assert_eq!(first.record.unwrap().count(), 1);
        assert!(second.record.is_none());
    }

    #[test]
    fn substitute_counts_only_changes() {
        let h = hook(HookAction::Substitute(Rule::regex("WLR_SCENE", "SWAY_SCENE")));
        let input = "#ifndef _WLR_SCENE_H\n#define _WLR_SCENE_H\n";
        let (first, second) = run_twice(&h, input);
        assert_eq!(first.content, "#ifndef _SWAY_SCENE_H\n#define _SWAY_SCENE_H\n");
        assert_eq!(first.record.unwrap().count(), 2);
        assert!(second.record.is_none());
    }

    #[test]
    fn replace_call_args_spans_nested_calls() {
        let h = hook(HookAction::ReplaceCallArgs {
            function: "fx_renderer_create".to_string(),
            lead: Some(r"server->renderer\s*=\s*$".to_string()),
            args: vec!["server->backend".to_string()],
        });
        let input = "\tserver->renderer = fx_renderer_create(get_backend(server, f(1)));\n\tother = fx_renderer_create(NULL);\n";
        let (first, second) = run_twice(&h, input);
        assert_eq!(
            first.content,
            "\tserver->renderer = fx_renderer_create(server->backend);\n\tother = fx_renderer_create(NULL);\n"
        );
        assert_eq!(first.record.unwrap().count(), 1);
        assert_eq!(second.content, first.content);
        assert!(second.record.is_none());
    }

    #[test]
    fn advisory_only_notes() {
        let h = hook(HookAction::Advisory {
            marker: "wlr_output_damage".to_string(),
            note: "uses damage tracking".to_string(),
        });
        let out = h.run("struct wlr_output_damage *d;");
        assert_eq!(out.note.as_deref(), Some("uses damage tracking"));
        assert!(out.record.is_none());
        assert!(h.run("int x;").note.is_none());
    }

    #[test]
    fn invalid_pattern_is_a_failure_not_a_panic() {
        let h = hook(HookAction::CommentOutInclude {
            pattern: "(".to_string(),
            note: String::new(),
        });
        let out = h.run("#include \"a.h\"\n");
        assert_eq!(out.content, "#include \"a.h\"\n");
        assert!(out.failure.is_some());
    }
}
