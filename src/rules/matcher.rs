use ast_grep_core::tree_sitter::StrDoc;
use ast_grep_core::{AstGrep, NodeMatch, Pattern};
use ast_grep_language::SupportLang;
use regex::Regex;
use std::collections::HashMap;

/// One match of a matcher against a text, with its rendered replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    /// Byte range of the entire match
    pub byte_start: usize,
    pub byte_end: usize,
    /// Rewrite template instantiated against this match's captures
    pub replacement: String,
}

/// The matcher seam.
///
/// Implementations must return matches that are non-overlapping, sorted by
/// position and chosen leftmost-first. Rule application, hooks and the
/// ledger only ever see [`Found`] values, so a regex matcher and a
/// parse-tree matcher are interchangeable.
pub trait Matcher {
    fn find_all(&self, text: &str, template: &str) -> Vec<Found>;
}

/// Regex matcher with `$1` / `${name}` capture templates.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    pub fn new(regex: Regex) -> Self {
        Self { regex }
    }
}

impl Matcher for RegexMatcher {
    fn find_all(&self, text: &str, template: &str) -> Vec<Found> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let mut replacement = String::new();
                caps.expand(template, &mut replacement);
                Some(Found {
                    byte_start: whole.start(),
                    byte_end: whole.end(),
                    replacement,
                })
            })
            .collect()
    }
}

/// Structural matcher using ast-grep's metavariable syntax over C.
///
/// # Metavariable Syntax
///
/// - `$NAME` - Matches a single node and captures it
/// - `$$$NAME` - Matches zero or more nodes (variadic)
/// - `$_` - Matches any single node (anonymous)
///
/// ```text
/// wlr_renderer_begin($R, $W, $H)   ->   fx_renderer_begin($R, $W)
/// ```
pub struct StructuralMatcher {
    pattern: Pattern,
    lang: SupportLang,
}

impl StructuralMatcher {
    pub fn new(pattern: Pattern, lang: SupportLang) -> Self {
        Self { pattern, lang }
    }

    fn to_found(m: NodeMatch<StrDoc<SupportLang>>, template: &str) -> Found {
        let range = m.get_node().range();
        let captures: HashMap<String, String> = m.get_env().clone().into();
        Found {
            byte_start: range.start,
            byte_end: range.end,
            replacement: expand_metavars(template, &captures),
        }
    }
}

impl Matcher for StructuralMatcher {
    fn find_all(&self, text: &str, template: &str) -> Vec<Found> {
        let sg = AstGrep::new(text, self.lang);
        let root = sg.root();
        let mut found: Vec<Found> = root
            .find_all(&self.pattern)
            .map(|m| Self::to_found(m, template))
            .collect();

        // Nested nodes can both match; keep the outermost, leftmost ones.
        found.sort_by(|a, b| {
            a.byte_start
                .cmp(&b.byte_start)
                .then(b.byte_end.cmp(&a.byte_end))
        });
        let mut kept: Vec<Found> = Vec::with_capacity(found.len());
        for f in found {
            if kept.last().is_some_and(|prev| f.byte_start < prev.byte_end) {
                continue;
            }
            kept.push(f);
        }
        kept
    }
}

/// Substitute `$$$NAME` and `$NAME` placeholders with captured text.
///
/// Longer names are substituted first so `$ARG` never clobbers `$ARGS`.
pub fn expand_metavars(template: &str, captures: &HashMap<String, String>) -> String {
    let mut names: Vec<&String> = captures.keys().collect();
    names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

    let mut result = template.to_string();
    for name in names {
        let text = &captures[name];
        result = result.replace(&format!("$$${name}"), text);
        result = result.replace(&format!("${name}"), text);
    }
    result
}

/// Normalise sed-style `\1` back-references to the regex crate's `${1}`.
///
/// `\\` stays a literal backslash pair; any other escape is kept verbatim.
pub fn normalize_template(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(d) if d.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }
                out.push_str("${");
                out.push_str(&digits);
                out.push('}');
            }
            Some('\\') => {
                chars.next();
                out.push_str("\\\\");
            }
            _ => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_matches_are_leftmost_non_overlapping() {
        let m = RegexMatcher::new(Regex::new("aa").unwrap());
        let found = m.find_all("aaaaa", "b");
        assert_eq!(found.len(), 2);
        assert_eq!((found[0].byte_start, found[0].byte_end), (0, 2));
        assert_eq!((found[1].byte_start, found[1].byte_end), (2, 4));
    }

    #[test]
    fn regex_template_expands_groups() {
        let m = RegexMatcher::new(Regex::new(r"\bwlr_scene_(\w+)\b").unwrap());
        let found = m.find_all("struct wlr_scene_node *n;", "sway_scene_${1}");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].replacement, "sway_scene_node");
    }

    #[test]
    fn normalize_sed_backrefs() {
        assert_eq!(normalize_template(r"sway_scene_\1"), "sway_scene_${1}");
        assert_eq!(normalize_template(r"f(\1, \2)"), "f(${1}, ${2})");
        assert_eq!(normalize_template(r"\12x"), "${12}x");
        assert_eq!(normalize_template("plain"), "plain");
        assert_eq!(normalize_template(r"a\nb"), r"a\nb");
    }

    #[test]
    fn metavars_prefer_longer_names() {
        let mut caps = HashMap::new();
        caps.insert("A".to_string(), "x".to_string());
        caps.insert("AB".to_string(), "y".to_string());
        assert_eq!(expand_metavars("f($AB, $A)", &caps), "f(y, x)");
    }

    #[test]
    fn structural_matcher_finds_c_calls() {
        let pattern = Pattern::try_new("wlr_renderer_begin($R, $W, $H)", SupportLang::C).unwrap();
        let m = StructuralMatcher::new(pattern, SupportLang::C);
        let source = "void f(void) { wlr_renderer_begin(r, w, h); }";
        let found = m.find_all(source, "fx_renderer_begin($R, $W)");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].replacement, "fx_renderer_begin(r, w)");
        assert_eq!(
            &source[found[0].byte_start..found[0].byte_end],
            "wlr_renderer_begin(r, w, h)"
        );
    }
}
