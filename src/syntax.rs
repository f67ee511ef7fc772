//! Parse-error comparison for rewritten C files.
//!
//! Rewriting is text-level, so a bad rule can leave a file that no longer
//! parses. The driver parses before and after with the C grammar and warns
//! when the number of ERROR nodes goes up. It never blocks a write.

use ast_grep_core::AstGrep;
use ast_grep_language::SupportLang;

/// ERROR nodes before and after a rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntaxDelta {
    pub before: usize,
    pub after: usize,
}

impl SyntaxDelta {
    pub fn introduced(&self) -> usize {
        self.after.saturating_sub(self.before)
    }
}

pub fn error_count(source: &str) -> usize {
    let sg = AstGrep::new(source, SupportLang::C);
    sg.root().dfs().filter(|node| node.kind() == "ERROR").count()
}

pub fn compare(before: &str, after: &str) -> SyntaxDelta {
    SyntaxDelta {
        before: error_count(before),
        after: error_count(after),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_c_has_no_errors() {
        assert_eq!(error_count("int main(void) { return 0; }\n"), 0);
    }

    #[test]
    fn broken_rewrite_is_detected() {
        let delta = compare(
            "void f(void) { g(a, b); }\n",
            "void f(void) { g(a, b)) ]; }\n",
        );
        assert_eq!(delta.before, 0);
        assert!(delta.introduced() > 0);
    }

    #[test]
    fn renames_keep_parse_clean() {
        let delta = compare(
            "struct wlr_scene_node *n;\n",
            "struct sway_scene_node *n;\n",
        );
        assert_eq!(delta.introduced(), 0);
    }
}
