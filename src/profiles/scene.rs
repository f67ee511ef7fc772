//! `scene-extraction`: lift Scroll's scene graph into a standalone
//! `scene-scroll` library, renaming `wlr_scene*` to `sway_scene*`.

use super::{ManifestTask, OutputLayout, Profile};
use crate::classify::{FilePredicate, Role};
use crate::hooks::{Hook, HookAction};
use crate::rules::{Rule, RuleSet};

pub const NAME: &str = "scene-extraction";
pub const SCENE_INCLUDE: &str = r#"#include "scene-scroll/scene.h""#;

pub fn rules() -> RuleSet {
    // Include rules run first so the identifier renames below never see a
    // path like <wlr/types/wlr_scene.h>.
    RuleSet::new(NAME)
        .rule(Rule::regex(r"#include\s+<wlr/types/wlr_scene\.h>", SCENE_INCLUDE))
        .rule(Rule::regex(r#"#include\s+"wlr_scene\.h""#, SCENE_INCLUDE))
        .rule(Rule::regex(r"\bwlr_scene_(\w+)\b", r"sway_scene_\1"))
        .rule(Rule::regex(r"\bWLR_SCENE_(\w+)\b", r"SWAY_SCENE_\1"))
        .rule(Rule::regex(r"\bwlr_scene\b", "sway_scene"))
        .rule(Rule::regex(r"\bWLR_SCENE\b", "SWAY_SCENE"))
        .hook(Hook::post(
            "Rewrote sway/tree/scene.h include",
            FilePredicate::file_name("scene.c"),
            HookAction::Substitute(Rule::regex(
                r#"#include "sway/tree/scene\.h""#,
                SCENE_INCLUDE,
            )),
        ))
        .hook(standalone_include("sway/", r#"#include "sway/.*""#))
        .hook(standalone_include("log.h", r#"#include "log\.h""#))
        .hook(standalone_include("util.h", r#"#include "util\.h""#))
        .hook(Hook::post(
            "Renamed WLR_SCENE guards",
            FilePredicate::Role(Role::HeaderUnit),
            HookAction::Substitute(Rule::regex("WLR_SCENE", "SWAY_SCENE")),
        ))
        .hook(Hook::post(
            "Renamed _WLR_TYPES_SCENE_H guard",
            FilePredicate::Role(Role::HeaderUnit),
            HookAction::Substitute(Rule::regex("_WLR_TYPES_SCENE_H", "_SCENE_SCROLL_H")),
        ))
}

fn standalone_include(what: &str, pattern: &str) -> Hook {
    Hook::post(
        format!("Commented out {what} includes"),
        FilePredicate::file_name("scene.c"),
        HookAction::CommentOutInclude {
            pattern: pattern.to_string(),
            note: "Commented for standalone".to_string(),
        },
    )
}

const MESON_TEMPLATE: &str = "project('scene-scroll', 'c',
  version: '0.1.0',
  default_options: ['c_std=c11', 'warning_level=2']
)

@SOURCES@

scene_scroll_inc = include_directories('include')

scene_scroll_lib = static_library(
  'scene-scroll',
  scene_scroll_sources,
  include_directories: scene_scroll_inc,
  dependencies: [
    dependency('wayland-server'),
    dependency('wlroots'),
    dependency('pixman-1'),
  ]
)

scene_scroll_dep = declare_dependency(
  link_with: scene_scroll_lib,
  include_directories: scene_scroll_inc,
)
";

pub fn profile() -> Profile {
    Profile {
        name: NAME,
        title: "Scroll Scene Extraction Report",
        summary: "Extract Scroll's scene graph into scene-scroll as sway_scene",
        source: "references/scroll/sway/tree/scene",
        layout: OutputLayout::Mirror {
            destination: "scene-scroll".to_string(),
            sources: "src".to_string(),
            headers: "include/scene-scroll".to_string(),
        },
        report: "report-scene-extraction.md",
        rules: rules(),
        probes: vec![r"\bwlr_scene", r"\bWLR_SCENE", r"<wlr/types/wlr_scene\.h>"],
        stub_markers: vec!["// Implementation needed", "return NULL;"],
        key_files: Vec::new(),
        manifest: Some(ManifestTask::SourcesList {
            variable: "scene_scroll_sources".to_string(),
            dir: "src".to_string(),
            template: MESON_TEMPLATE.to_string(),
        }),
        manual_steps: vec![
            "Review and fix any Scroll-specific dependencies in extracted files",
            "Implement any missing helper functions that were part of Scroll",
            "Test compilation of scene-scroll as standalone library",
            "Verify all sway_scene API functions are properly exported",
        ],
        caveats: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::engine::rewrite;
    use crate::manifest::SOURCES_PLACEHOLDER;
    use std::path::Path;

    fn run(path: &str, input: &str) -> crate::engine::RewriteOutcome {
        let set = rules();
        let c = classify(Path::new(path), &set);
        rewrite(input, &c)
    }

    #[test]
    fn include_is_rewritten_once() {
        let out = run("scene.c", "#include <wlr/types/wlr_scene.h>\n");
        assert_eq!(out.content, "#include \"scene-scroll/scene.h\"\n");
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].count(), 1);
    }

    #[test]
    fn scene_c_gets_standalone_includes() {
        let input = "#include \"sway/tree/scene.h\"\n#include \"sway/output.h\"\n#include \"log.h\"\n#include <wlr/util/log.h>\n";
        let out = run("scene.c", input);
        assert_eq!(
            out.content,
            "#include \"scene-scroll/scene.h\"\n// #include \"sway/output.h\" // Commented for standalone\n// #include \"log.h\" // Commented for standalone\n#include <wlr/util/log.h>\n"
        );
    }

    #[test]
    fn other_sources_keep_sway_includes() {
        let input = "#include \"sway/output.h\"\n";
        assert_eq!(run("color.c", input).content, input);
    }

    #[test]
    fn header_guards_are_renamed() {
        let input = "#ifndef _WLR_TYPES_SCENE_H\n#define _WLR_TYPES_SCENE_H\nstruct wlr_scene;\n#endif\n";
        let out = run("scene.h", input);
        assert_eq!(
            out.content,
            "#ifndef _SCENE_SCROLL_H\n#define _SCENE_SCROLL_H\nstruct sway_scene;\n#endif\n"
        );

        let guard = run("scene.h", "#ifndef _WLR_SCENE_H\n");
        assert_eq!(guard.content, "#ifndef _SWAY_SCENE_H\n");
    }

    #[test]
    fn template_has_sources_placeholder() {
        assert!(MESON_TEMPLATE.contains(SOURCES_PLACEHOLDER));
    }

    #[test]
    fn rewrite_is_idempotent() {
        let input = "#include <wlr/types/wlr_scene.h>\n#include \"sway/tree/scene.h\"\n#include \"util.h\"\n\nstruct wlr_scene_node *n = wlr_scene_node_at(WLR_SCENE_NODE_TREE);\nstruct wlr_scene *s;\n";
        let first = run("scene.c", input);
        let second = run("scene.c", &first.content);
        assert_eq!(second.content, first.content);
        assert!(second.records.is_empty());
    }
}
