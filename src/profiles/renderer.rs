//! `fx-renderer`: swap the wlroots renderer for SceneFX's FX renderer in
//! scroll-standalone, in place.

use super::{ManifestTask, OutputLayout, Profile};
use crate::classify::FilePredicate;
use crate::hooks::{Hook, HookAction};
use crate::rules::{Rule, RuleSet};

pub const NAME: &str = "fx-renderer";
pub const FX_RENDERER_INCLUDE: &str = "#include <scenefx/render/fx_renderer/fx_renderer.h>";

/// Any of these means the file already pulls in SceneFX.
const SCENEFX_INCLUDES: &[&str] = &[
    FX_RENDERER_INCLUDE,
    "#include <scenefx/render/pass.h>",
    "#include <scenefx/types/wlr_scene.h>",
];

const EFFECT_FRAMEBUFFERS_INIT: &str = "
\t// Initialize effect framebuffers for SceneFX
\tserver->effect_fbos = fx_effect_framebuffers_create(server->renderer);
\tif (!server->effect_fbos) {
\t\twlr_log(WLR_ERROR, \"Failed to create effect framebuffers\");
\t}";

pub fn rules() -> RuleSet {
    RuleSet::new(NAME)
        .rule(Rule::regex(
            r"#include\s+<wlr/render/wlr_renderer\.h>",
            FX_RENDERER_INCLUDE,
        ))
        .rule(Rule::regex(r"\bstruct wlr_renderer\b", "struct fx_renderer"))
        .rule(Rule::regex(r"\bwlr_renderer\b", "fx_renderer"))
        .rule(Rule::regex(r"\bwlr_renderer_autocreate\b", "fx_renderer_create"))
        .rule(Rule::regex(r"\bwlr_renderer_destroy\b", "fx_renderer_destroy"))
        .rule(Rule::regex(r"\bwlr_backend_get_renderer\b", "fx_get_renderer"))
        .rule(Rule::regex(r"\bwlr_renderer_end\b", "fx_renderer_end"))
        .rule(Rule::regex(r"\bwlr_renderer_clear\b", "fx_renderer_clear"))
        .rule(Rule::regex(
            r"\bwlr_render_texture_with_matrix\b",
            "fx_render_texture_with_matrix",
        ))
        .rule(Rule::regex(r"\bwlr_render_texture\b", "fx_render_texture"))
        .rule(Rule::regex(r"\bwlr_render_rect\b", "fx_render_rect"))
        .rule(Rule::regex(
            r"\bwlr_render_quad_with_matrix\b",
            "fx_render_quad_with_matrix",
        ))
        .rule(Rule::regex(
            r"\bwlr_renderer_begin_render_pass\b",
            "fx_renderer_begin_render_pass",
        ))
        .rule(Rule::regex(r"\bstruct wlr_render_pass\b", "struct fx_render_pass"))
        // fx_renderer_begin takes no height; other arities are left for review
        .hook(Hook::post(
            "Reduced wlr_renderer_begin to fx_renderer_begin",
            FilePredicate::Any,
            HookAction::ReduceCallArity {
                function: "wlr_renderer_begin".to_string(),
                replacement: "fx_renderer_begin".to_string(),
                arity: 3,
                keep: 2,
            },
        ))
        .hook(Hook::post(
            "Unconverted wlr_renderer_begin",
            FilePredicate::Any,
            HookAction::Advisory {
                marker: "wlr_renderer_begin(".to_string(),
                note: "wlr_renderer_begin call with unexpected arguments left unconverted, needs review"
                    .to_string(),
            },
        ))
        .hook(Hook::post(
            "Added SceneFX includes",
            FilePredicate::Any,
            HookAction::InsertAfterLastInclude {
                block: FX_RENDERER_INCLUDE.to_string(),
                unless_present: SCENEFX_INCLUDES.iter().map(|s| s.to_string()).collect(),
                only_if_present: Some("fx_renderer".to_string()),
            },
        ))
        .hook(Hook::post(
            "Normalized server renderer creation",
            FilePredicate::path_ends_with("sway/server.c"),
            HookAction::ReplaceCallArgs {
                function: "fx_renderer_create".to_string(),
                lead: Some(r"server->renderer\s*=\s*$".to_string()),
                args: vec!["server->backend".to_string()],
            },
        ))
        .hook(Hook::post(
            "Added effect framebuffers init",
            FilePredicate::path_ends_with("sway/server.c"),
            HookAction::InsertAfterMatch {
                anchor: r"server->renderer\s*=\s*fx_renderer_create[^;]+;".to_string(),
                block: EFFECT_FRAMEBUFFERS_INIT.to_string(),
                unless_present: vec!["fx_effect_framebuffers_create".to_string()],
            },
        ))
        .hook(Hook::post(
            "Output damage tracking",
            FilePredicate::path_ends_with("sway/desktop/output.c"),
            HookAction::Advisory {
                marker: "wlr_output_damage".to_string(),
                note: "Output uses damage tracking, may need FX-specific handling".to_string(),
            },
        ))
}

pub fn profile() -> Profile {
    Profile {
        name: NAME,
        title: "FX Renderer Replacement Report",
        summary: "Replace wlr_renderer with SceneFX's fx_renderer in scroll-standalone",
        source: "scroll-standalone",
        layout: OutputLayout::InPlace,
        report: "report-fx-renderer-replacement.md",
        rules: rules(),
        probes: vec![r"wlr_renderer", r"wlr_render_", r"WLR_RENDER", r"<wlr/render/"],
        stub_markers: Vec::new(),
        key_files: vec![
            "sway/desktop/output.c",
            "sway/desktop/render.c",
            "sway/desktop/transaction.c",
            "sway/server.c",
            "sway/main.c",
            "sway/tree/container.c",
            "sway/tree/view.c",
        ],
        manifest: Some(ManifestTask::Dependency {
            name: "scenefx".to_string(),
        }),
        manual_steps: vec![
            "**Verify SceneFX dependency**: Ensure scenefx is available in your build environment",
            "**Effect framebuffers**: Check if effect framebuffers initialization is needed",
            "**Renderer capabilities**: Verify FX renderer supports all required features",
            "**Shader compilation**: Ensure SceneFX shaders are compiled and available",
            "**Performance testing**: Test rendering performance with FX renderer",
        ],
        caveats: vec![
            "**API differences**: FX renderer may have different function signatures",
            "**Feature parity**: Some wlr_renderer features might not have FX equivalents",
            "**Initialization order**: FX renderer might require different initialization",
            "**Resource management**: Different cleanup requirements for FX renderer",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::engine::{rewrite, RewriteOutcome};
    use std::path::Path;

    fn run(path: &str, input: &str) -> RewriteOutcome {
        let set = rules();
        let c = classify(Path::new(path), &set);
        rewrite(input, &c)
    }

    const SERVER_C: &str = "#include <wlr/backend.h>\n#include <wlr/render/allocator.h>\n\nbool server_init(struct sway_server *server) {\n\tserver->renderer = wlr_renderer_autocreate(server->backend);\n\treturn true;\n}\n";

    #[test]
    fn server_gets_include_and_framebuffers() {
        let out = run("sway/server.c", SERVER_C);
        assert!(out.content.contains(
            "#include <wlr/render/allocator.h>\n#include <scenefx/render/fx_renderer/fx_renderer.h>\n"
        ));
        assert!(out
            .content
            .contains("server->renderer = fx_renderer_create(server->backend);\n\t// Initialize effect framebuffers"));
        assert_eq!(out.content.matches("fx_effect_framebuffers_create").count(), 1);

        let descriptions: Vec<_> = out.records.iter().map(|r| r.description.as_str()).collect();
        assert!(descriptions.contains(&"Added SceneFX includes"));
        assert!(descriptions.contains(&"Added effect framebuffers init"));
        // Already called with server->backend: nothing to normalize.
        assert!(!descriptions.contains(&"Normalized server renderer creation"));
    }

    #[test]
    fn three_argument_begin_loses_height() {
        let out = run("sway/desktop/render.c", "wlr_renderer_begin(renderer, width, height);\n");
        assert_eq!(out.content, "fx_renderer_begin(renderer, width);\n");
    }

    #[test]
    fn nested_begin_is_reduced_in_output_c() {
        let input = "#include <wlr/render/wlr_renderer.h>\nwlr_renderer_begin(r, output->width, get_height(output));\nstruct wlr_output_damage *d;\n";
        let out = run("sway/desktop/output.c", input);
        assert!(out.content.contains("fx_renderer_begin(r, output->width);"));
        assert_eq!(out.notes.len(), 1);
    }

    #[test]
    fn nested_begin_is_reduced_anywhere() {
        let out = run("sway/desktop/render.c", "wlr_renderer_begin(r, w, scaled(h));\n");
        assert_eq!(out.content, "fx_renderer_begin(r, w);\n");
        assert!(out.notes.is_empty());
    }

    #[test]
    fn unexpected_begin_arity_is_left_and_noted() {
        for input in [
            "wlr_renderer_begin(r, w);\n",
            "wlr_renderer_begin(r, w, h, extra);\n",
        ] {
            for path in ["sway/desktop/render.c", "sway/desktop/output.c"] {
                let out = run(path, input);
                assert_eq!(out.content, input);
                assert!(out.records.is_empty());
                assert!(out.notes.iter().any(|n| n.contains("needs review")));
            }
        }
    }

    #[test]
    fn converted_begin_is_left_alone() {
        let input = "fx_renderer_begin(r, w);\n";
        let out = run("sway/desktop/output.c", input);
        assert_eq!(out.content, input);
        assert!(out.notes.is_empty());
    }

    #[test]
    fn server_creation_with_nested_call_is_normalized() {
        let input = "\tserver->renderer = wlr_renderer_autocreate(get_backend(server));\n";
        let out = run("sway/server.c", input);
        assert!(out
            .content
            .starts_with("\tserver->renderer = fx_renderer_create(server->backend);\n"));
        assert!(!out.content.contains("));"));
        let second = run("sway/server.c", &out.content);
        assert_eq!(second.content, out.content);
    }

    #[test]
    fn include_rule_fires_once_and_blocks_insert() {
        let out = run("sway/main.c", "#include <wlr/render/wlr_renderer.h>\nstruct wlr_renderer *r;\n");
        assert_eq!(
            out.content,
            "#include <scenefx/render/fx_renderer/fx_renderer.h>\nstruct fx_renderer *r;\n"
        );
        assert_eq!(out.records[0].count(), 1);
    }

    #[test]
    fn texture_with_matrix_is_not_split() {
        let out = run("a.c", "wlr_render_texture_with_matrix(r, t, m, 1.0);\nwlr_render_texture(r, t, m, 0, 0, 1.0);\n");
        assert_eq!(
            out.content,
            "fx_render_texture_with_matrix(r, t, m, 1.0);\nfx_render_texture(r, t, m, 0, 0, 1.0);\n"
        );
    }

    #[test]
    fn rewrite_is_idempotent() {
        let first = run("sway/server.c", SERVER_C);
        let second = run("sway/server.c", &first.content);
        assert_eq!(second.content, first.content);
        assert!(second.records.is_empty());
    }
}
