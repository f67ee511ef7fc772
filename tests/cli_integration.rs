//! Integration tests for the command-line interface: run, verify, profiles
//! and job files.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn api_migrator(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_api-migrator"))
        .args(args)
        .env_remove("API_MIGRATOR_ROOT")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

/// A scroll-standalone tree for the fx-renderer profile.
fn setup_renderer_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    let tree = dir.path().join("scroll-standalone/sway");
    fs::create_dir_all(&tree).unwrap();
    fs::write(
        tree.join("server.c"),
        "#include <wlr/backend.h>\n\nvoid init(struct sway_server *server) {\n\tserver->renderer = wlr_renderer_autocreate(server->backend);\n}\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("scroll-standalone/meson.build"),
        "executable('scroll', sources,\n  dependencies: [\n    dependency('wlroots'),\n  ]\n)\n",
    )
    .unwrap();
    dir
}

fn root_arg(dir: &TempDir) -> &str {
    dir.path().to_str().unwrap()
}

#[test]
fn test_run_help() {
    let output = api_migrator(&["run", "--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Rewrite the source tree and write the report"));
    assert!(stdout.contains("--dry-run"));
}

#[test]
fn test_profiles_lists_builtins() {
    let output = api_migrator(&["profiles"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("scene-extraction"));
    assert!(stdout.contains("output: scene-scroll"));
    assert!(stdout.contains("fx-renderer"));
    assert!(stdout.contains("output: in place"));
}

#[test]
fn test_run_prints_summary() {
    let workspace = setup_renderer_workspace();
    let output = api_migrator(&["run", "--root", root_arg(&workspace), "--profile", "fx-renderer"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Profile: fx-renderer"));
    assert!(stdout.contains("Summary:"));
    assert!(stdout.contains("Report:"));

    let server = fs::read_to_string(workspace.path().join("scroll-standalone/sway/server.c")).unwrap();
    assert!(server.contains("fx_renderer_create(server->backend)"));
    assert!(workspace
        .path()
        .join("report-fx-renderer-replacement.md")
        .exists());
}

#[test]
fn test_run_json_summary() {
    let workspace = setup_renderer_workspace();
    let output = api_migrator(&[
        "run",
        "--root",
        root_arg(&workspace),
        "--profile",
        "fx-renderer",
        "--dry-run",
        "--json",
    ]);
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["profile"], "fx-renderer");
    assert_eq!(summary["dry_run"], true);
    assert_eq!(summary["stats"]["files_processed"], 1);
    assert_eq!(summary["stats"]["files_written"], 0);
    assert!(summary["log"]["entries"].as_array().unwrap().len() > 1);

    // Dry run: the tree is untouched.
    let server = fs::read_to_string(workspace.path().join("scroll-standalone/sway/server.c")).unwrap();
    assert!(server.contains("wlr_renderer_autocreate"));
}

#[test]
fn test_run_with_diff() {
    let workspace = setup_renderer_workspace();
    let output = api_migrator(&[
        "run",
        "--root",
        root_arg(&workspace),
        "--profile",
        "fx-renderer",
        "-n",
        "--diff",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--- sway/server.c (original)"));
    assert!(stdout.contains("[DRY RUN - no files were written]"));
}

#[test]
fn test_unknown_profile_suggests() {
    let workspace = TempDir::new().unwrap();
    let output = api_migrator(&["run", "--root", root_arg(&workspace), "--profile", "fx-render"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown profile 'fx-render'"));
    assert!(stderr.contains("did you mean 'fx-renderer'?"));
}

#[test]
fn test_missing_profile_is_an_error() {
    let workspace = TempDir::new().unwrap();
    let output = api_migrator(&["run", "--root", root_arg(&workspace)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No profile selected."));
}

#[test]
fn test_destination_rejected_for_in_place_profile() {
    let workspace = setup_renderer_workspace();
    let output = api_migrator(&[
        "run",
        "--root",
        root_arg(&workspace),
        "--profile",
        "fx-renderer",
        "--destination",
        "elsewhere",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("rewrites in place"));
}

#[test]
fn test_verify_exit_codes() {
    let workspace = setup_renderer_workspace();
    let args = ["verify", "--root", root_arg(&workspace), "--profile", "fx-renderer"];

    let before = api_migrator(&args);
    assert_eq!(before.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&before.stdout).contains("sway/server.c: pending changes"));

    assert!(api_migrator(&["run", "--root", root_arg(&workspace), "--profile", "fx-renderer"])
        .status
        .success());

    let after = api_migrator(&args);
    assert!(after.status.success());
    assert!(String::from_utf8_lossy(&after.stdout).contains("output has converged"));
}

fn write_job(dir: &Path, body: &str) -> String {
    let path = dir.join("job.toml");
    fs::write(&path, body).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_job_file_drives_run() {
    let workspace = TempDir::new().unwrap();
    let src = workspace.path().join("vendor/scene");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("scene.c"), "struct wlr_scene *s;\n").unwrap();

    let job = write_job(
        workspace.path(),
        &format!(
            r#"
profile = "scene-extraction"
root = "{}"

[paths]
source = "vendor/scene"
destination = "out"
report = "reports/scene.md"

[options]
syntax_check = false
"#,
            workspace.path().display()
        ),
    );

    let output = api_migrator(&["run", "--config", &job]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        fs::read_to_string(workspace.path().join("out/src/scene.c")).unwrap(),
        "struct sway_scene *s;\n"
    );
    assert!(workspace.path().join("reports/scene.md").exists());
}

#[test]
fn test_flags_override_job_file() {
    let workspace = setup_renderer_workspace();
    let job = write_job(
        workspace.path(),
        "profile = \"scene-extraction\"\n\n[options]\ndry_run = false\n",
    );

    let output = api_migrator(&[
        "run",
        "--config",
        &job,
        "--root",
        root_arg(&workspace),
        "--profile",
        "fx-renderer",
        "--report",
        "custom.md",
    ]);
    assert!(output.status.success());
    assert!(workspace.path().join("custom.md").exists());
    let server = fs::read_to_string(workspace.path().join("scroll-standalone/sway/server.c")).unwrap();
    assert!(server.contains("fx_renderer_create"));
}

#[test]
fn test_invalid_job_file_names_the_path() {
    let workspace = TempDir::new().unwrap();
    let job = write_job(workspace.path(), "[paths]\nreport = \"report.txt\"\n");
    let output = api_migrator(&["run", "--config", &job, "--root", root_arg(&workspace)]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("job.toml"));
    assert!(stderr.contains("Markdown"));
}

#[test]
fn test_relative_job_root_is_anchored_at_job_file() {
    let workspace = setup_renderer_workspace();
    let jobs = workspace.path().join("jobs");
    fs::create_dir(&jobs).unwrap();
    let job = write_job(&jobs, "profile = \"fx-renderer\"\nroot = \"..\"\n");

    // The binary runs from the crate directory, not the workspace.
    let output = api_migrator(&["run", "--config", &job]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let server = fs::read_to_string(workspace.path().join("scroll-standalone/sway/server.c")).unwrap();
    assert!(server.contains("fx_renderer_create(server->backend)"));
    assert!(workspace
        .path()
        .join("report-fx-renderer-replacement.md")
        .exists());
}
