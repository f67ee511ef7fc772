//! The run pipeline: enumerate, classify, rewrite, ledger, write, manifest,
//! report.
//!
//! Every failure below the job level is recovered at the narrowest scope and
//! lands in the run log; [`run`] itself always produces a report.

use crate::cache;
use crate::classify::{classify, normalize_path, Role, MANIFEST_FILE_NAME};
use crate::edit::write_atomic;
use crate::engine::{rewrite, RewriteOutcome};
use crate::ledger::{ChangeLedger, FileOutcome, ScanStats, UsageEntry};
use crate::manifest::{self, ManifestError, ManifestPlan};
use crate::profiles::{ManifestTask, OutputLayout, Profile};
use crate::report::{self, ManifestStatus, ReportMeta};
use crate::rules::MatchRecord;
use crate::safety::OutputGuard;
use crate::syntax;
use crate::transcript::RunLog;
use chrono::Local;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

const MAX_SAMPLES: usize = 3;

/// One fully resolved migration run.
#[derive(Debug, Clone)]
pub struct Job {
    pub profile: Profile,
    pub root: PathBuf,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub report: PathBuf,
    pub dry_run: bool,
    pub syntax_check: bool,
    /// Keep before/after text of changed files in the summary
    pub capture_diffs: bool,
}

impl Job {
    /// A job with the profile's default paths under `root`.
    pub fn new(profile: Profile, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            source: root.join(profile.source),
            destination: root.join(profile.destination()),
            report: root.join(profile.report),
            profile,
            root,
            dry_run: false,
            syntax_check: true,
            capture_diffs: false,
        }
    }

    /// Relative paths are taken against the root. In-place profiles keep
    /// the destination equal to the source.
    pub fn with_source(mut self, source: impl AsRef<Path>) -> Self {
        self.source = self.root.join(source);
        if self.profile.layout == OutputLayout::InPlace {
            self.destination = self.source.clone();
        }
        self
    }

    pub fn with_destination(mut self, destination: impl AsRef<Path>) -> Self {
        if self.profile.layout != OutputLayout::InPlace {
            self.destination = self.root.join(destination);
        }
        self
    }

    pub fn with_report(mut self, report: impl AsRef<Path>) -> Self {
        self.report = self.root.join(report);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn syntax_check(mut self, enabled: bool) -> Self {
        self.syntax_check = enabled;
        self
    }

    pub fn capture_diffs(mut self, enabled: bool) -> Self {
        self.capture_diffs = enabled;
        self
    }

    fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(normalize_path)
            .unwrap_or_else(|_| path.display().to_string())
    }

    /// Where a file with `rel` path and `role` ends up.
    fn output_path(&self, rel: &Path, role: Role) -> PathBuf {
        match &self.profile.layout {
            OutputLayout::InPlace => self.source.join(rel),
            OutputLayout::Mirror {
                sources, headers, ..
            } => match role {
                Role::HeaderUnit => self.destination.join(headers).join(rel),
                _ => self.destination.join(sources).join(rel),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileDiff {
    pub path: String,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub profile: String,
    pub report: PathBuf,
    pub dry_run: bool,
    pub stats: ScanStats,
    pub log: RunLog,
    /// Set when the report itself could not be written
    pub report_error: Option<String>,
    #[serde(skip)]
    pub diffs: Vec<FileDiff>,
}

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("source directory does not exist: {0}")]
    SourceMissing(PathBuf),

    #[error("failed to enumerate {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Regular files under `dir`, sorted, as paths relative to `dir`.
fn enumerate(dir: &Path) -> (Vec<PathBuf>, Vec<DriverError>) {
    let mut files = Vec::new();
    let mut errors = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                if let Ok(rel) = entry.path().strip_prefix(dir) {
                    files.push(rel.to_path_buf());
                }
            }
            Ok(_) => {}
            Err(source) => errors.push(DriverError::Walk {
                path: dir.to_path_buf(),
                source,
            }),
        }
    }
    (files, errors)
}

struct Run<'a> {
    job: &'a Job,
    log: RunLog,
    ledger: ChangeLedger,
    diffs: Vec<FileDiff>,
    /// Output paths, relative to the destination, written or due to be
    outputs: BTreeSet<String>,
}

pub fn run(job: &Job) -> RunSummary {
    let mut state = Run {
        job,
        log: RunLog::new(),
        ledger: ChangeLedger::new(),
        diffs: Vec::new(),
        outputs: BTreeSet::new(),
    };
    let manifest = state.execute();
    state.finish(manifest)
}

impl Run<'_> {
    fn execute(&mut self) -> ManifestStatus {
        let job = self.job;
        self.log.info(format!("=== {} Started ===", job.profile.title));
        self.log.info(format!("Profile: {}", job.profile.name));
        self.log.info(format!("Repository root: {}", job.root.display()));
        if job.dry_run {
            self.log.info("Dry run: no files will be written");
        }

        self.log
            .info(format!("Analyzing source directory: {}", job.source.display()));
        if !job.source.is_dir() {
            self.log.error(format!(
                "Source directory does not exist: {}",
                job.source.display()
            ));
            return ManifestStatus::NotRun;
        }

        let (files, walk_errors) = enumerate(&job.source);
        for error in walk_errors {
            self.log.error(error.to_string());
            self.ledger.note_error();
        }

        let roles: Vec<(PathBuf, Role)> = files
            .into_iter()
            .map(|rel| {
                let role = Role::from_path(&rel);
                (rel, role)
            })
            .collect();
        let count = |wanted: Role| roles.iter().filter(|(_, r)| *r == wanted).count();
        self.log
            .info(format!("Found {} .c files", count(Role::SourceUnit)));
        self.log
            .info(format!("Found {} .h files", count(Role::HeaderUnit)));
        self.log.info(format!(
            "Found {} other files",
            count(Role::BuildManifest) + count(Role::Unclassified)
        ));
        for _ in &roles {
            self.ledger.note_scanned();
        }

        if !roles.iter().any(|(_, role)| role.is_rewritable()) {
            self.log.error("No source files found!");
            return ManifestStatus::NotRun;
        }

        if matches!(job.profile.layout, OutputLayout::Mirror { .. }) {
            self.check_existing_stubs();
        }

        let guard = match OutputGuard::new(&job.destination) {
            Ok(guard) => guard,
            Err(e) => {
                self.log.error(format!(
                    "Cannot use destination {}: {e}",
                    job.destination.display()
                ));
                return ManifestStatus::NotRun;
            }
        };

        self.log.info("=== Processing Files ===");
        for (rel, role) in roles.iter().filter(|(_, role)| role.is_rewritable()) {
            self.process_file(&guard, rel, *role);
        }

        self.log.info("=== Updating Build System ===");
        self.update_manifest(&guard)
    }

    fn check_existing_stubs(&mut self) {
        let OutputLayout::Mirror { sources, .. } = &self.job.profile.layout else {
            return;
        };
        let dir = self.job.destination.join(sources);
        self.log
            .info(format!("Checking existing files in: {}", dir.display()));
        if !dir.is_dir() {
            self.log.info("Found 0 existing files");
            return;
        }

        let (files, _) = enumerate(&dir);
        let existing: Vec<_> = files
            .into_iter()
            .filter(|f| Role::from_path(f) == Role::SourceUnit)
            .collect();
        for rel in &existing {
            let Ok(content) = fs::read_to_string(dir.join(rel)) else {
                continue;
            };
            if self
                .job
                .profile
                .stub_markers
                .iter()
                .any(|marker| content.contains(marker))
            {
                self.log
                    .info(format!("Found stub file: {}", normalize_path(rel)));
            }
        }
        self.log
            .info(format!("Found {} existing files", existing.len()));
    }

    fn collect_usage(&mut self, file: &str, content: &str) {
        let mut probes = Vec::new();
        for pattern in &self.job.profile.probes {
            match cache::get_or_compile_regex(pattern) {
                Ok(re) => probes.push(re),
                Err(e) => self
                    .log
                    .error(format!("Invalid probe pattern {pattern}: {e}")),
            }
        }

        let hits: Vec<&str> = content
            .lines()
            .filter(|line| probes.iter().any(|re| re.is_match(line)))
            .collect();
        self.ledger.record_usage(UsageEntry {
            file: file.to_string(),
            samples: hits
                .iter()
                .take(MAX_SAMPLES)
                .map(|l| l.trim().to_string())
                .collect(),
            total: hits.len(),
        });
    }

    fn process_file(&mut self, guard: &OutputGuard, rel: &Path, role: Role) {
        let job = self.job;
        let file = normalize_path(rel);
        self.log.info(format!("Processing: {file}"));

        let content = match fs::read_to_string(job.source.join(rel)) {
            Ok(content) => content,
            Err(e) => {
                self.log.error(format!("Error reading {file}: {e}"));
                self.ledger.note_error();
                return;
            }
        };
        self.log.info(format!(
            "  - Size: {} lines, {} chars",
            content.lines().count(),
            content.chars().count()
        ));
        self.collect_usage(&file, &content);

        let classification = classify(rel, &job.profile.rules);
        let outcome = rewrite(&content, &classification);
        self.log_outcome(&file, &outcome);

        let modified = outcome.content != content;
        if modified && job.syntax_check {
            let delta = syntax::compare(&content, &outcome.content);
            if delta.introduced() > 0 {
                self.log.warn(format!(
                    "  - Rewrite of {file} added {} parse errors ({} -> {})",
                    delta.introduced(),
                    delta.before,
                    delta.after
                ));
            }
        }

        // In-place runs leave unchanged files alone; mirrors copy everything.
        let written = if modified || job.profile.layout != OutputLayout::InPlace {
            self.write_output(guard, rel, role, &outcome.content)
        } else {
            self.log.info("  - No modifications needed");
            None
        };

        if job.capture_diffs && modified {
            self.diffs.push(FileDiff {
                path: file.clone(),
                before: content,
                after: outcome.content,
            });
        }

        self.ledger.absorb(FileOutcome {
            file,
            failures: outcome.failures.len(),
            records: outcome.records,
            modified,
            written,
        });
    }

    fn log_outcome(&mut self, file: &str, outcome: &RewriteOutcome) {
        for failure in &outcome.failures {
            self.log.error(format!(
                "  - Rule '{}' skipped for {file}: {}",
                failure.description, failure.error
            ));
        }
        if !outcome.records.is_empty() {
            self.log.info("  - Replacements made:");
            for MatchRecord {
                description,
                matched,
            } in &outcome.records
            {
                self.log
                    .info(format!("    * {description}: {} occurrences", matched.len()));
            }
        }
        for note in &outcome.notes {
            self.log.warn(format!("  - {file}: {note}"));
        }
    }

    /// Returns the output path relative to the destination when written.
    fn write_output(
        &mut self,
        guard: &OutputGuard,
        rel: &Path,
        role: Role,
        content: &str,
    ) -> Option<String> {
        let job = self.job;
        let target = job.output_path(rel, role);
        let target = match guard.validate_path(&target) {
            Ok(path) => path,
            Err(e) => {
                self.log.error(format!("Refusing to write {}: {e}", target.display()));
                self.ledger.note_error();
                return None;
            }
        };
        let out_rel = target
            .strip_prefix(guard.root())
            .map(normalize_path)
            .unwrap_or_else(|_| target.display().to_string());

        if job.dry_run {
            self.log.info(format!("  - Would write: {}", target.display()));
            self.outputs.insert(out_rel);
            return None;
        }

        match write_atomic(&target, content.as_bytes()) {
            Ok(()) => {
                self.log.info(format!("  - Written to: {}", target.display()));
                self.outputs.insert(out_rel.clone());
                Some(out_rel)
            }
            Err(e) => {
                self.log.error(format!("Error writing {}: {e}", target.display()));
                self.ledger.note_error();
                None
            }
        }
    }

    fn update_manifest(&mut self, guard: &OutputGuard) -> ManifestStatus {
        let Some(task) = self.job.profile.manifest.clone() else {
            return ManifestStatus::NotRun;
        };
        let path = self.job.destination.join(MANIFEST_FILE_NAME);
        if let Err(e) = guard.validate_path(&path) {
            self.log.error(format!("Refusing to edit {}: {e}", path.display()));
            return ManifestStatus::Failed(format!("{MANIFEST_FILE_NAME} not updated"));
        }

        let status = match task {
            ManifestTask::SourcesList {
                variable,
                dir,
                template,
            } => self.update_sources_list(&path, &variable, &dir, &template),
            ManifestTask::Dependency { name } => self.add_dependency(&path, &name),
        };
        match &status {
            ManifestStatus::Failed(detail) => self.log.error(detail.clone()),
            ManifestStatus::Updated(detail)
            | ManifestStatus::Created(detail)
            | ManifestStatus::Unchanged(detail) => self.log.info(format!("  - {detail}")),
            ManifestStatus::NotRun => {}
        }
        status
    }

    fn source_units_in(&self, dir: &str) -> Vec<String> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let mut files: BTreeSet<String> = self
            .outputs
            .iter()
            .filter(|p| p.starts_with(&prefix) && p.ends_with(".c"))
            .cloned()
            .collect();

        let on_disk = self.job.destination.join(dir);
        if on_disk.is_dir() {
            let (existing, _) = enumerate(&on_disk);
            files.extend(
                existing
                    .iter()
                    .filter(|f| Role::from_path(f) == Role::SourceUnit)
                    .map(|f| format!("{prefix}{}", normalize_path(f))),
            );
        }
        files.into_iter().collect()
    }

    fn update_sources_list(
        &mut self,
        path: &Path,
        variable: &str,
        dir: &str,
        template: &str,
    ) -> ManifestStatus {
        let files = self.source_units_in(dir);
        let verb = if self.job.dry_run { "Would update" } else { "Updated" };

        if !path.exists() {
            let content = manifest::render_template(template, variable, &files);
            if !self.job.dry_run {
                if let Err(e) = manifest::write_new(path, &content) {
                    return ManifestStatus::Failed(format!("Error writing {MANIFEST_FILE_NAME}: {e}"));
                }
            }
            let verb = if self.job.dry_run { "Would create" } else { "Created" };
            return ManifestStatus::Created(format!(
                "{verb} `{MANIFEST_FILE_NAME}` with {} source files",
                files.len()
            ));
        }

        let planned = fs::read_to_string(path)
            .map_err(|source| ManifestError::Edit(crate::edit::EditError::Io {
                path: path.to_path_buf(),
                source,
            }))
            .and_then(|content| manifest::replace_sources_list(path, &content, variable, &files));
        match self.apply_plan(planned) {
            Ok(true) => ManifestStatus::Updated(format!(
                "{verb} `{MANIFEST_FILE_NAME}` with {} source files",
                files.len()
            )),
            Ok(false) => ManifestStatus::Unchanged(format!(
                "`{MANIFEST_FILE_NAME}` already lists {} source files",
                files.len()
            )),
            Err(e) => ManifestStatus::Failed(format!("Error updating {MANIFEST_FILE_NAME}: {e}")),
        }
    }

    fn add_dependency(&mut self, path: &Path, name: &str) -> ManifestStatus {
        if !path.exists() {
            return ManifestStatus::Failed(format!("{MANIFEST_FILE_NAME} not found"));
        }
        let planned = fs::read_to_string(path)
            .map_err(|source| ManifestError::Edit(crate::edit::EditError::Io {
                path: path.to_path_buf(),
                source,
            }))
            .and_then(|content| manifest::ensure_dependency(path, &content, name));
        let verb = if self.job.dry_run { "Would add" } else { "Added" };
        match self.apply_plan(planned) {
            Ok(true) => {
                ManifestStatus::Updated(format!("{verb} {name} dependency to {MANIFEST_FILE_NAME}"))
            }
            Ok(false) => ManifestStatus::Unchanged(format!(
                "{name} dependency already present in {MANIFEST_FILE_NAME}"
            )),
            Err(e) => ManifestStatus::Failed(format!("Error updating {MANIFEST_FILE_NAME}: {e}")),
        }
    }

    /// `Ok(true)` when the plan changes (or, in a dry run, would change) the file.
    fn apply_plan(
        &mut self,
        plan: Result<ManifestPlan, ManifestError>,
    ) -> Result<bool, ManifestError> {
        match plan? {
            ManifestPlan::NoOp { reason } => {
                self.log.info(format!("  - No manifest edit: {reason}"));
                Ok(false)
            }
            ManifestPlan::Edit(_) if self.job.dry_run => Ok(true),
            plan => plan.apply(),
        }
    }

    fn finish(mut self, manifest: ManifestStatus) -> RunSummary {
        let job = self.job;
        let profile = &job.profile;
        let report_path = job.report.clone();

        self.log
            .info(format!("Report generated: {}", report_path.display()));

        let stats = self.ledger.stats();
        let meta = ReportMeta {
            title: profile.title.to_string(),
            profile: profile.name.to_string(),
            source: job.display(&job.source),
            destination: job.display(&job.destination),
            dry_run: job.dry_run,
            key_files: profile.key_files.iter().map(|s| s.to_string()).collect(),
            manifest,
            manual_steps: profile.manual_steps.iter().map(|s| s.to_string()).collect(),
            caveats: profile.caveats.iter().map(|s| s.to_string()).collect(),
        };
        let text = report::render(self.ledger.into_snapshot(), &self.log, &meta, Local::now());
        let report_error = write_atomic(&report_path, text.as_bytes())
            .err()
            .map(|e| e.to_string());
        if let Some(error) = &report_error {
            tracing::error!("failed to write report: {error}");
        }

        RunSummary {
            profile: profile.name.to_string(),
            report: report_path,
            dry_run: job.dry_run,
            stats,
            log: self.log,
            report_error,
            diffs: self.diffs,
        }
    }
}

/// A file whose written output would still change on another pass.
#[derive(Debug, Clone, Serialize)]
pub struct Pending {
    pub file: String,
    /// Output is missing entirely
    pub missing: bool,
    pub records: Vec<MatchRecord>,
}

/// Re-apply the profile to the written output without writing anything.
///
/// An empty result means the output has converged.
pub fn verify(job: &Job) -> Result<Vec<Pending>, DriverError> {
    if !job.source.is_dir() {
        return Err(DriverError::SourceMissing(job.source.clone()));
    }
    let (files, errors) = enumerate(&job.source);
    if let Some(error) = errors.into_iter().next() {
        return Err(error);
    }

    let mut pending = Vec::new();
    for rel in files {
        let role = Role::from_path(&rel);
        if !role.is_rewritable() {
            continue;
        }
        let file = normalize_path(&rel);
        let Ok(content) = fs::read_to_string(job.output_path(&rel, role)) else {
            pending.push(Pending {
                file,
                missing: true,
                records: Vec::new(),
            });
            continue;
        };
        let outcome = rewrite(&content, &classify(&rel, &job.profile.rules));
        if outcome.content != content {
            pending.push(Pending {
                file,
                missing: false,
                records: outcome.records,
            });
        }
    }
    Ok(pending)
}
