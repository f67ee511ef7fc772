//! Markdown rendering of a finished run.
//!
//! A pure formatter: everything it prints comes from the ledger snapshot,
//! the run log and the [`ReportMeta`] the driver assembles.

use crate::ledger::{LedgerSnapshot, WrittenFile};
use crate::transcript::RunLog;
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fmt::Write;

const MAX_SAMPLES: usize = 3;
const MAX_DESCRIPTION: usize = 80;

/// What happened to the build manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestStatus {
    /// Profile has no manifest step, or the run stopped early
    NotRun,
    Updated(String),
    Created(String),
    Unchanged(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub title: String,
    pub profile: String,
    pub source: String,
    pub destination: String,
    pub dry_run: bool,
    pub key_files: Vec<String>,
    pub manifest: ManifestStatus,
    pub manual_steps: Vec<String>,
    pub caveats: Vec<String>,
}

pub fn render(
    snapshot: LedgerSnapshot,
    log: &RunLog,
    meta: &ReportMeta,
    generated: DateTime<Local>,
) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_report(&mut out, &snapshot, log, meta, generated);
    out
}

fn write_report(
    out: &mut String,
    snapshot: &LedgerSnapshot,
    log: &RunLog,
    meta: &ReportMeta,
    generated: DateTime<Local>,
) -> std::fmt::Result {
    let stats = &snapshot.stats;

    writeln!(out, "# {}\n", meta.title)?;
    writeln!(out, "**Generated**: {}", generated.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "**Profile**: `{}`", meta.profile)?;
    if meta.dry_run {
        writeln!(out, "**Mode**: dry run, no files were written")?;
    }

    writeln!(out, "\n## Summary\n")?;
    writeln!(out, "- **Files Scanned**: {}", stats.files_scanned)?;
    writeln!(out, "- **Files Processed**: {}", stats.files_processed)?;
    writeln!(out, "- **Files Modified**: {}", stats.files_modified)?;
    writeln!(out, "- **Files Written**: {}", stats.files_written)?;
    writeln!(out, "- **Total Replacements**: {}", stats.substitutions)?;
    writeln!(out, "- **Errors**: {}", stats.errors)?;
    writeln!(out, "- **Source Directory**: `{}`", meta.source)?;
    writeln!(out, "- **Destination Directory**: `{}`", meta.destination)?;

    if !snapshot.usage.is_empty() {
        writeln!(out, "\n## Usage Found\n")?;
        for entry in &snapshot.usage {
            writeln!(out, "### `{}`", entry.file)?;
            for sample in entry.samples.iter().take(MAX_SAMPLES) {
                writeln!(out, "- `{sample}`")?;
            }
            if entry.total > MAX_SAMPLES {
                writeln!(out, "- ... and {} more occurrences", entry.total - MAX_SAMPLES)?;
            }
            writeln!(out)?;
        }
    }

    writeln!(out, "\n## Files Written\n")?;
    if snapshot.written.is_empty() {
        writeln!(out, "*No files were written*")?;
    } else {
        for (dir, files) in group_by_dir(&snapshot.written) {
            writeln!(out, "### {dir}/")?;
            for file in files {
                let name = file.path.rsplit('/').next().unwrap_or(&file.path);
                writeln!(out, "- `{name}` ({} replacements)", file.substitutions)?;
            }
            writeln!(out)?;
        }
    }

    writeln!(out, "\n## Replacement Details\n")?;
    if snapshot.files.is_empty() {
        writeln!(out, "*No replacements were made*")?;
    } else {
        for file in &snapshot.files {
            writeln!(out, "### {}\n", file.file)?;
            for tally in &file.tallies {
                writeln!(
                    out,
                    "- `{}`: {} occurrences",
                    truncate(&tally.description),
                    tally.count
                )?;
            }
            writeln!(out)?;
        }
    }

    if !meta.key_files.is_empty() {
        writeln!(out, "\n## Key Files Status\n")?;
        writeln!(out, "| File | Status | Replacements |")?;
        writeln!(out, "|------|--------|--------------|")?;
        for key in &meta.key_files {
            let changes = snapshot.files.iter().find(|f| &f.file == key);
            let status = if changes.is_some() {
                "✅ Modified"
            } else {
                "❌ Not Modified"
            };
            let count = changes.map_or(0, |f| f.total());
            writeln!(out, "| `{key}` | {status} | {count} |")?;
        }
    }

    writeln!(out, "\n## Build System Updates\n")?;
    match &meta.manifest {
        ManifestStatus::NotRun => writeln!(out, "- No build manifest changes")?,
        ManifestStatus::Updated(detail) => writeln!(out, "- ✅ {detail}")?,
        ManifestStatus::Created(detail) => writeln!(out, "- ✅ {detail}")?,
        ManifestStatus::Unchanged(detail) => writeln!(out, "- {detail}")?,
        ManifestStatus::Failed(detail) => {
            writeln!(out, "- ⚠️ {detail} (may need manual configuration)")?
        }
    }

    if !meta.manual_steps.is_empty() {
        writeln!(out, "\n## Required Manual Steps\n")?;
        for (i, step) in meta.manual_steps.iter().enumerate() {
            writeln!(out, "{}. {step}", i + 1)?;
        }
    }

    if !meta.caveats.is_empty() {
        writeln!(out, "\n## Potential Issues\n")?;
        for caveat in &meta.caveats {
            writeln!(out, "- {caveat}")?;
        }
    }

    writeln!(out, "\n## Detailed Log\n")?;
    writeln!(out, "```")?;
    out.push_str(&log.render());
    writeln!(out, "```")?;
    Ok(())
}

fn group_by_dir(files: &[WrittenFile]) -> BTreeMap<&str, Vec<&WrittenFile>> {
    let mut dirs: BTreeMap<&str, Vec<&WrittenFile>> = BTreeMap::new();
    for file in files {
        let dir = file.path.rsplit_once('/').map_or(".", |(dir, _)| dir);
        dirs.entry(dir).or_default().push(file);
    }
    for list in dirs.values_mut() {
        list.sort_by(|a, b| a.path.cmp(&b.path));
    }
    dirs
}

fn truncate(description: &str) -> String {
    if description.chars().count() <= MAX_DESCRIPTION {
        return description.to_string();
    }
    let head: String = description.chars().take(MAX_DESCRIPTION - 3).collect();
    format!("{head}...")
}
