//! Change accounting.
//!
//! The driver owns one [`ChangeLedger`] per run and folds every file's
//! [`FileOutcome`] into it. At the end of the run the ledger is consumed into
//! a [`LedgerSnapshot`] that the report generator reads.

use crate::rules::MatchRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// Substitutions made by one rule (or hook) in one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleTally {
    pub description: String,
    pub count: usize,
}

/// Tallies for one file, in first-emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChanges {
    pub file: String,
    pub tallies: Vec<RuleTally>,
}

impl FileChanges {
    pub fn total(&self) -> usize {
        self.tallies.iter().map(|t| t.count).sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub files_scanned: usize,
    pub files_processed: usize,
    pub files_modified: usize,
    pub files_written: usize,
    pub substitutions: usize,
    pub errors: usize,
}

/// A file that was written, relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    pub path: String,
    pub substitutions: usize,
}

/// Probe hits for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageEntry {
    pub file: String,
    /// First few matching lines, trimmed
    pub samples: Vec<String>,
    pub total: usize,
}

/// Everything the driver learned about one rewritable file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub file: String,
    pub records: Vec<MatchRecord>,
    pub failures: usize,
    pub modified: bool,
    /// Output path when the file was written
    pub written: Option<String>,
}

#[derive(Debug, Default)]
pub struct ChangeLedger {
    files: BTreeMap<String, Vec<RuleTally>>,
    written: Vec<WrittenFile>,
    usage: BTreeMap<String, UsageEntry>,
    stats: ScanStats,
}

impl ChangeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` substitutions for `description` in `file`.
    ///
    /// Additive across calls. A zero count leaves no entry.
    pub fn record(&mut self, file: &str, description: &str, count: usize) {
        if count == 0 {
            return;
        }
        let tallies = self.files.entry(file.to_string()).or_default();
        match tallies.iter_mut().find(|t| t.description == description) {
            Some(tally) => tally.count += count,
            None => tallies.push(RuleTally {
                description: description.to_string(),
                count,
            }),
        }
        self.stats.substitutions += count;
    }

    pub fn note_scanned(&mut self) {
        self.stats.files_scanned += 1;
    }

    pub fn note_error(&mut self) {
        self.stats.errors += 1;
    }

    pub fn record_usage(&mut self, entry: UsageEntry) {
        if entry.total > 0 {
            self.usage.insert(entry.file.clone(), entry);
        }
    }

    /// Fold one processed file into the ledger.
    pub fn absorb(&mut self, outcome: FileOutcome) {
        self.stats.files_processed += 1;
        self.stats.errors += outcome.failures;
        if outcome.modified {
            self.stats.files_modified += 1;
        }

        let mut substitutions = 0;
        for record in &outcome.records {
            substitutions += record.count();
            self.record(&outcome.file, &record.description, record.count());
        }

        if let Some(path) = outcome.written {
            self.stats.files_written += 1;
            self.written.push(WrittenFile {
                path,
                substitutions,
            });
        }
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn into_snapshot(self) -> LedgerSnapshot {
        LedgerSnapshot {
            stats: self.stats,
            files: self
                .files
                .into_iter()
                .map(|(file, tallies)| FileChanges { file, tallies })
                .collect(),
            written: self.written,
            usage: self.usage.into_values().collect(),
        }
    }
}

/// Read-only view of a finished run, ordered by file name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerSnapshot {
    pub stats: ScanStats,
    pub files: Vec<FileChanges>,
    pub written: Vec<WrittenFile>,
    pub usage: Vec<UsageEntry>,
}
