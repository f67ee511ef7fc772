//! API Migrator: rule-driven source-to-source rewriting for C codebases
//!
//! Walks a source tree, applies an ordered list of pattern substitutions to
//! every C source and header, writes the result (to a mirror tree or in
//! place), patches the meson build manifest and produces a Markdown audit
//! report of every change.
//!
//! # Architecture
//!
//! Every rewrite is a [`Rule`]: a matcher plus a rewrite template, applied
//! globally and in list order. Context-sensitive transforms that a plain
//! rule cannot express are [`Hook`]s, gated by a file-identity predicate and
//! resolved once per file by the classifier. The [`engine`] is a pure
//! function of `(content, classification)`; the [`driver`] folds what it
//! returns into a [`ChangeLedger`] and hands the final snapshot to the
//! [`report`] generator.
//!
//! # Safety
//!
//! - Atomic file writes (tempfile + fsync + rename)
//! - Output root boundary enforcement
//! - Manifest edits verify expected before-text before applying
//! - Idempotent rule sets: a second run finds nothing to do
//!
//! # Example
//!
//! ```no_run
//! use api_migrator::{driver, profiles};
//!
//! let profile = profiles::find("scene-extraction").unwrap();
//! let job = driver::Job::new(profile, "/work/scroll").dry_run(true);
//! let summary = driver::run(&job);
//! println!("{} substitutions", summary.stats.substitutions);
//! ```

pub mod cache;
pub mod classify;
pub mod config;
pub mod driver;
pub mod edit;
pub mod engine;
pub mod hooks;
pub mod ledger;
pub mod manifest;
pub mod profiles;
pub mod report;
pub mod rules;
pub mod safety;
pub mod syntax;
pub mod transcript;

// Re-exports
pub use classify::{classify, Classification, FilePredicate, Role};
pub use config::{load_from_path, load_from_str, ConfigError, JobConfig};
pub use driver::{run, verify, Job, RunSummary};
pub use edit::{Edit, EditError, EditResult, EditVerification};
pub use engine::{rewrite, RewriteOutcome};
pub use hooks::{Hook, HookAction, HookPhase};
pub use ledger::{ChangeLedger, FileOutcome, LedgerSnapshot};
pub use manifest::{ManifestError, ManifestPlan};
pub use profiles::{OutputLayout, Profile};
pub use rules::{apply_rules, MatchRecord, Rule, RuleError, RuleSet};
pub use safety::{OutputGuard, SafetyError};
pub use transcript::{LogLevel, RunLog};
