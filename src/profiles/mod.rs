//! Compiled-in migration profiles.
//!
//! A profile is configuration data: the rule set and hook table, where the
//! files live, how output is laid out, what to do to the build manifest, and
//! the metadata the report renders. The engine never looks inside one.

pub mod renderer;
pub mod scene;

use crate::rules::RuleSet;
use std::fmt;

/// Where rewritten files go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLayout {
    /// Rewrite files where they are. Unchanged files are not touched.
    InPlace,
    /// Write every file under a separate destination tree, keeping paths
    /// relative to the source root. Source units land under `sources`,
    /// header units under `headers`.
    Mirror {
        destination: String,
        sources: String,
        headers: String,
    },
}

/// Build-manifest step run after all files are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestTask {
    /// Regenerate `variable = files(...)` from the source units under
    /// `dir` in the output tree. `template` is rendered when no manifest
    /// exists yet.
    SourcesList {
        variable: String,
        dir: String,
        template: String,
    },
    /// Ensure `dependency('name')` is linked.
    Dependency { name: String },
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub name: &'static str,
    /// Report heading
    pub title: &'static str,
    pub summary: &'static str,
    /// Default source directory, relative to the root
    pub source: &'static str,
    pub layout: OutputLayout,
    /// Report path, relative to the root
    pub report: &'static str,
    pub rules: RuleSet,
    /// Patterns whose matching lines are sampled into the report
    pub probes: Vec<&'static str>,
    /// Text that marks a placeholder file in an existing destination
    pub stub_markers: Vec<&'static str>,
    /// Files whose status gets its own table in the report
    pub key_files: Vec<&'static str>,
    pub manifest: Option<ManifestTask>,
    pub manual_steps: Vec<&'static str>,
    pub caveats: Vec<&'static str>,
}

impl Profile {
    /// Destination directory, relative to the root.
    pub fn destination(&self) -> &str {
        match &self.layout {
            OutputLayout::InPlace => self.source,
            OutputLayout::Mirror { destination, .. } => destination,
        }
    }
}

pub fn builtin() -> Vec<Profile> {
    vec![scene::profile(), renderer::profile()]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProfile {
    pub name: String,
    pub suggestion: Option<String>,
}

impl fmt::Display for UnknownProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown profile '{}'", self.name)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (did you mean '{suggestion}'?)")?;
        }
        Ok(())
    }
}

impl std::error::Error for UnknownProfile {}

pub fn find(name: &str) -> Result<Profile, UnknownProfile> {
    let profiles = builtin();
    let suggestion = profiles
        .iter()
        .map(|p| (strsim::jaro_winkler(name, p.name), p.name))
        .filter(|(score, _)| *score > 0.7)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, n)| n.to_string());

    profiles
        .into_iter()
        .find(|p| p.name == name)
        .ok_or(UnknownProfile {
            name: name.to_string(),
            suggestion,
        })
}
