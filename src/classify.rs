//! File classification and routing.
//!
//! Classification is a pure function of the path string: the extension picks
//! the [`Role`], and the rule set's hook table picks the hooks whose
//! predicates accept the path. Nothing here touches the filesystem.

use crate::hooks::Hook;
use crate::rules::RuleSet;
use serde::Serialize;
use std::fmt;
use std::path::{Component, Path};

/// File name treated as the build manifest.
pub const MANIFEST_FILE_NAME: &str = "meson.build";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    SourceUnit,
    HeaderUnit,
    BuildManifest,
    Unclassified,
}

impl Role {
    pub fn from_path(path: &Path) -> Role {
        if path.file_name().and_then(|n| n.to_str()) == Some(MANIFEST_FILE_NAME) {
            return Role::BuildManifest;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("c") => Role::SourceUnit,
            Some("h") => Role::HeaderUnit,
            _ => Role::Unclassified,
        }
    }

    /// Whether files of this role go through the rewrite engine.
    pub fn is_rewritable(self) -> bool {
        matches!(self, Role::SourceUnit | Role::HeaderUnit)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::SourceUnit => "source unit",
            Role::HeaderUnit => "header unit",
            Role::BuildManifest => "build manifest",
            Role::Unclassified => "unclassified",
        };
        f.write_str(name)
    }
}

/// File-identity predicate used to gate hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePredicate {
    Any,
    Role(Role),
    /// Exact file name, e.g. `scene.c`
    FileName(String),
    /// Trailing path components, e.g. `sway/server.c`
    PathEndsWith(String),
}

impl FilePredicate {
    pub fn file_name(name: impl Into<String>) -> Self {
        FilePredicate::FileName(name.into())
    }

    pub fn path_ends_with(suffix: impl Into<String>) -> Self {
        FilePredicate::PathEndsWith(suffix.into())
    }

    /// `path` is the normalised, `/`-separated relative path.
    pub fn matches(&self, path: &str, role: Role) -> bool {
        match self {
            FilePredicate::Any => true,
            FilePredicate::Role(r) => *r == role,
            FilePredicate::FileName(name) => path.rsplit('/').next() == Some(name.as_str()),
            FilePredicate::PathEndsWith(suffix) => {
                path == suffix
                    || path
                        .strip_suffix(suffix.as_str())
                        .is_some_and(|head| head.ends_with('/'))
            }
        }
    }
}

/// Routing decision for one file. Immutable once computed.
#[derive(Debug, Clone)]
pub struct Classification<'a> {
    /// Normalised relative path the decision was made on
    pub path: String,
    pub role: Role,
    /// `None` for roles that are never rewritten
    pub rules: Option<&'a RuleSet>,
    /// Hooks whose predicates accept this file, in registration order
    pub hooks: Vec<&'a Hook>,
}

impl Classification<'_> {
    pub fn is_rewritable(&self) -> bool {
        self.rules.is_some()
    }
}

/// `/`-separated form of a relative path, independent of the host separator.
pub fn normalize_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn classify<'a>(path: &Path, rules: &'a RuleSet) -> Classification<'a> {
    let normalized = normalize_path(path);
    let role = Role::from_path(path);

    if !role.is_rewritable() {
        return Classification {
            path: normalized,
            role,
            rules: None,
            hooks: Vec::new(),
        };
    }

    let hooks = rules
        .hooks
        .iter()
        .filter(|hook| hook.when.matches(&normalized, role))
        .collect();

    Classification {
        path: normalized,
        role,
        rules: Some(rules),
        hooks,
    }
}
