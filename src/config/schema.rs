use crate::profiles::{self, OutputLayout};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Optional job file: `api-migrator run --config job.toml`.
///
/// ```toml
/// profile = "scene-extraction"
/// root = "/work/scroll"
///
/// [paths]
/// source = "references/scroll/sway/tree/scene"
/// destination = "scene-scroll"
/// report = "reports/scene.md"
///
/// [options]
/// dry_run = false
/// syntax_check = true
/// ```
#[derive(Debug, Deserialize, Default, Clone)]
pub struct JobConfig {
    #[serde(default)]
    pub profile: Option<String>,
    /// Relative roots are resolved against the job file's directory
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub options: Options,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Paths {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub report: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Options {
    #[serde(default)]
    pub dry_run: Option<bool>,
    #[serde(default)]
    pub syntax_check: Option<bool>,
}

impl JobConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        let profile = match self.profile.as_deref() {
            Some(name) if name.trim().is_empty() => {
                issues.push(ValidationIssue::EmptyField { field: "profile" });
                None
            }
            Some(name) => match profiles::find(name) {
                Ok(profile) => Some(profile),
                Err(unknown) => {
                    issues.push(ValidationIssue::UnknownProfile {
                        name: unknown.name,
                        suggestion: unknown.suggestion,
                    });
                    None
                }
            },
            None => None,
        };

        if self.root.as_ref().is_some_and(|r| r.as_os_str().is_empty()) {
            issues.push(ValidationIssue::EmptyField { field: "root" });
        }
        for (field, value) in [
            ("paths.source", &self.paths.source),
            ("paths.destination", &self.paths.destination),
            ("paths.report", &self.paths.report),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                issues.push(ValidationIssue::EmptyField { field });
            }
        }

        if let Some(report) = self.paths.report.as_deref() {
            if !report.trim().is_empty() && !report.ends_with(".md") {
                issues.push(ValidationIssue::InvalidCombo {
                    message: format!("paths.report must be a Markdown file, got '{report}'"),
                });
            }
        }

        if let Some(profile) = &profile {
            if profile.layout == OutputLayout::InPlace && self.paths.destination.is_some() {
                issues.push(ValidationIssue::InvalidCombo {
                    message: format!(
                        "profile '{}' rewrites in place; paths.destination is not allowed",
                        profile.name
                    ),
                });
            }
        }

        if let (Some(source), Some(destination)) = (&self.paths.source, &self.paths.destination) {
            if source.trim_end_matches('/') == destination.trim_end_matches('/') {
                issues.push(ValidationIssue::InvalidCombo {
                    message: "paths.source and paths.destination must differ".to_string(),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyField {
        field: &'static str,
    },
    UnknownProfile {
        name: String,
        suggestion: Option<String>,
    },
    InvalidCombo {
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyField { field } => write!(f, "field '{field}' must not be empty"),
            ValidationIssue::UnknownProfile { name, suggestion } => match suggestion {
                Some(s) => write!(f, "unknown profile '{name}' (did you mean '{s}'?)"),
                None => write!(f, "unknown profile '{name}'"),
            },
            ValidationIssue::InvalidCombo { message } => {
                write!(f, "invalid job configuration: {message}")
            }
        }
    }
}
