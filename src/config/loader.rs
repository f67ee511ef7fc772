//! Job file loading.
//!
//! A relative `root` in a job file is taken against the directory holding the
//! file, so a job checked in next to the tree it migrates works from any
//! working directory. `[paths]` stay relative to that root.

use crate::config::schema::{JobConfig, ValidationError, ValidationIssue};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// What is wrong with a job file.
#[derive(Debug)]
pub enum JobFileProblem {
    Unreadable(std::io::Error),
    Syntax(toml_edit::de::Error),
    Invalid(ValidationError),
}

/// A job that could not be loaded, and the file it came from if any.
#[derive(Debug)]
pub struct ConfigError {
    pub file: Option<PathBuf>,
    pub problem: JobFileProblem,
}

impl ConfigError {
    fn inline(problem: JobFileProblem) -> Self {
        Self {
            file: None,
            problem,
        }
    }

    fn in_file(mut self, path: &Path) -> Self {
        self.file.get_or_insert_with(|| path.to_path_buf());
        self
    }

    /// Validation issues, empty for read and syntax errors.
    pub fn issues(&self) -> &[ValidationIssue] {
        match &self.problem {
            JobFileProblem::Invalid(error) => &error.issues,
            _ => &[],
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "job file {}", file.display())?,
            None => write!(f, "job config")?,
        }
        match &self.problem {
            JobFileProblem::Unreadable(e) => write!(f, " cannot be read: {e}"),
            JobFileProblem::Syntax(e) => write!(f, " is not valid TOML: {e}"),
            JobFileProblem::Invalid(e) if e.issues.len() == 1 => write!(f, ": {e}"),
            JobFileProblem::Invalid(e) => write!(f, " has {} problems:\n{e}", e.issues.len()),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.problem {
            JobFileProblem::Unreadable(e) => Some(e),
            JobFileProblem::Syntax(e) => Some(e),
            JobFileProblem::Invalid(e) => Some(e),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<JobConfig, ConfigError> {
    let config: JobConfig = toml_edit::de::from_str(input)
        .map_err(|e| ConfigError::inline(JobFileProblem::Syntax(e)))?;
    config
        .validate()
        .map_err(|e| ConfigError::inline(JobFileProblem::Invalid(e)))?;
    Ok(config)
}

/// Load and validate a job file, anchoring a relative `root` at its directory.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<JobConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .map_err(|e| ConfigError::inline(JobFileProblem::Unreadable(e)).in_file(path))?;
    let mut config = load_from_str(&contents).map_err(|e| e.in_file(path))?;

    if let Some(root) = config.root.take() {
        let base = path.parent().unwrap_or(Path::new(""));
        config.root = Some(base.join(root));
    }
    Ok(config)
}
