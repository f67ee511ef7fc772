//! Narrow, idempotent edits to a meson build manifest.
//!
//! Each operation inspects the current manifest text and returns a
//! [`ManifestPlan`]: either a verified span [`Edit`] or a no-op with the
//! reason nothing needs to change. Planning never touches the filesystem.

use crate::cache;
use crate::edit::{write_atomic, Edit, EditError, EditResult};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Placeholder a manifest template uses for the generated sources list.
pub const SOURCES_PLACEHOLDER: &str = "@SOURCES@";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("no `{variable} = files(...)` list in {file}")]
    MissingSourcesList { file: PathBuf, variable: String },

    #[error("no `dependencies: [...]` list in {file}")]
    MissingDependencyList { file: PathBuf },

    #[error("invalid manifest pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Edit(#[from] EditError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestPlan {
    Edit(Edit),
    NoOp { reason: String },
}

impl ManifestPlan {
    /// Apply the plan to the file on disk. Returns whether the file changed.
    pub fn apply(&self) -> Result<bool, ManifestError> {
        match self {
            ManifestPlan::Edit(edit) => Ok(matches!(edit.apply()?, EditResult::Applied { .. })),
            ManifestPlan::NoOp { .. } => Ok(false),
        }
    }
}

/// `variable = files(\n  'a',\n  'b',\n)`
pub fn render_sources_list(variable: &str, files: &[String]) -> String {
    let mut out = format!("{variable} = files(\n");
    for file in files {
        out.push_str(&format!("  '{file}',\n"));
    }
    out.push(')');
    out
}

/// Fill a manifest template's sources placeholder.
pub fn render_template(template: &str, variable: &str, files: &[String]) -> String {
    template.replace(SOURCES_PLACEHOLDER, &render_sources_list(variable, files))
}

/// Replace the `variable = files(...)` list in `content` with `files`.
pub fn replace_sources_list(
    file: &Path,
    content: &str,
    variable: &str,
    files: &[String],
) -> Result<ManifestPlan, ManifestError> {
    let re = cache::get_or_compile_regex(&format!(
        r"\b{}\s*=\s*files\s*\([^)]*\)",
        regex::escape(variable)
    ))?;
    let Some(m) = re.find(content) else {
        return Err(ManifestError::MissingSourcesList {
            file: file.to_path_buf(),
            variable: variable.to_string(),
        });
    };

    let rendered = render_sources_list(variable, files);
    if m.as_str() == rendered {
        return Ok(ManifestPlan::NoOp {
            reason: format!("{variable} already lists {} files", files.len()),
        });
    }
    Ok(ManifestPlan::Edit(Edit::new(
        file,
        m.start(),
        m.end(),
        rendered,
        m.as_str(),
    )))
}

/// Make sure `dependency('name')` appears in the first `dependencies: [...]`.
pub fn ensure_dependency(
    file: &Path,
    content: &str,
    name: &str,
) -> Result<ManifestPlan, ManifestError> {
    let present = cache::get_or_compile_regex(&format!(
        r#"dependency\s*\(\s*['"]{}['"]"#,
        regex::escape(name)
    ))?;
    if present.is_match(content) {
        return Ok(ManifestPlan::NoOp {
            reason: format!("dependency('{name}') already present"),
        });
    }

    let list = cache::get_or_compile_regex(r"dependencies\s*:\s*\[([^\]]*)\]")?;
    let Some(body) = list.captures(content).and_then(|c| c.get(1)) else {
        return Err(ManifestError::MissingDependencyList {
            file: file.to_path_buf(),
        });
    };

    let line_start = content[..body.start()].rfind('\n').map_or(0, |i| i + 1);
    let indent: String = content[line_start..]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect();

    let existing = body.as_str().trim_end();
    let separator = if existing.is_empty() || existing.ends_with(',') {
        ""
    } else {
        ","
    };
    let replacement = format!("{existing}{separator}\n{indent}  dependency('{name}'),\n{indent}");

    Ok(ManifestPlan::Edit(Edit::new(
        file,
        body.start(),
        body.end(),
        replacement,
        body.as_str(),
    )))
}

/// Write a freshly rendered manifest. Used when none exists yet.
pub fn write_new(file: &Path, content: &str) -> Result<(), ManifestError> {
    write_atomic(file, content.as_bytes())?;
    Ok(())
}
