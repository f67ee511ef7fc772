use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// A verified byte-span replacement inside one file.
///
/// Build-manifest plans compile down to this primitive. The span is checked
/// against `expected_before` before anything is written, so an edit planned
/// against stale content fails loudly instead of corrupting the file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until apply() is called"]
pub struct Edit {
    /// File the edit targets
    pub file: PathBuf,
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// Text that replaces [byte_start, byte_end)
    pub new_text: String,
    /// What the span must contain before the edit is applied
    pub expected_before: EditVerification,
}

/// Verification strategy for the replaced span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (used for large spans)
    Hash(u64),
}

impl EditVerification {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Exact match for short spans, hash for anything over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("before-text verification failed at {file}:{byte_start}")]
    BeforeTextMismatch {
        file: PathBuf,
        byte_start: usize,
        byte_end: usize,
        found: String,
    },

    #[error("invalid byte range: [{byte_start}, {byte_end}) in content of length {len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        len: usize,
    },

    #[error("byte range [{byte_start}, {byte_end}) splits a UTF-8 character")]
    NotCharBoundary { byte_start: usize, byte_end: usize },

    #[error("file I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of applying an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditResult should be checked for applied/already-applied"]
pub enum EditResult {
    Applied { file: PathBuf },
    /// The span already holds `new_text`
    AlreadyApplied { file: PathBuf },
}

impl Edit {
    /// Create an edit whose verification is derived from `expected_before`.
    pub fn new(
        file: impl Into<PathBuf>,
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl AsRef<str>,
    ) -> Self {
        Self {
            file: file.into(),
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(expected_before.as_ref()),
        }
    }

    /// Check the span against `content` and return the text currently there.
    fn validate<'a>(&self, content: &'a str) -> Result<&'a str, EditError> {
        if self.byte_start > self.byte_end || self.byte_end > content.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                len: content.len(),
            });
        }
        let current = content
            .get(self.byte_start..self.byte_end)
            .ok_or(EditError::NotCharBoundary {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
            })?;

        if current == self.new_text {
            return Ok(current);
        }

        if !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                file: self.file.clone(),
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                found: current.to_string(),
            });
        }

        Ok(current)
    }

    /// Apply the edit to in-memory content.
    pub fn apply_to(&self, content: &str) -> Result<String, EditError> {
        let current = self.validate(content)?;
        if current == self.new_text {
            return Ok(content.to_string());
        }
        let mut out = String::with_capacity(
            content.len() + self.new_text.len() - (self.byte_end - self.byte_start),
        );
        out.push_str(&content[..self.byte_start]);
        out.push_str(&self.new_text);
        out.push_str(&content[self.byte_end..]);
        Ok(out)
    }

    /// Read the target file, apply the edit and write it back atomically.
    pub fn apply(&self) -> Result<EditResult, EditError> {
        let original = fs::read_to_string(&self.file).map_err(|source| EditError::Io {
            path: self.file.clone(),
            source,
        })?;

        if self.validate(&original)? == self.new_text {
            return Ok(EditResult::AlreadyApplied {
                file: self.file.clone(),
            });
        }

        let updated = self.apply_to(&original)?;
        write_atomic(&self.file, updated.as_bytes())?;

        Ok(EditResult::Applied {
            file: self.file.clone(),
        })
    }
}

/// Atomic whole-file write: tempfile in the target directory, fsync, rename.
///
/// Missing parent directories are created first.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let io_err = |source| EditError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(io_err)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    temp.write_all(content).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    temp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_exact_and_hash() {
        let text = "dependencies: [\n  dep_wlroots,\n]";
        assert!(EditVerification::ExactMatch(text.to_string()).matches(text));
        assert!(EditVerification::Hash(xxh3_64(text.as_bytes())).matches(text));
        assert!(!EditVerification::Hash(xxh3_64(b"other")).matches(text));
    }

    #[test]
    fn test_verification_from_text_uses_hash_for_large_spans() {
        assert!(matches!(
            EditVerification::from_text("files('a.c')"),
            EditVerification::ExactMatch(_)
        ));
        assert!(matches!(
            EditVerification::from_text(&"x".repeat(2000)),
            EditVerification::Hash(_)
        ));
    }

    #[test]
    fn test_apply_to_replaces_span() {
        let edit = Edit::new("meson.build", 0, 3, "bar", "foo");
        assert_eq!(edit.apply_to("foo = 1").unwrap(), "bar = 1");
    }

    #[test]
    fn test_apply_to_rejects_stale_content() {
        let edit = Edit::new("meson.build", 0, 3, "bar", "foo");
        let result = edit.apply_to("baz = 1");
        assert!(matches!(result, Err(EditError::BeforeTextMismatch { .. })));
    }

    #[test]
    fn test_apply_to_invalid_range() {
        let edit = Edit::new("meson.build", 5, 50, "x", "");
        assert!(matches!(
            edit.apply_to("short"),
            Err(EditError::InvalidByteRange { .. })
        ));
    }

    #[test]
    fn test_apply_writes_file_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meson.build");
        fs::write(&path, "project('x')\n").unwrap();

        let edit = Edit::new(&path, 9, 10, "y", "x");
        assert!(matches!(edit.apply().unwrap(), EditResult::Applied { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "project('y')\n");

        assert!(matches!(
            edit.apply().unwrap(),
            EditResult::AlreadyApplied { .. }
        ));
    }

    #[test]
    fn test_write_atomic_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("include/scene-scroll/scene.h");
        write_atomic(&path, b"#pragma once\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "#pragma once\n");
    }
}
