//! Balanced scanner for C call expressions.
//!
//! Finds `name(arg, arg, ...)` call sites and splits the argument list at
//! top-level commas. Parentheses, brackets, braces and string/char literals
//! nest. A call whose closing parenthesis is not found within
//! [`MAX_CALL_SPAN`] bytes, or that runs into a `;` at depth zero, is
//! treated as not a match.

use crate::cache;

pub const MAX_CALL_SPAN: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Start of the function name
    pub byte_start: usize,
    /// One past the closing parenthesis
    pub byte_end: usize,
    /// Trimmed argument texts
    pub args: Vec<String>,
}

/// All non-overlapping calls to `function`, left to right.
pub fn find_calls(content: &str, function: &str) -> Result<Vec<CallSite>, regex::Error> {
    let opener = cache::get_or_compile_regex(&format!(r"\b{}\s*\(", regex::escape(function)))?;

    let mut calls = Vec::new();
    let mut resume = 0;
    for m in opener.find_iter(content) {
        if m.start() < resume {
            continue;
        }
        if let Some((byte_end, args)) = scan_args(content, m.end()) {
            calls.push(CallSite {
                byte_start: m.start(),
                byte_end,
                args,
            });
            resume = byte_end;
        }
    }
    Ok(calls)
}

/// Scan from just after `(`; returns the end offset and the arguments.
fn scan_args(content: &str, open: usize) -> Option<(usize, Vec<String>)> {
    let bytes = content.as_bytes();
    let limit = (open + MAX_CALL_SPAN).min(bytes.len());

    let mut depth = 0usize;
    let mut arg_start = open;
    let mut args = Vec::new();
    let mut i = open;

    while i < limit {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_literal(bytes, i, limit)?;
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' if depth > 0 => depth -= 1,
            b')' => {
                let last = content[arg_start..i].trim();
                if !last.is_empty() || !args.is_empty() {
                    args.push(last.to_string());
                }
                return Some((i + 1, args));
            }
            b']' | b'}' => return None,
            b',' if depth == 0 => {
                args.push(content[arg_start..i].trim().to_string());
                arg_start = i + 1;
            }
            b';' if depth == 0 => return None,
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index just past the literal opened at `start`.
fn skip_literal(bytes: &[u8], start: usize, limit: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < limit {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return None,
            c if c == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}
