//! Thread-local compilation cache for rule patterns.
//!
//! A run applies the same rule list to every file in the tree, so each
//! pattern is compiled once per thread and cloned out afterwards.
//! Each cache is capped at 256 entries; when full it is cleared and rebuilt on
//! demand. Compile failures are never cached.

use ast_grep_core::Pattern;
use ast_grep_language::SupportLang;
use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;

const MAX_CACHE_ENTRIES: usize = 256;

thread_local! {
    static REGEX_CACHE: RefCell<HashMap<String, Regex>> = RefCell::new(HashMap::new());

    // Key is "<lang_debug>:<pattern_str>" so one pattern string compiled for
    // two grammars never collides.
    static PATTERN_CACHE: RefCell<HashMap<String, Pattern>> = RefCell::new(HashMap::new());
}

/// Get a compiled regex from cache, or compile and cache it.
pub fn get_or_compile_regex(pattern: &str) -> Result<Regex, regex::Error> {
    REGEX_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();

        if let Some(re) = cache.get(pattern) {
            return Ok(re.clone());
        }

        let compiled = Regex::new(pattern)?;
        if cache.len() >= MAX_CACHE_ENTRIES {
            cache.clear();
        }
        cache.insert(pattern.to_string(), compiled.clone());
        Ok(compiled)
    })
}

/// Get a compiled ast-grep pattern from cache, or compile and cache it.
pub fn get_or_compile_pattern(pattern: &str, lang: SupportLang) -> Result<Pattern, String> {
    let cache_key = format!("{lang:?}:{pattern}");

    PATTERN_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();

        if let Some(p) = cache.get(&cache_key) {
            return Ok(p.clone());
        }

        let compiled = Pattern::try_new(pattern, lang).map_err(|e| e.to_string())?;
        if cache.len() >= MAX_CACHE_ENTRIES {
            cache.clear();
        }
        cache.insert(cache_key, compiled.clone());
        Ok(compiled)
    })
}

/// Clear both caches (mainly for testing).
pub fn clear_cache() {
    REGEX_CACHE.with(|cache| cache.borrow_mut().clear());
    PATTERN_CACHE.with(|cache| cache.borrow_mut().clear());
}

/// Number of cached regexes.
pub fn cache_size() -> usize {
    REGEX_CACHE.with(|cache| cache.borrow().len())
}
