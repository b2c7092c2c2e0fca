//! Thread-local compilation cache for regular expressions.
//!
//! Smart patterns compile one anchored regex per usable segment run, and
//! segmentation re-runs the same handful of expressions for every file, so
//! compiled programs are cached and handed out as cheap clones.
//! Cache is capped at 256 entries; it is cleared when full.

use crate::pattern::{Flags, PatternError};
use regex::{Regex, RegexBuilder};
use std::cell::RefCell;
use std::collections::HashMap;

const MAX_CACHE_ENTRIES: usize = 256;

thread_local! {
    // Key is "<flags>:<anchored>:<source>" so the same source compiled with
    // different flags or anchoring never collides.
    static REGEX_CACHE: RefCell<HashMap<String, Regex>> =
        RefCell::new(HashMap::new());
}

/// Get a compiled regex from cache, or compile and cache it.
///
/// Anchored expressions only match at offset 0 of the haystack they are
/// run against.
pub fn get_or_compile(source: &str, flags: Flags, anchored: bool) -> Result<Regex, PatternError> {
    let cache_key = format!("{}:{anchored}:{source}", flags.key());

    REGEX_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();

        if let Some(re) = cache.get(&cache_key) {
            return Ok(re.clone());
        }

        if cache.len() >= MAX_CACHE_ENTRIES {
            cache.clear();
        }

        let wrapped = if anchored {
            format!(r"\A(?:{source})")
        } else {
            source.to_string()
        };
        let compiled = RegexBuilder::new(&wrapped)
            .case_insensitive(flags.ignore_case)
            .dot_matches_new_line(flags.dot_all)
            .multi_line(flags.multi_line)
            .build()
            .map_err(|e| PatternError::InvalidRegex {
                pattern: source.to_string(),
                message: e.to_string(),
            })?;
        cache.insert(cache_key, compiled.clone());
        Ok(compiled)
    })
}

/// Clear the regex cache (mainly for testing).
pub fn clear_cache() {
    REGEX_CACHE.with(|cache| {
        cache.borrow_mut().clear();
    });
}

/// Get cache statistics for monitoring.
pub fn cache_size() -> usize {
    REGEX_CACHE.with(|cache| cache.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiled_regex_is_reused() {
        clear_cache();
        let first = get_or_compile("ab+c", Flags::default(), false).unwrap();
        let second = get_or_compile("ab+c", Flags::default(), false).unwrap();
        assert_eq!(first.as_str(), second.as_str());
        assert_eq!(cache_size(), 1);
    }

    #[test]
    fn flags_and_anchoring_are_part_of_the_key() {
        clear_cache();
        get_or_compile("abc", Flags::default(), false).unwrap();
        get_or_compile("abc", Flags::default(), true).unwrap();
        get_or_compile("abc", Flags::default().ignore_case(), false).unwrap();
        assert_eq!(cache_size(), 3);
    }

    #[test]
    fn anchored_only_matches_at_start() {
        let re = get_or_compile("b", Flags::default(), true).unwrap();
        assert!(re.find("abc").is_none());
        assert!(re.find("bc").is_some());
    }

    #[test]
    fn invalid_source_is_reported() {
        let err = get_or_compile("a(b", Flags::default(), false).unwrap_err();
        assert!(matches!(err, PatternError::InvalidRegex { .. }));
    }
}
