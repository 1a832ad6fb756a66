//! Glob pattern matching for bulk cache operations.
//!
//! Bulk deletes and key scans accept a glob with `*` wildcards. The pattern
//! is compiled once into an anchored regex; the raw form is kept for
//! backends (Redis `SCAN MATCH`) that understand the glob natively.

use fanout_core::CacheError;
use regex::Regex;

/// A compiled key glob.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    raw: String,
    regex: Regex,
}

impl KeyPattern {
    /// Compile a glob where `*` matches any run of characters.
    ///
    /// All other characters match literally.
    pub fn compile(glob: &str) -> Result<Self, CacheError> {
        let mut source = String::with_capacity(glob.len() + 8);
        source.push('^');
        for (i, segment) in glob.split('*').enumerate() {
            if i > 0 {
                source.push_str(".*");
            }
            source.push_str(&regex::escape(segment));
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| CacheError::InvalidPattern {
            pattern: glob.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            raw: glob.to_string(),
            regex,
        })
    }

    /// The original glob, for backends with native glob scans.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether a key matches the full pattern.
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_pattern_matches_exactly() {
        let pattern = KeyPattern::compile("GET:https://x/y").expect("compile");
        assert!(pattern.matches("GET:https://x/y"));
        assert!(!pattern.matches("GET:https://x/y/z"));
        assert!(!pattern.matches("POST:GET:https://x/y"));
    }

    #[test]
    fn test_wildcard_matches_any_run() {
        let pattern = KeyPattern::compile("GET:https://x/*").expect("compile");
        assert!(pattern.matches("GET:https://x/"));
        assert!(pattern.matches("GET:https://x/y"));
        assert!(pattern.matches("GET:https://x/y/z?a=1"));
        assert!(!pattern.matches("POST:https://x/y"));
    }

    #[test]
    fn test_star_alone_matches_everything() {
        let pattern = KeyPattern::compile("*").expect("compile");
        assert!(pattern.matches("GET:https://x/y"));
        assert!(pattern.matches(""));
    }

    #[test]
    fn test_leading_wildcard_is_kept() {
        let pattern = KeyPattern::compile("*:HASH:deadbeef").expect("compile");
        assert!(pattern.matches("POST:https://x/y:HASH:deadbeef"));
        assert!(!pattern.matches("POST:https://x/y"));

        let suffix = KeyPattern::compile("*abc").expect("compile");
        assert!(suffix.matches("xyzabc"));
        assert!(suffix.matches("abc"));
        assert!(!suffix.matches("abcx"));
    }

    #[test]
    fn test_inner_and_multiple_wildcards() {
        let pattern = KeyPattern::compile("*:https://x/*:HASH:*").expect("compile");
        assert!(pattern.matches("POST:https://x/api:HASH:0123456789abcdef"));
        assert!(!pattern.matches("POST:https://x/api"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        // URLs are full of regex metacharacters; they must not be interpreted.
        let pattern = KeyPattern::compile("GET:https://x/y?a=1*").expect("compile");
        assert!(pattern.matches("GET:https://x/y?a=1&b=2"));
        assert!(!pattern.matches("GET:https://x/ya=1&b=2"));
    }

    #[test]
    fn test_raw_form_preserved() {
        let pattern = KeyPattern::compile("weather:*").expect("compile");
        assert_eq!(pattern.raw(), "weather:*");
    }
}
