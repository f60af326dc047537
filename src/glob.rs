//! Glob matching for `exclude_patterns` (spec §6).
//!
//! Patterns are compiled to anchored regexes rather than hand-rolled char
//! matching or `globset`'s (subtly different) wildcard semantics, so the
//! translation rules stay exactly the three spec requires:
//!
//! - `**` -> `.*`
//! - `*`  -> `[^/]*`
//! - `.`  -> literal `.`
//!
//! Matching is case-sensitive, following the Linux filesystem convention
//! this crate is built against.

use regex::Regex;

/// A compiled set of glob patterns, any one of which matching a path
/// constitutes a hit.
#[derive(Debug, Clone)]
pub struct GlobSet {
    patterns: Vec<Regex>,
}

impl GlobSet {
    /// Compile `patterns`. Invalid patterns are skipped rather than
    /// rejecting the whole set.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = patterns
            .into_iter()
            .filter_map(|p| compile_one(p.as_ref()))
            .collect();
        Self { patterns: compiled }
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(path))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn compile_one(pattern: &str) -> Option<Regex> {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '*' && chars.get(i + 1) == Some(&'*') {
            out.push_str(".*");
            i += 2;
        } else if c == '*' {
            out.push_str("[^/]*");
            i += 1;
        } else if c == '.' {
            out.push_str(r"\.");
            i += 1;
        } else {
            // Escape anything else that is a regex metacharacter; plain
            // path characters pass through untouched.
            if "+()|[]{}^$\\".contains(c) {
                out.push('\\');
            }
            out.push(c);
            i += 1;
        }
    }
    out.push('$');

    Regex::new(&out).ok()
}

/// Default excludes from spec §6.
pub fn default_excludes() -> Vec<String> {
    vec![
        "**/target/**".to_string(),
        "**/build/**".to_string(),
        "**/generated/**".to_string(),
        "**/gen/**".to_string(),
        "**/.git/**".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_star_crosses_separators() {
        let gs = GlobSet::new(["**/target/**"]);
        assert!(gs.is_match("project/target/debug/lib.so"));
        assert!(!gs.is_match("project/targets/debug/lib.so"));
    }

    #[test]
    fn single_star_stops_at_separator() {
        let gs = GlobSet::new(["src/*.java"]);
        assert!(gs.is_match("src/Foo.java"));
        assert!(!gs.is_match("src/nested/Foo.java"));
    }

    #[test]
    fn dot_is_literal() {
        let gs = GlobSet::new(["**/*.g.dart"]);
        assert!(gs.is_match("lib/models/user.g.dart"));
        assert!(!gs.is_match("lib/models/userXgXdart"));
    }

    #[test]
    fn empty_set_never_matches() {
        let gs = GlobSet::new(Vec::<String>::new());
        assert!(gs.is_empty());
        assert!(!gs.is_match("anything"));
    }

    #[test]
    fn invalid_pattern_is_skipped_not_fatal() {
        let gs = GlobSet::new(["[".to_string(), "**/build/**".to_string()]);
        assert!(gs.is_match("a/build/b"));
    }
}
