//! Path prefix matching.
//!
//! # Design Decisions
//! - Prefixes match on segment boundaries: `/app` matches `/app` and
//!   `/app/settings`, never `/application`
//! - Path matching is case-sensitive
//! - No regex, ordered scan, first match wins

/// Matches a request path against one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. A trailing slash is ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        Self {
            prefix: if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() },
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return path.starts_with('/');
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// An ordered list of prefixes.
#[derive(Debug, Clone, Default)]
pub struct PrefixSet {
    matchers: Vec<PathPrefixMatcher>,
}

impl PrefixSet {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            matchers: prefixes.into_iter().map(PathPrefixMatcher::new).collect(),
        }
    }

    /// First matching prefix.
    pub fn first_match(&self, path: &str) -> Option<&PathPrefixMatcher> {
        self.matchers.iter().find(|m| m.matches(path))
    }

    pub fn matches(&self, path: &str) -> bool {
        self.first_match(path).is_some()
    }
}
