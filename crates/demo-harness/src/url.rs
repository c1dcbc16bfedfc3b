//! URL pattern matching for navigation waits.
//!
//! Patterns are written as strings in plans:
//!
//! - `**/shipping`: glob (`*` stays inside one path segment, `**` crosses them)
//! - `re:^https?://[^/]+/shipping$`: regular expression
//! - `prefix:http://localhost:3000/`: prefix
//! - `contains:/shipping`: substring
//! - `*` on its own: any URL
//! - `exact:...` or anything else without `*`: exact match
//! - `glob:...`: glob, even without a wildcard

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::result::{HarnessError, HarnessResult};

const REGEX_PREFIX: &str = "re:";
const PREFIX_PREFIX: &str = "prefix:";
const CONTAINS_PREFIX: &str = "contains:";
const EXACT_PREFIX: &str = "exact:";
const GLOB_PREFIX: &str = "glob:";
const ALL_PREFIXES: [&str; 5] = [
    REGEX_PREFIX,
    PREFIX_PREFIX,
    CONTAINS_PREFIX,
    EXACT_PREFIX,
    GLOB_PREFIX,
];

/// URL pattern for matching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UrlPattern {
    /// Exact URL match
    Exact(String),
    /// Prefix match
    Prefix(String),
    /// Contains substring
    Contains(String),
    /// Regex match
    Regex(String),
    /// Glob pattern (e.g., "**/shipping")
    Glob(String),
    /// Match any URL
    Any,
}

impl UrlPattern {
    /// Create a glob pattern
    #[must_use]
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self::Glob(pattern.into())
    }

    /// Parse the string form, validating regular expressions eagerly
    pub fn parse(input: &str) -> HarnessResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(HarnessError::invalid_plan("URL pattern is empty"));
        }
        if input == "*" {
            return Ok(Self::Any);
        }
        if let Some(exact) = input.strip_prefix(EXACT_PREFIX) {
            return Ok(Self::Exact(exact.to_string()));
        }
        if let Some(glob) = input.strip_prefix(GLOB_PREFIX) {
            return Ok(Self::Glob(glob.to_string()));
        }
        if let Some(re) = input.strip_prefix(REGEX_PREFIX) {
            Regex::new(re).map_err(|e| {
                HarnessError::invalid_plan(format!("invalid URL regex {re:?}: {e}"))
            })?;
            return Ok(Self::Regex(re.to_string()));
        }
        if let Some(prefix) = input.strip_prefix(PREFIX_PREFIX) {
            return Ok(Self::Prefix(prefix.to_string()));
        }
        if let Some(needle) = input.strip_prefix(CONTAINS_PREFIX) {
            return Ok(Self::Contains(needle.to_string()));
        }
        if input.contains('*') {
            return Ok(Self::Glob(input.to_string()));
        }
        Ok(Self::Exact(input.to_string()))
    }

    /// Check if a URL matches this pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Exact(pattern) => url == pattern,
            Self::Prefix(pattern) => url.starts_with(pattern),
            Self::Contains(pattern) => url.contains(pattern),
            Self::Regex(pattern) => Regex::new(pattern)
                .map(|re| re.is_match(url))
                .unwrap_or(false),
            Self::Glob(pattern) => Self::glob_matches(pattern, url),
            Self::Any => true,
        }
    }

    /// Glob matching against the URL without its query string or fragment
    fn glob_matches(pattern: &str, url: &str) -> bool {
        let end = url.find(['?', '#']).unwrap_or(url.len());
        let target = &url[..end];
        Regex::new(&glob_to_regex(pattern))
            .map(|re| re.is_match(target))
            .unwrap_or(false)
    }
}

fn has_known_prefix(pattern: &str) -> bool {
    ALL_PREFIXES.iter().any(|p| pattern.starts_with(p))
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                out.push_str(".*");
            } else {
                out.push_str("[^/]*");
            }
        } else {
            out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
        }
    }
    out.push('$');
    out
}

impl std::fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(p) if p.is_empty() || p.contains('*') || has_known_prefix(p) => {
                write!(f, "{EXACT_PREFIX}{p}")
            }
            Self::Glob(p) if !p.contains('*') || p == "*" || has_known_prefix(p) => {
                write!(f, "{GLOB_PREFIX}{p}")
            }
            Self::Exact(p) | Self::Glob(p) => f.write_str(p),
            Self::Prefix(p) => write!(f, "{PREFIX_PREFIX}{p}"),
            Self::Contains(p) => write!(f, "{CONTAINS_PREFIX}{p}"),
            Self::Regex(p) => write!(f, "{REGEX_PREFIX}{p}"),
            Self::Any => f.write_str("*"),
        }
    }
}

impl TryFrom<String> for UrlPattern {
    type Error = HarnessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UrlPattern> for String {
    fn from(pattern: UrlPattern) -> Self {
        pattern.to_string()
    }
}
