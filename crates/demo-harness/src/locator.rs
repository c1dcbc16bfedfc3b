//! Element selectors.
//!
//! A [`Selector`] is an opaque descriptor as far as the engine is concerned:
//! it is handed to the driver unchanged. Drivers that run in a real page
//! turn it into a JavaScript expression via [`Selector::to_all_query`].
//!
//! Selectors round-trip through a compact string form so plans stay
//! readable in YAML:
//!
//! | Form                             | Variant                  |
//! |----------------------------------|--------------------------|
//! | `#origin-zip`, `css=...`         | [`Selector::Css`]        |
//! | `text=Demo in progress`          | [`Selector::Text`]       |
//! | `testid=dimension-length`        | [`Selector::TestId`]     |
//! | `button:has-text('Start Demo')`  | [`Selector::CssWithText`]|

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::result::{HarnessError, HarnessResult};

const CSS_PREFIX: &str = "css=";
const TEXT_PREFIX: &str = "text=";
const TEST_ID_PREFIX: &str = "testid=";

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Selector {
    /// CSS selector (e.g., "#origin-contact-name")
    Css(String),
    /// Any element whose text content contains the string
    Text(String),
    /// Test ID selector (data-testid attribute)
    TestId(String),
    /// CSS selector filtered by text content
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Create a CSS selector restricted to elements containing `text`
    #[must_use]
    pub fn css_with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssWithText {
            css: css.into(),
            text: text.into(),
        }
    }

    /// Parse the compact string form
    pub fn parse(input: &str) -> HarnessResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(HarnessError::invalid_plan("selector is empty"));
        }
        if let Some(rest) = input.strip_prefix(TEXT_PREFIX) {
            return Ok(Self::Text(rest.to_string()));
        }
        if let Some(rest) = input.strip_prefix(TEST_ID_PREFIX) {
            return Ok(Self::TestId(rest.to_string()));
        }
        if let Some(rest) = input.strip_prefix(CSS_PREFIX) {
            return Ok(Self::Css(rest.to_string()));
        }
        if let Some(caps) = has_text_pattern().captures(input) {
            let css = caps.get(1).map_or("", |m| m.as_str()).trim();
            let text = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map_or(String::new(), |m| unescape(m.as_str()));
            let css = if css.is_empty() { "*" } else { css };
            return Ok(Self::css_with_text(css, text));
        }
        Ok(Self::Css(input.to_string()))
    }

    /// JavaScript expression evaluating to an array of every matching element
    #[must_use]
    pub fn to_all_query(&self) -> String {
        match self {
            Self::Css(css) => format!("Array.from(document.querySelectorAll({}))", js_str(css)),
            Self::Text(text) => format!(
                "Array.from(document.querySelectorAll('body *')).filter(el => el.children.length === 0 && (el.textContent || '').includes({}))",
                js_str(text)
            ),
            Self::TestId(id) => {
                let css = format!("[data-testid={}]", js_str(id));
                format!("Array.from(document.querySelectorAll({}))", js_str(&css))
            }
            Self::CssWithText { css, text } => format!(
                "Array.from(document.querySelectorAll({})).filter(el => (el.textContent || '').includes({}))",
                js_str(css),
                js_str(text)
            ),
        }
    }

    /// JavaScript expression evaluating to the `index`-th match or `null`
    #[must_use]
    pub fn to_nth_query(&self, index: usize) -> String {
        format!("({}[{index}] || null)", self.to_all_query())
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Css(css) => {
                let ambiguous = [CSS_PREFIX, TEXT_PREFIX, TEST_ID_PREFIX]
                    .iter()
                    .any(|p| css.starts_with(p))
                    || has_text_pattern().is_match(css);
                if ambiguous {
                    write!(f, "{CSS_PREFIX}{css}")
                } else {
                    f.write_str(css)
                }
            }
            Self::Text(text) => write!(f, "{TEXT_PREFIX}{text}"),
            Self::TestId(id) => write!(f, "{TEST_ID_PREFIX}{id}"),
            Self::CssWithText { css, text } => {
                let quote = if text.contains('\'') && !text.contains('"') {
                    '"'
                } else {
                    '\''
                };
                write!(f, "{css}:has-text({quote}{}{quote})", escape(text, quote))
            }
        }
    }
}

impl TryFrom<String> for Selector {
    type Error = HarnessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.to_string()
    }
}

impl std::str::FromStr for Selector {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn has_text_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"^(.*):has-text\(\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")\s*\)$"#,
        )
            .expect("has-text pattern is a valid regex")
    })
}

/// Backslash-escape `quote` and backslashes inside a `:has-text` literal
fn escape(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == quote || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Quote a string as a JavaScript literal
fn js_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}
