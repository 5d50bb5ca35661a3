//! Placeholder grammar
//!
//! Recognizes `${NAME}` and, when a separator is configured,
//! `${NAME<SEP>DEFAULT}` inside arbitrary scalar text.
//!
//! The separator is inserted into the regex verbatim. Callers must escape
//! regex metacharacters themselves (`\*` rather than `*`); an unescaped one
//! surfaces as an [`ErrorKind::Pattern`](crate::error::ErrorKind::Pattern)
//! error when the pattern is built.

use std::ops::Range;

use regex::Regex;

use crate::error::{Error, Result};

/// One `${...}` occurrence found in a scalar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderMatch {
    /// Environment variable name
    pub name: String,
    /// Default segment including its leading separator, if one was written
    pub default_segment: Option<String>,
    /// The exact token text, braces included
    pub token: String,
    /// Byte range of the token in the scanned text
    pub range: Range<usize>,
}

/// Compiled placeholder matcher for one separator
#[derive(Debug, Clone)]
pub struct PlaceholderPattern {
    separator: Option<String>,
    regex: Regex,
}

impl PlaceholderPattern {
    /// Build the matcher. `None` or an empty separator disables defaults.
    pub fn new(separator: Option<&str>) -> Result<Self> {
        let separator = separator.filter(|s| !s.is_empty());
        let source = match separator {
            Some(sep) => format!(r"\$\{{([^}}{{{sep}]+)({sep}[^}}{{]*)?\}}"),
            None => r"\$\{([^}{]+)\}".to_string(),
        };
        let regex = Regex::new(&source)
            .map_err(|e| Error::pattern(separator.unwrap_or_default(), e.to_string()))?;

        Ok(Self {
            separator: separator.map(str::to_string),
            regex,
        })
    }

    /// The separator this pattern was built with
    pub fn separator(&self) -> Option<&str> {
        self.separator.as_deref()
    }

    /// The underlying regular expression source
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Check if the text contains at least one placeholder
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// All placeholders in `text`, left to right, non-overlapping
    pub fn find_all(&self, text: &str) -> Vec<PlaceholderMatch> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let name = caps.get(1)?;
                Some(PlaceholderMatch {
                    name: name.as_str().to_string(),
                    default_segment: caps.get(2).map(|m| m.as_str().to_string()),
                    token: whole.as_str().to_string(),
                    range: whole.range(),
                })
            })
            .collect()
    }
}

impl PlaceholderMatch {
    /// The inline default with the separator stripped, if any
    pub fn inline_default(&self, separator: Option<&str>) -> Option<&str> {
        let sep = separator.filter(|s| !s.is_empty())?;
        let segment = self.default_segment.as_deref()?;
        // The segment is written with the unescaped separator, so strip
        // whatever the regex matched for it rather than the raw config value.
        let stripped = segment.strip_prefix(sep).or_else(|| {
            let literal = unescape(sep);
            segment.strip_prefix(literal.as_str())
        });
        Some(stripped.unwrap_or_else(|| {
            // Separator patterns such as `\s` match a variable-length prefix;
            // fall back to dropping the first character.
            let mut chars = segment.chars();
            chars.next();
            chars.as_str()
        }))
    }
}

/// Undo regex escaping of a separator (`\*` -> `*`)
fn unescape(sep: &str) -> String {
    let mut out = String::with_capacity(sep.len());
    let mut chars = sep.chars();
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
