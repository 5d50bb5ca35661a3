//! Environment variable resolution
//!
//! An [`EnvResolver`] pairs a [`PlaceholderPattern`] with a
//! [`ResolverPolicy`] and rewrites every placeholder in a scalar:
//!
//! 1. environment value, if the variable is set
//! 2. inline default (`${VAR:default}`), if one was written
//! 3. the policy default, unless `raise_if_missing` is set, in which case
//!    the whole scalar fails with a missing variable error

use crate::error::{Error, Result};
use crate::pattern::{PlaceholderMatch, PlaceholderPattern};

/// Default separator between a variable name and its inline default
pub const DEFAULT_SEPARATOR: &str = ":";

/// Fallback used when a variable is unset and has no inline default
pub const DEFAULT_VALUE: &str = "N/A";

/// Immutable resolution policy for one parse call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverPolicy {
    /// Separator between name and inline default (`None` disables defaults)
    pub separator: Option<String>,
    /// Value substituted when a variable is unset and has no inline default
    pub default_value: String,
    /// Fail instead of substituting `default_value`
    pub raise_if_missing: bool,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            separator: Some(DEFAULT_SEPARATOR.to_string()),
            default_value: DEFAULT_VALUE.to_string(),
            raise_if_missing: false,
        }
    }
}

impl ResolverPolicy {
    /// Set the separator (`None` disables inline defaults)
    pub fn with_separator(mut self, separator: Option<impl Into<String>>) -> Self {
        self.separator = separator.map(Into::into).filter(|s: &String| !s.is_empty());
        self
    }

    /// Set the fallback value
    pub fn with_default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = value.into();
        self
    }

    /// Set whether unset variables without inline defaults are fatal
    pub fn with_raise_if_missing(mut self, raise: bool) -> Self {
        self.raise_if_missing = raise;
        self
    }
}

/// How a single placeholder was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The variable was set in the environment
    Environment(String),
    /// The variable was unset and the placeholder carried a default
    InlineDefault(String),
    /// The variable was unset and the policy default was used
    PolicyDefault(String),
}

impl Resolution {
    /// The substituted text
    pub fn value(&self) -> &str {
        match self {
            Resolution::Environment(v)
            | Resolution::InlineDefault(v)
            | Resolution::PolicyDefault(v) => v,
        }
    }
}

/// Substitution engine for `${...}` placeholders
#[derive(Debug, Clone)]
pub struct EnvResolver {
    pattern: PlaceholderPattern,
    policy: ResolverPolicy,
}

impl EnvResolver {
    /// Compile the pattern for the policy's separator
    pub fn new(policy: ResolverPolicy) -> Result<Self> {
        let pattern = PlaceholderPattern::new(policy.separator.as_deref())?;
        Ok(Self { pattern, policy })
    }

    /// The compiled placeholder pattern
    pub fn pattern(&self) -> &PlaceholderPattern {
        &self.pattern
    }

    /// The resolution policy
    pub fn policy(&self) -> &ResolverPolicy {
        &self.policy
    }

    /// Resolve all placeholders against the process environment
    pub fn resolve(&self, scalar: &str) -> Result<String> {
        self.resolve_with(scalar, lookup_env)
    }

    /// Resolve all placeholders using a custom variable lookup
    pub fn resolve_with<F>(&self, scalar: &str, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let matches = self.pattern.find_all(scalar);
        if matches.is_empty() {
            return Ok(scalar.to_string());
        }

        let mut result = String::with_capacity(scalar.len());
        let mut last = 0;
        for m in &matches {
            let resolution = self.resolve_match(m, &lookup)?;
            result.push_str(&scalar[last..m.range.start]);
            result.push_str(resolution.value());
            last = m.range.end;
        }
        result.push_str(&scalar[last..]);

        Ok(result)
    }

    /// Resolve one placeholder
    pub fn resolve_match<F>(&self, m: &PlaceholderMatch, lookup: F) -> Result<Resolution>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(&m.name) {
            log::trace!("Resolved ${{{}}} from the environment", m.name);
            return Ok(Resolution::Environment(value));
        }

        if let Some(default) = m.inline_default(self.policy.separator.as_deref()) {
            log::trace!("Resolved ${{{}}} from its inline default", m.name);
            return Ok(Resolution::InlineDefault(default.to_string()));
        }

        if self.policy.raise_if_missing {
            return Err(Error::missing_variable(&m.name));
        }

        log::debug!(
            "Environment variable {} is not set, using the default value",
            m.name
        );
        Ok(Resolution::PolicyDefault(self.policy.default_value.clone()))
    }
}

/// Look up a variable in the process environment.
///
/// Names the platform cannot represent as keys are reported as unset.
pub fn lookup_env(name: &str) -> Option<String> {
    if name.is_empty() || name.contains('=') || name.contains('\0') {
        return None;
    }
    std::env::var_os(name).map(|v| match v.into_string() {
        Ok(s) => s,
        Err(raw) => raw.to_string_lossy().into_owned(),
    })
}
