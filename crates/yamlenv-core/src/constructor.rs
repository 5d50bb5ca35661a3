//! Tag constructors
//!
//! A [`ScalarConstructor`] turns the text of a tagged scalar into a
//! [`Value`]. The loader looks constructors up by tag in a
//! [`ConstructorRegistry`]; [`EnvConstructor`] is the one that plugs the
//! environment resolver into the loader.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::resolver::EnvResolver;
use crate::scalar::construct_inline_tag;
use crate::value::Value;

/// Builds a value from the text of a scalar node
pub trait ScalarConstructor: Send + Sync {
    /// Construct the value for `text`
    fn construct(&self, text: &str) -> Result<Value>;

    /// Whether an untagged plain scalar should be routed to this constructor
    /// when implicit detection is enabled for its tag
    fn detects(&self, _text: &str) -> bool {
        false
    }
}

/// Resolves `${...}` placeholders in the scalar text
///
/// When the substituted text opens with a core tag
/// (`tag:yaml.org,2002:float ${PORT:27017}`), the rest is typed by that tag.
#[derive(Debug, Clone)]
pub struct EnvConstructor {
    resolver: EnvResolver,
}

impl EnvConstructor {
    /// Create a constructor around a resolver
    pub fn new(resolver: EnvResolver) -> Self {
        Self { resolver }
    }

    /// The wrapped resolver
    pub fn resolver(&self) -> &EnvResolver {
        &self.resolver
    }
}

impl ScalarConstructor for EnvConstructor {
    fn construct(&self, text: &str) -> Result<Value> {
        let resolved = self.resolver.resolve(text)?;
        // Text without placeholders comes back exactly as written
        if self.resolver.pattern().is_match(text) {
            if let Some(value) = construct_inline_tag(&resolved) {
                return value;
            }
        }
        Ok(Value::String(resolved))
    }

    fn detects(&self, text: &str) -> bool {
        self.resolver.pattern().is_match(text)
    }
}

/// A simple function-based constructor
pub struct FnConstructor<F>
where
    F: Fn(&str) -> Result<Value> + Send + Sync,
{
    func: F,
}

impl<F> FnConstructor<F>
where
    F: Fn(&str) -> Result<Value> + Send + Sync,
{
    /// Create a new function-based constructor
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> ScalarConstructor for FnConstructor<F>
where
    F: Fn(&str) -> Result<Value> + Send + Sync,
{
    fn construct(&self, text: &str) -> Result<Value> {
        (self.func)(text)
    }
}

/// Constructors keyed by tag
#[derive(Clone, Default)]
pub struct ConstructorRegistry {
    constructors: HashMap<String, Arc<dyn ScalarConstructor>>,
}

impl ConstructorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor, returning the one it replaced
    pub fn register(
        &mut self,
        tag: impl Into<String>,
        constructor: Arc<dyn ScalarConstructor>,
    ) -> Option<Arc<dyn ScalarConstructor>> {
        self.constructors.insert(tag.into(), constructor)
    }

    /// Register a function as a constructor
    pub fn register_fn<F>(&mut self, tag: impl Into<String>, func: F)
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(tag, Arc::new(FnConstructor::new(func)));
    }

    /// Get a constructor by tag
    pub fn get(&self, tag: &str) -> Option<&Arc<dyn ScalarConstructor>> {
        self.constructors.get(tag)
    }

    /// Check if a tag has a constructor
    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Registered tags, in no particular order
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ConstructorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstructorRegistry")
            .field("tags", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}
