//! Config wrapper
//!
//! [`Config`] wraps a resolved document for dotted-path access. Nested
//! mappings can be taken out as their own [`Config`] with
//! [`Config::section`]; sequences and scalars are returned as plain values.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::parse::{parse_config, ParseOptions};
use crate::value::Value;

/// A resolved, immutable configuration document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    root: Value,
}

impl Config {
    /// Wrap an already resolved value
    pub fn new(value: Value) -> Self {
        Self { root: value }
    }

    /// Parse and wrap a document
    pub fn load(options: &ParseOptions) -> Result<Self> {
        parse_config(options).map(Self::new)
    }

    /// Wrap `value` on top of `defaults`
    ///
    /// Keys present in `value` override the defaults; nested mappings are
    /// merged key by key.
    pub fn with_defaults(defaults: Value, value: Value) -> Self {
        let mut root = defaults;
        root.merge(value);
        Self { root }
    }

    /// Get a value by path (e.g., "database.host" or "servers[0].name")
    pub fn get(&self, path: &str) -> Result<&Value> {
        self.root.get_path(path)
    }

    /// Check whether a path exists
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }

    /// Wrap the mapping at `path`
    pub fn section(&self, path: &str) -> Result<Config> {
        let value = self.get(path)?;
        match value {
            Value::Mapping(_) => Ok(Config::new(value.clone())),
            _ => Err(Error::type_coercion(path, "mapping", value.type_name())),
        }
    }

    /// Top-level keys, in document order
    pub fn keys(&self) -> Vec<&str> {
        self.root
            .as_mapping()
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Top-level entries, in document order
    pub fn entries(&self) -> Option<&IndexMap<String, Value>> {
        self.root.as_mapping()
    }

    /// Get a string value, with type coercion if needed
    pub fn get_string(&self, path: &str) -> Result<String> {
        let value = self.get(path)?;
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Integer(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Null => Ok("null".to_string()),
            _ => Err(Error::type_coercion(path, "string", value.type_name())),
        }
    }

    /// Get an integer value, with type coercion if needed
    pub fn get_i64(&self, path: &str) -> Result<i64> {
        let value = self.get(path)?;
        match value {
            Value::Integer(i) => Ok(*i),
            Value::String(s) => s
                .parse()
                .map_err(|_| Error::type_coercion(path, "integer", format!("string (\"{}\")", s))),
            _ => Err(Error::type_coercion(path, "integer", value.type_name())),
        }
    }

    /// Get a float value, with type coercion if needed
    pub fn get_f64(&self, path: &str) -> Result<f64> {
        let value = self.get(path)?;
        match value {
            Value::Float(f) => Ok(*f),
            Value::Integer(i) => Ok(*i as f64),
            Value::String(s) => s
                .parse()
                .map_err(|_| Error::type_coercion(path, "float", format!("string (\"{}\")", s))),
            _ => Err(Error::type_coercion(path, "float", value.type_name())),
        }
    }

    /// Get a boolean value; strings coerce only from "true" and "false"
    pub fn get_bool(&self, path: &str) -> Result<bool> {
        let value = self.get(path)?;
        match value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(Error::type_coercion(
                    path,
                    "boolean",
                    format!("string (\"{}\") - only \"true\" or \"false\" allowed", s),
                )),
            },
            _ => Err(Error::type_coercion(path, "boolean", value.type_name())),
        }
    }

    /// The wrapped document
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Unwrap the document
    pub fn into_value(self) -> Value {
        self.root
    }

    /// Export the document as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.root.to_yaml_value())
            .map_err(|e| Error::internal(format!("Failed to serialize YAML: {}", e)))
    }

    /// Export the document as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.root)
            .map_err(|e| Error::internal(format!("Failed to serialize JSON: {}", e)))
    }

    /// Deserialize the document into a caller-declared type
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        self.root.deserialize_into()
    }
}

impl From<Value> for Config {
    fn from(value: Value) -> Self {
        Config::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    const COMPLEX: &str = "\
a:
  b:
    c: [1, 2]
    d:
      e: 12
      f: test
g:
  h:
    i: ai
    j: jay
  k: [1, 3, 5]
";

    fn complex() -> Config {
        Config::load(&ParseOptions::from_data(COMPLEX)).unwrap()
    }

    #[test]
    fn test_simple_structure() {
        let config = Config::load(&ParseOptions::from_data("a: 1\nb: 2\n")).unwrap();

        assert_eq!(config.keys(), vec!["a", "b"]);
        assert_eq!(config.get_i64("a").unwrap(), 1);
        assert_eq!(config.get_i64("b").unwrap(), 2);
    }

    #[test]
    fn test_nested_access() {
        let config = complex();

        assert_eq!(config.get_string("g.h.i").unwrap(), "ai");
        assert_eq!(config.get_i64("a.b.d.e").unwrap(), 12);
        assert_eq!(config.get_i64("g.k[2]").unwrap(), 5);
        assert!(config.get("a.b.c").unwrap().is_sequence());
        assert!(config.contains("a.b.d.f"));
        assert!(!config.contains("a.b.x"));
    }

    #[test]
    fn test_sections_wrap_mappings_only() {
        let config = complex();

        let b = config.section("a.b").unwrap();
        assert_eq!(b.keys(), vec!["c", "d"]);
        assert_eq!(b.section("d").unwrap().get_string("f").unwrap(), "test");

        let err = config.section("g.k").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeCoercion);
        assert!(config.section("g.h.i").is_err());
    }

    #[test]
    fn test_with_defaults() {
        let defaults = Config::load(&ParseOptions::from_data(
            "timeout: 30\ndatabase:\n  host: localhost\n  port: 5432\n",
        ))
        .unwrap()
        .into_value();
        let value = Config::load(&ParseOptions::from_data("database:\n  host: prod-db\n"))
            .unwrap()
            .into_value();

        let config = Config::with_defaults(defaults, value);
        assert_eq!(config.get_i64("timeout").unwrap(), 30);
        assert_eq!(config.get_string("database.host").unwrap(), "prod-db");
        assert_eq!(config.get_i64("database.port").unwrap(), 5432);
    }

    #[test]
    fn test_resolves_environment() {
        std::env::set_var("YAMLENV_CONFIG_DB_PORT", "6543");
        let config = Config::load(&ParseOptions::from_data(
            "db:\n  port: !ENV ${YAMLENV_CONFIG_DB_PORT:5432}\n  debug: !ENV ${YAMLENV_CONFIG_DEBUG:false}\n",
        ))
        .unwrap();

        // Substituted values are strings; the getters coerce them
        assert_eq!(config.get("db.port").unwrap(), &Value::from("6543"));
        assert_eq!(config.get_i64("db.port").unwrap(), 6543);
        assert!(!config.get_bool("db.debug").unwrap());
        std::env::remove_var("YAMLENV_CONFIG_DB_PORT");
    }

    #[test]
    fn test_strict_coercion() {
        let config = Config::load(&ParseOptions::from_data(
            "flag: yes\nname: app\nlist: [1]\nratio: 2\n",
        ))
        .unwrap();

        assert!(config.get_bool("flag").is_err());
        assert!(config.get_i64("name").is_err());
        assert!(config.get_string("list").is_err());
        assert_eq!(config.get_f64("ratio").unwrap(), 2.0);
    }

    #[test]
    fn test_missing_path() {
        let err = complex().get("nope.deeper").unwrap_err();
        assert_eq!(err.kind, ErrorKind::PathNotFound);
    }

    #[test]
    fn test_exports() {
        let config = Config::load(&ParseOptions::from_data("name: app\nport: 8080\n")).unwrap();

        assert_eq!(config.to_yaml().unwrap(), "name: app\nport: 8080\n");
        assert_eq!(
            config.to_json().unwrap(),
            "{\n  \"name\": \"app\",\n  \"port\": 8080\n}"
        );
    }

    #[test]
    fn test_deserialize() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct App {
            name: String,
            port: u16,
        }

        let config = Config::load(&ParseOptions::from_data("name: app\nport: 8080\n")).unwrap();
        assert_eq!(
            config.deserialize::<App>().unwrap(),
            App {
                name: "app".into(),
                port: 8080
            }
        );
    }
}
