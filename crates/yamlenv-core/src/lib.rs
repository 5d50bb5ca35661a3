//! yamlenv-core: environment variable placeholders in YAML
//!
//! This crate parses YAML documents and substitutes `${VAR}` and
//! `${VAR:default}` placeholders with values from the process environment
//! while the document is being loaded. By default only scalars tagged
//! `!ENV` are substituted.
//!
//! # Example
//!
//! ```rust
//! use yamlenv_core::{parse_config, ParseOptions};
//!
//! let yaml = r#"
//! database:
//!   host: !ENV ${YAMLENV_DOC_DB_HOST:localhost}
//!   port: 5432
//! "#;
//!
//! let value = parse_config(&ParseOptions::from_data(yaml)).unwrap();
//! assert_eq!(value.get_path("database.host").unwrap().as_str(), Some("localhost"));
//! ```

pub mod constructor;
pub mod error;
pub mod loader;
pub mod pattern;
pub mod resolver;
pub mod scalar;
pub mod value;

mod config;
mod parse;

pub use config::Config;
pub use constructor::{ConstructorRegistry, EnvConstructor, FnConstructor, ScalarConstructor};
pub use error::{Error, ErrorKind, Result};
pub use loader::{Loader, LoaderKind};
pub use parse::{parse_config, parse_config_as, ParseOptions, DEFAULT_ENCODING, DEFAULT_TAG};
pub use pattern::{PlaceholderMatch, PlaceholderPattern};
pub use resolver::{EnvResolver, Resolution, ResolverPolicy};
pub use value::{TaggedValue, Value};
