//! Parse entry point
//!
//! [`parse_config`] reads YAML from a file or a string, builds a loader for
//! this one call, registers the environment constructor on it and returns
//! the resolved document.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::constructor::{EnvConstructor, ScalarConstructor};
use crate::error::{Error, Result, SourceLocation};
use crate::loader::{Loader, LoaderKind};
use crate::resolver::{EnvResolver, ResolverPolicy, DEFAULT_SEPARATOR, DEFAULT_VALUE};
use crate::value::Value;

/// Default tag marking scalars for substitution
pub const DEFAULT_TAG: &str = "!ENV";

/// Default file encoding
pub const DEFAULT_ENCODING: &str = "utf-8";

/// Options for one parse call
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOptions {
    /// File to read (exactly one of `path` and `data` must be set)
    pub path: Option<PathBuf>,
    /// YAML text to parse
    pub data: Option<String>,
    /// Tag gating substitution; `None` resolves every scalar
    pub tag: Option<String>,
    /// Treat untagged plain scalars containing placeholders as tagged
    pub implicit: bool,
    /// Separator between variable name and inline default
    pub separator: Option<String>,
    /// Value for unset variables without an inline default
    pub default_value: String,
    /// Fail on unset variables without an inline default
    pub raise_if_missing: bool,
    /// Loader trust level
    pub loader: LoaderKind,
    /// Encoding of the file at `path`
    pub encoding: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            path: None,
            data: None,
            tag: Some(DEFAULT_TAG.to_string()),
            implicit: false,
            separator: Some(DEFAULT_SEPARATOR.to_string()),
            default_value: DEFAULT_VALUE.to_string(),
            raise_if_missing: false,
            loader: LoaderKind::Safe,
            encoding: DEFAULT_ENCODING.to_string(),
        }
    }
}

impl ParseOptions {
    /// Options reading from a file
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Options parsing a YAML string
    pub fn from_data(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            ..Default::default()
        }
    }

    /// Set the gating tag (`None` for global mode)
    pub fn with_tag(mut self, tag: Option<impl Into<String>>) -> Self {
        self.tag = tag.map(Into::into);
        self
    }

    /// Enable or disable implicit detection
    pub fn with_implicit(mut self, implicit: bool) -> Self {
        self.implicit = implicit;
        self
    }

    /// Set the separator (`None` disables inline defaults)
    pub fn with_separator(mut self, separator: Option<impl Into<String>>) -> Self {
        self.separator = separator.map(Into::into);
        self
    }

    /// Set the fallback value for unset variables
    pub fn with_default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = value.into();
        self
    }

    /// Set whether unset variables without inline defaults are fatal
    pub fn with_raise_if_missing(mut self, raise: bool) -> Self {
        self.raise_if_missing = raise;
        self
    }

    /// Set the loader trust level
    pub fn with_loader(mut self, loader: LoaderKind) -> Self {
        self.loader = loader;
        self
    }

    /// Set the file encoding
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// The resolution policy these options describe
    pub fn policy(&self) -> ResolverPolicy {
        ResolverPolicy::default()
            .with_separator(self.separator.clone())
            .with_default_value(self.default_value.clone())
            .with_raise_if_missing(self.raise_if_missing)
    }

    /// Build the loader for one call, with the environment constructor registered
    pub fn build_loader(&self) -> Result<Loader> {
        let resolver = EnvResolver::new(self.policy())?;
        let constructor: Arc<dyn ScalarConstructor> = Arc::new(EnvConstructor::new(resolver));

        let mut loader = Loader::new(self.loader);
        match self.tag.as_deref().filter(|t| !t.is_empty()) {
            Some(tag) => {
                loader.add_constructor(tag, constructor);
                if self.implicit {
                    loader.add_implicit_resolver(tag);
                }
            }
            None => {
                loader.set_fallback(constructor);
            }
        }
        Ok(loader)
    }
}

/// Parse YAML, resolving environment placeholders
pub fn parse_config(options: &ParseOptions) -> Result<Value> {
    let (text, source) = match (&options.path, &options.data) {
        (Some(_), Some(_)) => return Err(Error::usage("Both a path and data were given as input")),
        (None, None) => {
            return Err(Error::usage(
                "Either a path or data should be defined as input",
            ))
        }
        (Some(path), None) => (
            read_file(path, &options.encoding)?,
            Some(path.display().to_string()),
        ),
        (None, Some(data)) => (data.clone(), None),
    };

    log::debug!(
        "Parsing {} (tag: {}, implicit: {}, loader: {:?})",
        source.as_deref().unwrap_or("YAML data"),
        options.tag.as_deref().unwrap_or("<all scalars>"),
        options.implicit,
        options.loader
    );

    let mut loader = options.build_loader()?;
    if let Some(source) = source {
        loader = loader.with_source_name(source);
    }
    loader.load_str(&text)
}

/// Parse YAML into a caller-declared type
///
/// Under [`LoaderKind::Unsafe`], tagged nodes such as `!Point {x: 1}` map
/// onto enum variants of the same name.
pub fn parse_config_as<T: DeserializeOwned>(options: &ParseOptions) -> Result<T> {
    parse_config(options)?.deserialize_into()
}

fn read_file(path: &Path, encoding: &str) -> Result<String> {
    let bytes =
        std::fs::read(path).map_err(|e| Error::io(path.display().to_string(), e.to_string()))?;
    decode(&bytes, encoding).map_err(|e| {
        e.with_source_location(SourceLocation {
            file: path.display().to_string(),
            line: None,
            column: None,
        })
    })
}

/// Decode file contents with a named encoding
fn decode(bytes: &[u8], encoding: &str) -> Result<String> {
    let label = encoding.trim().to_ascii_lowercase().replace('_', "-");
    match label.as_str() {
        "utf-8" | "utf8" | "utf-8-sig" | "utf8-sig" => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            String::from_utf8(bytes.to_vec()).map_err(|e| Error::encoding(encoding, e.to_string()))
        }
        "utf-16" | "utf16" => match bytes {
            [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes, encoding),
            [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes, encoding),
            _ => decode_utf16(bytes, u16::from_le_bytes, encoding),
        },
        "utf-16le" | "utf-16-le" => decode_utf16(bytes, u16::from_le_bytes, encoding),
        "utf-16be" | "utf-16-be" => decode_utf16(bytes, u16::from_be_bytes, encoding),
        "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => {
            Ok(bytes.iter().map(|&b| b as char).collect())
        }
        "ascii" | "us-ascii" => match bytes.iter().position(|b| !b.is_ascii()) {
            Some(pos) => Err(Error::encoding(
                encoding,
                format!("Byte 0x{:02x} at offset {} is not ASCII", bytes[pos], pos),
            )),
            None => Ok(bytes.iter().map(|&b| b as char).collect()),
        },
        _ => Err(Error::encoding(
            encoding,
            format!("Unsupported encoding '{}'", encoding),
        )),
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16, encoding: &str) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::encoding(encoding, "Input has an odd number of bytes"));
    }
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| Error::encoding(encoding, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    fn mapping(pairs: Vec<(&str, Value)>) -> Value {
        Value::Mapping(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "yamlenv_parse_{}_{}",
            std::process::id(),
            name
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let options = ParseOptions::default();
        assert_eq!(options.tag.as_deref(), Some("!ENV"));
        assert_eq!(options.separator.as_deref(), Some(":"));
        assert_eq!(options.default_value, "N/A");
        assert!(!options.implicit);
        assert!(!options.raise_if_missing);
        assert_eq!(options.loader, LoaderKind::Safe);
        assert_eq!(options.encoding, "utf-8");
    }

    #[test]
    fn test_neither_path_nor_data() {
        let err = parse_config(&ParseOptions::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Usage);
    }

    #[test]
    fn test_both_path_and_data() {
        let mut options = ParseOptions::from_data("a: 1");
        options.path = Some(PathBuf::from("/nonexistent/yamlenv/config.yaml"));

        // Usage is checked before the file is touched
        let err = parse_config(&options).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Usage);
    }

    #[test]
    fn test_inline_default_then_environment() {
        std::env::remove_var("YAMLENV_PARSE_FOO");
        let options = ParseOptions::from_data("key: !ENV ${YAMLENV_PARSE_FOO:bar}");
        assert_eq!(
            parse_config(&options).unwrap(),
            mapping(vec![("key", Value::from("bar"))])
        );

        std::env::set_var("YAMLENV_PARSE_FOO", "baz");
        assert_eq!(
            parse_config(&options).unwrap(),
            mapping(vec![("key", Value::from("baz"))])
        );
        std::env::remove_var("YAMLENV_PARSE_FOO");
    }

    #[test]
    fn test_multiple_placeholders_in_one_scalar() {
        std::env::set_var("YAMLENV_PARSE_A", "x");
        let options =
            ParseOptions::from_data("path: !ENV ${YAMLENV_PARSE_A}/mid/${YAMLENV_PARSE_B}");

        let value = parse_config(&options).unwrap();
        assert_eq!(value.get_path("path").unwrap(), &Value::from("x/mid/N/A"));
        std::env::remove_var("YAMLENV_PARSE_A");
    }

    #[test]
    fn test_custom_default_value() {
        let options = ParseOptions::from_data("a: !ENV ${YAMLENV_PARSE_UNSET_DEFAULT}")
            .with_default_value("");

        let value = parse_config(&options).unwrap();
        assert_eq!(value.get_path("a").unwrap(), &Value::from(""));
    }

    #[test]
    fn test_raise_if_missing_produces_no_document() {
        let options = ParseOptions::from_data(
            "a: !ENV ${YAMLENV_PARSE_PRESENT_DEFAULT:ok}\nb: !ENV ${YAMLENV_PARSE_ABSENT}\n",
        )
        .with_raise_if_missing(true);

        let err = parse_config(&options).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::MissingVariable {
                var_name: "YAMLENV_PARSE_ABSENT".into()
            }
        );
        assert_eq!(err.path.as_deref(), Some("b"));
    }

    #[test]
    fn test_other_tag_without_handler_fails() {
        let options = ParseOptions::from_data(
            "a: !ENV ${YAMLENV_PARSE_X:1}\nb: !OTHER ${YAMLENV_PARSE_X:1}\n",
        );

        let err = parse_config(&options).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::UnknownTag {
                tag: "!OTHER".into()
            }
        );
    }

    #[test]
    fn test_custom_tag() {
        let options = ParseOptions::from_data("a: !TEST ${YAMLENV_PARSE_CUSTOM_TAG:v}\n")
            .with_tag(Some("!TEST"));

        let value = parse_config(&options).unwrap();
        assert_eq!(value.get_path("a").unwrap(), &Value::from("v"));
    }

    #[test]
    fn test_global_mode() {
        std::env::set_var("YAMLENV_PARSE_GLOBAL", "v");
        let options = ParseOptions::from_data(
            "nested:\n  deep:\n    - ${YAMLENV_PARSE_GLOBAL}\n  tagged: !TEST2 test1${YAMLENV_PARSE_GLOBAL}\n",
        )
        .with_tag(None::<String>);

        let value = parse_config(&options).unwrap();
        assert_eq!(
            value.get_path("nested.deep[0]").unwrap(),
            &Value::from("v")
        );
        assert_eq!(
            value.get_path("nested.tagged").unwrap(),
            &Value::from("test1v")
        );
        std::env::remove_var("YAMLENV_PARSE_GLOBAL");
    }

    #[test]
    fn test_core_float_tag_after_substitution() {
        std::env::remove_var("YAMLENV_PARSE_PORT");
        let options = ParseOptions::from_data(
            "value: !!float ${YAMLENV_PARSE_PORT:27017}\nverbatim: !<tag:yaml.org,2002:float> ${YAMLENV_PARSE_PORT:1}\n",
        )
        .with_tag(None::<String>);

        let value = parse_config(&options).unwrap();
        assert_eq!(value.get_path("value").unwrap(), &Value::Float(27017.0));
        assert_eq!(value.get_path("verbatim").unwrap(), &Value::Float(1.0));
    }

    #[test]
    fn test_type_tag_in_scalar_text() {
        std::env::remove_var("YAMLENV_PARSE_TYPED_PORT");
        let options = ParseOptions::from_data(
            "value: !TAG tag:yaml.org,2002:float ${YAMLENV_PARSE_TYPED_PORT:27017}\n",
        )
        .with_tag(Some("!TAG"));

        assert_eq!(
            parse_config(&options).unwrap(),
            mapping(vec![("value", Value::Float(27017.0))])
        );

        let options = ParseOptions::from_data(
            "port: !ENV tag:yaml.org,2002:int ${YAMLENV_PARSE_TYPED_PORT:5432}\n\
             debug: !ENV tag:yaml.org,2002:bool ${YAMLENV_PARSE_TYPED_DEBUG:true}\n",
        )
        .with_loader(LoaderKind::Unsafe);

        assert_eq!(
            parse_config(&options).unwrap(),
            mapping(vec![
                ("port", Value::Integer(5432)),
                ("debug", Value::Bool(true)),
            ])
        );
    }

    #[test]
    fn test_type_tag_sees_environment_value() {
        std::env::set_var("YAMLENV_PARSE_TYPED_RATIO", "0.25");
        let options = ParseOptions::from_data(
            "ratio: !ENV tag:yaml.org,2002:float ${YAMLENV_PARSE_TYPED_RATIO:1}\n",
        );

        let value = parse_config(&options).unwrap();
        assert_eq!(value.get_path("ratio").unwrap(), &Value::Float(0.25));
        std::env::remove_var("YAMLENV_PARSE_TYPED_RATIO");
    }

    #[test]
    fn test_tokens_spliced_by_position() {
        std::env::set_var("YAMLENV_PARSE_RA", "${YAMLENV_PARSE_RB}");
        std::env::set_var("YAMLENV_PARSE_RB", "b");
        let options = ParseOptions::from_data(
            "joined: !ENV ${YAMLENV_PARSE_RA}${YAMLENV_PARSE_RB}\n\
             repeated: !ENV ${YAMLENV_PARSE_RB}-${YAMLENV_PARSE_RB}\n",
        );

        let value = parse_config(&options).unwrap();
        // Substituted text is not scanned again
        assert_eq!(
            value.get_path("joined").unwrap(),
            &Value::from("${YAMLENV_PARSE_RB}b")
        );
        assert_eq!(value.get_path("repeated").unwrap(), &Value::from("b-b"));

        std::env::remove_var("YAMLENV_PARSE_RA");
        std::env::remove_var("YAMLENV_PARSE_RB");
    }

    #[test]
    fn test_implicit_detection() {
        let options = ParseOptions::from_data("a: ${YAMLENV_PARSE_IMPLICIT:found}\n")
            .with_implicit(true);

        let value = parse_config(&options).unwrap();
        assert_eq!(value.get_path("a").unwrap(), &Value::from("found"));
    }

    #[test]
    fn test_no_separator() {
        let options = ParseOptions::from_data("a: !ENV ${YAMLENV_PARSE_NOSEP:default1}\n")
            .with_separator(None::<String>);

        let value = parse_config(&options).unwrap();
        assert_eq!(value.get_path("a").unwrap(), &Value::from("N/A"));
    }

    #[test]
    fn test_unescaped_separator_is_a_pattern_error() {
        let options = ParseOptions::from_data("a: 1").with_separator(Some("*"));
        let err = parse_config(&options).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Pattern);
    }

    #[test]
    fn test_parse_file() {
        std::env::set_var("YAMLENV_PARSE_FILE_HOST", "db.internal");
        let path = temp_file(
            "file.yaml",
            b"database:\n  host: !ENV ${YAMLENV_PARSE_FILE_HOST}\n  port: 5432\n",
        );

        let value = parse_config(&ParseOptions::from_path(&path)).unwrap();
        assert_eq!(
            value.get_path("database.host").unwrap(),
            &Value::from("db.internal")
        );
        assert_eq!(value.get_path("database.port").unwrap(), &Value::Integer(5432));

        std::fs::remove_file(&path).ok();
        std::env::remove_var("YAMLENV_PARSE_FILE_HOST");
    }

    #[test]
    fn test_missing_file() {
        let err = parse_config(&ParseOptions::from_path("/nonexistent/yamlenv/config.yaml"))
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Io);
        assert!(err.to_string().contains("/nonexistent/yamlenv/config.yaml"));
    }

    #[test]
    fn test_file_error_names_the_file() {
        let path = temp_file("unknown_tag.yaml", b"a: !NOPE 1\n");

        let err = parse_config(&ParseOptions::from_path(&path)).unwrap_err();
        let location = err.source_location.clone().unwrap();
        assert_eq!(location.file, path.display().to_string());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_utf16_file() {
        let text = "name: !ENV ${YAMLENV_PARSE_UTF16:caf\u{e9}}\n";
        let mut bytes = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let path = temp_file("utf16.yaml", &bytes);

        let value = parse_config(&ParseOptions::from_path(&path).with_encoding("utf-16")).unwrap();
        assert_eq!(value.get_path("name").unwrap(), &Value::from("caf\u{e9}"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_decode_labels() {
        assert_eq!(decode(b"\xEF\xBB\xBFa: 1", "utf-8-sig").unwrap(), "a: 1");
        assert_eq!(decode(b"caf\xE9", "latin-1").unwrap(), "caf\u{e9}");
        assert_eq!(decode(b"\x00a", "UTF_16BE").unwrap(), "a");
        assert!(decode(b"caf\xE9", "utf-8").is_err());
        assert!(decode(b"caf\xE9", "ascii").is_err());
        assert!(decode(b"abc", "utf-16le").is_err());

        let err = decode(b"a", "ebcdic").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Encoding);
    }

    #[test]
    fn test_parse_config_as_struct() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Server {
            host: String,
            port: u16,
        }

        let options = ParseOptions::from_data(
            "host: !ENV ${YAMLENV_PARSE_AS_HOST:localhost}\nport: 8080\n",
        );
        let server: Server = parse_config_as(&options).unwrap();

        assert_eq!(
            server,
            Server {
                host: "localhost".into(),
                port: 8080
            }
        );
    }

    #[test]
    fn test_unsafe_loader_builds_enums() {
        #[derive(Debug, Deserialize, PartialEq)]
        enum Shape {
            Circle { radius: f64 },
            Square(f64),
        }

        #[derive(Debug, Deserialize, PartialEq)]
        struct Drawing {
            shapes: Vec<Shape>,
        }

        let yaml = "shapes:\n  - !Circle {radius: 1.5}\n  - !Square 2.0\n";
        let safe = parse_config_as::<Drawing>(&ParseOptions::from_data(yaml));
        assert!(safe.is_err());

        let drawing: Drawing =
            parse_config_as(&ParseOptions::from_data(yaml).with_loader(LoaderKind::Unsafe))
                .unwrap();
        assert_eq!(
            drawing.shapes,
            vec![Shape::Circle { radius: 1.5 }, Shape::Square(2.0)]
        );
    }
}
