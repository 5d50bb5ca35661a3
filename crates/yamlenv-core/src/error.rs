//! Error types for yamlenv
//!
//! Errors are structured: a kind, the config path or file they relate to,
//! and an actionable help message where one exists.

use std::fmt;

/// Result type alias for yamlenv operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for yamlenv operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Path in the config where the error occurred (e.g., "database.port")
    pub path: Option<String>,
    /// Source location (file, line) if available
    pub source_location: Option<SourceLocation>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Location in a source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The entry point was called with neither or both of path and data
    Usage,
    /// I/O error (file not found, unreadable, etc.)
    Io,
    /// Input bytes could not be decoded with the requested encoding
    Encoding,
    /// The placeholder pattern could not be compiled from the separator
    Pattern,
    /// A placeholder had no environment value and no inline default
    MissingVariable { var_name: String },
    /// Malformed YAML
    Parse,
    /// A tag in the document has no registered handler
    UnknownTag { tag: String },
    /// A node could not be constructed for its tag
    Construct,
    /// Error accessing a path that doesn't exist
    PathNotFound,
    /// Type coercion failed
    TypeCoercion,
    /// Internal error (bug in yamlenv)
    Internal,
}

impl Error {
    fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: None,
            source_location: None,
            help: None,
            cause: None,
        }
    }

    /// Create a usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            help: Some("Provide exactly one of a file path or YAML data".into()),
            ..Self::from_kind(ErrorKind::Usage)
        }
    }

    /// Create an I/O error for a file
    pub fn io(file: impl Into<String>, message: impl Into<String>) -> Self {
        let file = file.into();
        Self {
            source_location: Some(SourceLocation {
                file,
                line: None,
                column: None,
            }),
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Io)
        }
    }

    /// Create an encoding error
    pub fn encoding(encoding: impl Into<String>, message: impl Into<String>) -> Self {
        let encoding = encoding.into();
        Self {
            cause: Some(message.into()),
            help: Some(format!(
                "Check that the file is really encoded as '{}'",
                encoding
            )),
            ..Self::from_kind(ErrorKind::Encoding)
        }
    }

    /// Create a pattern compilation error
    pub fn pattern(separator: &str, message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            help: Some(format!(
                "Escape regex metacharacters in the separator '{}' (e.g. '\\*' instead of '*')",
                separator
            )),
            ..Self::from_kind(ErrorKind::Pattern)
        }
    }

    /// Create a missing variable error
    pub fn missing_variable(var_name: impl Into<String>) -> Self {
        let var = var_name.into();
        Self {
            help: Some(format!(
                "Set the {} environment variable or provide an inline default: ${{{}:value}}",
                var, var
            )),
            ..Self::from_kind(ErrorKind::MissingVariable { var_name: var })
        }
    }

    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Parse)
        }
    }

    /// Create an unknown tag error
    pub fn unknown_tag(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        Self {
            help: Some(format!(
                "Register a constructor for '{}' or load with the unsafe loader",
                tag
            )),
            ..Self::from_kind(ErrorKind::UnknownTag { tag })
        }
    }

    /// Create a construction error
    pub fn construct(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Construct)
        }
    }

    /// Create a path not found error
    pub fn path_not_found(path: impl Into<String>) -> Self {
        let path_str = path.into();
        Self {
            path: Some(path_str.clone()),
            help: Some(format!(
                "Check that '{}' exists in the configuration",
                path_str
            )),
            ..Self::from_kind(ErrorKind::PathNotFound)
        }
    }

    /// Create a type coercion error
    pub fn type_coercion(
        path: impl Into<String>,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> Self {
        Self {
            path: Some(path.into()),
            help: Some(format!(
                "Ensure the value can be converted to {}",
                expected.into()
            )),
            cause: Some(format!("Got: {}", got.into())),
            ..Self::from_kind(ErrorKind::TypeCoercion)
        }
    }

    /// Create an internal error (bug in yamlenv)
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            help: Some("This is likely a bug in yamlenv. Please report it.".into()),
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Internal)
        }
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add source location to the error
    pub fn with_source_location(mut self, loc: SourceLocation) -> Self {
        self.source_location = Some(loc);
        self
    }

    /// Add a line/column position, keeping the file name if one is known
    pub fn at(mut self, line: usize, column: usize) -> Self {
        let file = self
            .source_location
            .take()
            .map(|loc| loc.file)
            .unwrap_or_else(|| "<data>".to_string());
        self.source_location = Some(SourceLocation {
            file,
            line: Some(line),
            column: Some(column),
        });
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Whether this error reports a missing environment variable
    pub fn is_missing_variable(&self) -> bool {
        matches!(self.kind, ErrorKind::MissingVariable { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Main error message
        match &self.kind {
            ErrorKind::Usage => write!(f, "Usage error")?,
            ErrorKind::Io => write!(f, "I/O error")?,
            ErrorKind::Encoding => write!(f, "Encoding error")?,
            ErrorKind::Pattern => write!(f, "Invalid placeholder pattern")?,
            ErrorKind::MissingVariable { var_name } => {
                write!(f, "Missing required environment variable: {}", var_name)?
            }
            ErrorKind::Parse => write!(f, "Parse error")?,
            ErrorKind::UnknownTag { tag } => {
                write!(f, "Could not determine a constructor for the tag '{}'", tag)?
            }
            ErrorKind::Construct => write!(f, "Construction error")?,
            ErrorKind::PathNotFound => write!(f, "Path not found")?,
            ErrorKind::TypeCoercion => write!(f, "Type coercion failed")?,
            ErrorKind::Internal => write!(f, "Internal error")?,
        }

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(loc) = &self.source_location {
            write!(f, "\n  File: {}", loc.file)?;
            if let Some(line) = loc.line {
                write!(f, ":{}", line)?;
                if let Some(column) = loc.column {
                    write!(f, ":{}", column)?;
                }
            }
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
