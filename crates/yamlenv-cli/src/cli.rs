//! yamlenv CLI - resolve environment placeholders in YAML files
//!
//! Usage:
//!   yamlenv dump config.yaml --format json
//!   yamlenv get config.yaml database.host --default localhost
//!   yamlenv check config.yaml other.yaml --raise-if-missing

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use yamlenv_core::{parse_config, Config, Error, LoaderKind, ParseOptions, Value};

/// yamlenv - Environment variable placeholders for YAML
#[derive(Parser, Debug)]
#[command(name = "yamlenv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the resolved document
    Dump {
        /// YAML file to resolve
        file: PathBuf,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,

        #[command(flatten)]
        parse: ParseArgs,
    },

    /// Get a specific value from the resolved document
    Get {
        /// YAML file to resolve
        file: PathBuf,

        /// Path to the value (e.g., database.host)
        path: String,

        /// Output format: text, json, yaml
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Default value if key not found
        #[arg(short, long)]
        default: Option<String>,

        #[command(flatten)]
        parse: ParseArgs,
    },

    /// Check that files load and every placeholder resolves
    Check {
        /// YAML file(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        parse: ParseArgs,
    },
}

/// Flags shared by every command, mapped onto [`ParseOptions`]
#[derive(Args, Debug, Clone, Default)]
struct ParseArgs {
    /// Tag marking scalars for substitution [default: !ENV]
    #[arg(long)]
    tag: Option<String>,

    /// Substitute placeholders in every scalar, tagged or not
    #[arg(long, conflicts_with = "tag")]
    no_tag: bool,

    /// Also substitute untagged plain scalars that contain placeholders
    #[arg(long)]
    implicit: bool,

    /// Separator between variable name and inline default [default: :]
    #[arg(long)]
    separator: Option<String>,

    /// Disable inline defaults
    #[arg(long, conflicts_with = "separator")]
    no_separator: bool,

    /// Value for unset variables without an inline default [default: N/A]
    #[arg(long)]
    default_value: Option<String>,

    /// Fail on unset variables without an inline default
    #[arg(long)]
    raise_if_missing: bool,

    /// Keep unknown tags instead of rejecting them
    #[arg(long = "unsafe")]
    unsafe_loader: bool,

    /// File encoding [default: utf-8]
    #[arg(long)]
    encoding: Option<String>,
}

impl ParseArgs {
    fn options(&self, file: &Path) -> ParseOptions {
        let mut options = ParseOptions::from_path(file)
            .with_implicit(self.implicit)
            .with_raise_if_missing(self.raise_if_missing);

        if self.no_tag {
            options.tag = None;
        } else if let Some(tag) = &self.tag {
            options.tag = Some(tag.clone());
        }
        if self.no_separator {
            options.separator = None;
        } else if let Some(separator) = &self.separator {
            options.separator = Some(separator.clone());
        }
        if let Some(default_value) = &self.default_value {
            options.default_value = default_value.clone();
        }
        if self.unsafe_loader {
            options.loader = LoaderKind::Unsafe;
        }
        if let Some(encoding) = &self.encoding {
            options.encoding = encoding.clone();
        }
        options
    }
}

/// Run the CLI with the process arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Dump {
            file,
            format,
            parse,
        } => cmd_dump(&file, &format, &parse),

        Commands::Get {
            file,
            path,
            format,
            default,
            parse,
        } => cmd_get(&file, &path, &format, default, &parse),

        Commands::Check { files, parse } => cmd_check(&files, &parse),
    }
}

/// Missing variables are resolution failures (1), everything else a load failure (2)
fn load_exit_status(err: &Error) -> u8 {
    if err.is_missing_variable() {
        1
    } else {
        2
    }
}

fn load_config(file: &Path, parse: &ParseArgs) -> Result<Config, Error> {
    Config::load(&parse.options(file))
}

/// Render a document as `yaml` or `json`
fn render(config: &Config, format: &str) -> Result<String, Error> {
    match format {
        "json" => config.to_json().map(|s| s + "\n"),
        "yaml" | "yml" => config.to_yaml(),
        _ => Err(Error::usage(format!(
            "Unsupported format: {}. Use yaml or json.",
            format
        ))),
    }
}

fn cmd_dump(file: &Path, format: &str, parse: &ParseArgs) -> ExitCode {
    let config = match load_config(file, parse) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {}: {}", "Failed to load".red(), file.display(), e);
            return ExitCode::from(load_exit_status(&e));
        }
    };

    match render(&config, format) {
        Ok(content) => {
            print!("{}", content);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn cmd_get(
    file: &Path,
    path: &str,
    format: &str,
    default: Option<String>,
    parse: &ParseArgs,
) -> ExitCode {
    let config = match load_config(file, parse) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {}: {}", "Failed to load".red(), file.display(), e);
            return ExitCode::from(load_exit_status(&e));
        }
    };

    let value = match config.get(path) {
        Ok(value) => value,
        Err(_) => {
            return if let Some(default_val) = default {
                println!("{}", default_val);
                ExitCode::SUCCESS
            } else {
                eprintln!("{}: Path '{}' not found", "Error".red(), path);
                ExitCode::from(1)
            };
        }
    };

    let rendered = match (format, value) {
        ("json" | "yaml", _) => render(&Config::new(value.clone()), format),
        (_, Value::String(s)) => Ok(format!("{}\n", s)),
        (_, Value::Integer(i)) => Ok(format!("{}\n", i)),
        (_, Value::Float(f)) => Ok(format!("{}\n", f)),
        (_, Value::Bool(b)) => Ok(format!("{}\n", b)),
        (_, Value::Null) => Ok("null\n".to_string()),
        // Complex values are printed as YAML
        _ => render(&Config::new(value.clone()), "yaml"),
    };

    match rendered {
        Ok(content) => {
            print!("{}", content);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn cmd_check(files: &[PathBuf], parse: &ParseArgs) -> ExitCode {
    let mut all_valid = true;

    for file in files {
        match parse_config(&parse.options(file)) {
            Ok(_) => {
                println!("{} {}: valid", "✓".green(), file.display());
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                all_valid = false;
            }
        }
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
