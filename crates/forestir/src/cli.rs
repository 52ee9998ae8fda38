//! Configuration for the `forestir-dump` command.
//!
//! `forestir-dump <config-file> [key=value ...]`
//!
//! The config file holds `key = value` lines; `#` starts a comment. Command
//! line pairs override the file. Unknown keys are ignored.

use std::collections::HashMap;
use std::path::PathBuf;

/// Help text printed for `--help` and on usage errors.
pub const USAGE: &str = "\
forestir-dump <config-file> [key=value ...]

  format=<name>     loader to use (native_json, xgboost_json, lightgbm)
  model_in=<path>   model file to load";

/// Invalid command line or config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("expected a config file argument")]
    MissingConfigFile,
    #[error("help requested")]
    HelpRequested,
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{origin}: expected key=value, got {text:?}")]
    Syntax { origin: String, text: String },
    #[error("missing required key: {0}")]
    MissingKey(&'static str),
}

/// Resolved settings of one `forestir-dump` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Registry name of the loader.
    pub format: String,
    pub model_in: PathBuf,
}

impl CliConfig {
    /// Parse arguments (without the program name), reading the config file
    /// they name.
    pub fn from_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let path = match args.next() {
            Some(arg) if arg == "--help" || arg == "-h" => return Err(ConfigError::HelpRequested),
            Some(arg) => arg,
            None => return Err(ConfigError::MissingConfigFile),
        };
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let overrides: Vec<String> = args.collect();
        Self::from_parts(&path, &text, &overrides)
    }

    /// Resolve settings from config file contents plus `key=value` overrides.
    pub fn from_parts(origin: &str, text: &str, overrides: &[String]) -> Result<Self, ConfigError> {
        let mut settings = HashMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = strip_comment(line).trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = split_pair(line).ok_or_else(|| ConfigError::Syntax {
                origin: format!("{origin}:{}", lineno + 1),
                text: line.to_string(),
            })?;
            settings.insert(key, value);
        }
        for arg in overrides {
            let (key, value) = split_pair(arg).ok_or_else(|| ConfigError::Syntax {
                origin: "command line".to_string(),
                text: arg.clone(),
            })?;
            settings.insert(key, value);
        }

        let format = settings
            .remove("format")
            .ok_or(ConfigError::MissingKey("format"))?;
        let model_in = settings
            .remove("model_in")
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingKey("model_in"))?;
        Ok(CliConfig { format, model_in })
    }
}

/// Drop a `#` comment that starts the line or follows whitespace.
fn strip_comment(line: &str) -> &str {
    let mut prev_space = true;
    for (idx, ch) in line.char_indices() {
        if ch == '#' && prev_space {
            return &line[..idx];
        }
        prev_space = ch.is_whitespace();
    }
    line
}

fn split_pair(s: &str) -> Option<(String, String)> {
    let (key, value) = s.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}
