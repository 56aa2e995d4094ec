//! Settings file (`scriptgen.json`) and its defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "scriptgen.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Extension of script files, without the dot.
    pub script_extension: String,
    /// Replaces the script's extension to name the generated file.
    pub output_extension: String,
    /// Files with these extensions are the documents of a project.
    pub document_extensions: Vec<String>,
    /// A directory holding one of these files is a project root.
    pub project_markers: Vec<String>,
    /// Per-script deadline; `null` runs scripts without one.
    pub timeout_ms: Option<u64>,
    /// Warning codes promoted to errors; `"*"` promotes every warning.
    pub warnings_as_errors: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            script_extension: "sgx".into(),
            output_extension: ".g.rs".into(),
            document_extensions: vec!["rs".into()],
            project_markers: vec!["Cargo.toml".into()],
            timeout_ms: Some(30_000),
            warnings_as_errors: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Loads `path` when given, else `scriptgen.json` from the working
    /// directory when it exists, else the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Path::new(DEFAULT_CONFIG_FILE),
            None => return Ok(Self::default()),
        };
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Reading {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Parsing {}", path.display()))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn is_warning_as_error(&self, code: &str) -> bool {
        self.warnings_as_errors
            .iter()
            .any(|c| c == "*" || c == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_json(r#"{ "output_extension": ".g.cs", "timeout_ms": null }"#).unwrap();
        assert_eq!(config.output_extension, ".g.cs");
        assert_eq!(config.timeout(), None);
        assert_eq!(config.script_extension, "sgx");
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = Config::from_json(r#"{ "extension": ".g.cs" }"#).unwrap_err();
        assert!(err.to_string().contains("unknown field"), "{err}");
    }

    #[test]
    fn test_warning_promotion() {
        let config = Config {
            warnings_as_errors: vec!["SG0168".into()],
            ..Config::default()
        };
        assert!(config.is_warning_as_error("SG0168"));
        assert!(!config.is_warning_as_error("SG0162"));

        let all = Config {
            warnings_as_errors: vec!["*".into()],
            ..Config::default()
        };
        assert!(all.is_warning_as_error("SG0162"));
    }
}
