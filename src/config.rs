//! Configuration loading
//!
//! `defaults/starmark.default.toml` is embedded in the crate so the documented defaults and
//! the runtime behavior cannot drift apart. User files and command-line overrides are
//! layered on top through [`Loader`] before deserializing into [`Settings`].

use crate::citations::record::KeyMatch;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_TOML: &str = include_str!("../defaults/starmark.default.toml");

/// Top-level settings of a compilation run
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub hypertext: HypertextSettings,
    pub typesetting: TypesettingSettings,
    pub compile: CompileSettings,
    pub citations: CitationSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HypertextSettings {
    /// File extension of generated pages
    pub extension: String,
    pub index_page: String,
    pub bibliography_page: String,
    /// Prefix of formula image URLs
    pub formula_url: String,
    pub stylesheet: Option<String>,
}

impl HypertextSettings {
    pub fn page_file(&self, page: &str) -> String {
        format!("{page}.{}", self.extension)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypesettingSettings {
    pub document_class: String,
    pub class_options: String,
    pub packages: Vec<String>,
    pub bibliography_style: String,
    pub default_figure_width: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompileSettings {
    pub max_include_depth: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CitationSettings {
    /// How `*cite*` keys are matched against bibliography headers
    pub key_match: KeyMatch,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is not set
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    Compact,
    Json,
}

/// Layers user overrides over the built-in defaults
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files are an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer a configuration file that may be absent
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override, such as a command-line flag
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<Settings, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

pub fn load_defaults() -> Result<Settings, ConfigError> {
    Loader::new().build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loads_default_settings() {
        let settings = load_defaults().expect("defaults to deserialize");
        assert_eq!(settings.hypertext.extension, "html");
        assert_eq!(settings.hypertext.stylesheet, None);
        assert_eq!(settings.typesetting.bibliography_style, "plainnat");
        assert!(settings.typesetting.packages.contains(&"natbib".to_string()));
        assert_eq!(settings.compile.max_include_depth, 32);
        assert_eq!(settings.citations.key_match, KeyMatch::Prefix);
        assert_eq!(settings.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_supports_overrides() {
        let settings = Loader::new()
            .set_override("compile.max_include_depth", 4_i64)
            .unwrap()
            .set_override("logging.format", "json")
            .unwrap()
            .set_override("citations.key_match", "exact")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(settings.compile.max_include_depth, 4);
        assert_eq!(settings.citations.key_match, KeyMatch::Exact);
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_user_file_is_layered() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[hypertext]\nstylesheet = \"site.css\"").unwrap();
        let settings = Loader::new().with_file(file.path()).build().unwrap();
        assert_eq!(settings.hypertext.stylesheet.as_deref(), Some("site.css"));
        assert_eq!(settings.hypertext.index_page, "index");
    }

    #[test]
    fn test_missing_required_file_fails() {
        let result = Loader::new().with_file("/nonexistent/starmark.toml").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_page_file_name() {
        let settings = load_defaults().unwrap();
        assert_eq!(settings.hypertext.page_file("intro"), "intro.html");
    }
}
