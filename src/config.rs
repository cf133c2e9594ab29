//! YAML configuration (`cdoc.yml`).

use crate::error::ConfigError;
use crate::parser::ParserChoice;
use crate::render::SignatureStyle;
use crate::site::nav::NavItem;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Test catalog mode of a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestMode {
    /// Plain API documentation.
    #[default]
    #[serde(rename = "")]
    Off,
    /// IGT-style test sources with `TEST:`/`SUBTEST:` metadata.
    Igt,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub site_name: String,
    pub docs_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub use_directory_urls: bool,
    /// Root of the implicit collection when `sources` is empty, and the
    /// last resort for directive `:file:` paths.
    pub source_root: String,
    #[serde(alias = "clang_args")]
    pub parser_args: Vec<String>,
    pub parser: ParserChoice,
    pub fallback_parser: bool,
    pub sources: Vec<SourceSpec>,

    pub heading_level: usize,
    pub members: bool,
    pub signature_style: SignatureStyle,
    pub convert_rst: bool,
    pub convert_gtkdoc: bool,
    pub auto_xref: bool,
    pub language: String,
    pub show_source_link: bool,
    pub source_uri: String,

    pub autodoc: bool,
    pub autodoc_output_dir: String,
    pub autodoc_nav_title: String,
    pub autodoc_extensions: Vec<String>,
    pub autodoc_exclude: Vec<String>,
    pub autodoc_index: bool,
    pub autodoc_pages: Vec<NavItem>,
    pub project_name: String,
    pub version_file: String,

    pub test_mode: TestMode,
    pub test_group_by: Vec<String>,
    pub test_fields: Vec<String>,
    pub extract_test_steps: bool,
    pub appendix_code_usages: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_name: String::new(),
            docs_dir: None,
            output_dir: PathBuf::from("site"),
            use_directory_urls: true,
            source_root: ".".to_string(),
            parser_args: Vec::new(),
            parser: ParserChoice::Auto,
            fallback_parser: true,
            sources: Vec::new(),
            heading_level: 2,
            members: true,
            signature_style: SignatureStyle::Code,
            convert_rst: true,
            convert_gtkdoc: false,
            auto_xref: true,
            language: "c".to_string(),
            show_source_link: false,
            source_uri: String::new(),
            autodoc: true,
            autodoc_output_dir: "api_reference".to_string(),
            autodoc_nav_title: "API Reference".to_string(),
            autodoc_extensions: vec![".c".to_string(), ".h".to_string()],
            autodoc_exclude: Vec::new(),
            autodoc_index: true,
            autodoc_pages: Vec::new(),
            project_name: String::new(),
            version_file: String::new(),
            test_mode: TestMode::Off,
            test_group_by: Vec::new(),
            test_fields: Vec::new(),
            extract_test_steps: false,
            appendix_code_usages: false,
        }
    }
}

/// One `sources` entry: a bare root path or a table of overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SourceSpec {
    Root(String),
    Table(SourceTable),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceTable {
    pub root: String,
    pub nav_title: Option<String>,
    pub output_dir: Option<String>,
    pub extensions: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    /// Appended to the global `parser_args`.
    #[serde(alias = "clang_args")]
    pub parser_args: Option<Vec<String>>,
    pub index: Option<bool>,
    pub pages: Option<Vec<NavItem>>,
    pub test_mode: Option<TestMode>,
    pub test_group_by: Option<Vec<String>>,
    pub test_fields: Option<Vec<String>>,
    pub extract_test_steps: Option<bool>,
    /// Presence switches the collection to [`TestMode::Igt`].
    pub igt: Option<IgtOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IgtOptions {
    pub group_by: Option<Vec<String>>,
    pub fields: Option<Vec<String>>,
    pub extract_steps: Option<bool>,
}

impl Config {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text, path)
    }

    /// Parse config text; `path` is only used in error messages.
    pub fn from_yaml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        // An empty file is a valid all-defaults config.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=6).contains(&self.heading_level) {
            return Err(ConfigError::Invalid(format!(
                "heading_level must be between 1 and 6, got {}",
                self.heading_level
            )));
        }
        for (i, source) in self.sources.iter().enumerate() {
            if let SourceSpec::Table(table) = source {
                if table.root.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!("sources[{i}] has an empty root")));
                }
            }
        }
        Ok(())
    }

    /// Project title for the top index.
    pub fn project_title(&self) -> &str {
        [&self.project_name, &self.site_name, &self.autodoc_nav_title]
            .into_iter()
            .find(|s| !s.is_empty())
            .map_or("", |s| s.as_str())
    }
}
