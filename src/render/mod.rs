//! Symbol documentation rendering.
//!
//! [`markdown`] turns entities into page fragments; [`html`] holds the raw
//! HTML pieces (example cards, step lists, page styles) those fragments
//! embed.

pub mod html;
pub mod markdown;

pub use markdown::{render_autodoc, render_doc, render_docs, render_single};

use serde::Deserialize;

/// How a symbol's signature is shown under its heading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureStyle {
    /// Fenced code block in the configured language.
    #[default]
    Code,
    /// Inline code paragraph.
    Plain,
}

/// Options for rendering one batch of entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    pub heading_level: usize,
    pub show_source_link: bool,
    /// Link template; `{filename}` and `{line}` are substituted.
    pub source_uri: String,
    pub members: bool,
    pub signature_style: SignatureStyle,
    pub convert_rst: bool,
    /// Fence language of signatures.
    pub language: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            heading_level: 3,
            show_source_link: false,
            source_uri: String::new(),
            members: true,
            signature_style: SignatureStyle::Code,
            convert_rst: true,
            language: "c".to_string(),
        }
    }
}

impl RenderConfig {
    /// Same options one heading level deeper, used for members.
    pub fn nested(&self) -> Self {
        Self {
            heading_level: self.heading_level + 1,
            members: true,
            ..self.clone()
        }
    }
}
