//! Source-parsing backends.
//!
//! Both backends implement [`SourceParser`]; everything above this module
//! only sees `Vec<DocumentedEntity>`. [`ParseCache`] picks the backend,
//! applies the fallback policy and memoizes results for one build.

pub mod pattern;
pub mod treesitter;

pub use pattern::PatternParser;
pub use treesitter::TreeSitterParser;

use crate::error::ParseError;
use crate::markup::gtkdoc_to_rst;
use crate::model::DocumentedEntity;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, error, warn};

/// A backend turning one C source file into documented entities.
pub trait SourceParser {
    fn name(&self) -> &'static str;

    /// True for a backend that understands the full grammar.
    fn is_precise(&self) -> bool;

    fn parse(
        &self,
        path: &Path,
        source: &str,
        args: &[String],
    ) -> Result<Vec<DocumentedEntity>, ParseError>;
}

/// Which backend a build uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParserChoice {
    /// Precise backend, with the pattern backend as fallback.
    #[default]
    Auto,
    TreeSitter,
    Pattern,
}

/// File name used for `source_file` on parsed entities.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parsed entities per file for the lifetime of one build.
pub struct ParseCache {
    choice: ParserChoice,
    fallback: bool,
    convert_gtkdoc: bool,
    precise: TreeSitterParser,
    pattern: PatternParser,
    entries: HashMap<PathBuf, Rc<Vec<DocumentedEntity>>>,
}

impl ParseCache {
    pub fn new(choice: ParserChoice, fallback: bool, convert_gtkdoc: bool) -> Self {
        Self {
            choice,
            fallback,
            convert_gtkdoc,
            precise: TreeSitterParser,
            pattern: PatternParser,
            entries: HashMap::new(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entities of `path`, parsing on first use. Failures are logged and
    /// yield an empty list.
    pub fn get(&mut self, path: &Path, args: &[String]) -> Rc<Vec<DocumentedEntity>> {
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if let Some(hit) = self.entries.get(&key) {
            return Rc::clone(hit);
        }

        let mut entities = self.load(path, args);
        if self.convert_gtkdoc {
            convert_comments(&mut entities);
        }
        let entities = Rc::new(entities);
        self.entries.insert(key, Rc::clone(&entities));
        entities
    }

    fn load(&self, path: &Path, args: &[String]) -> Vec<DocumentedEntity> {
        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                error!("cannot read {}: {}", path.display(), e);
                return Vec::new();
            }
        };

        let primary: &dyn SourceParser = match self.choice {
            ParserChoice::Pattern => &self.pattern,
            ParserChoice::Auto | ParserChoice::TreeSitter => &self.precise,
        };
        debug!("parsing {} with {}", path.display(), primary.name());

        match primary.parse(path, &source, args) {
            Ok(entities) => entities,
            Err(e) if primary.is_precise() && self.fallback => {
                warn!("{}; falling back to {}", e, self.pattern.name());
                self.pattern.parse(path, &source, args).unwrap_or_else(|e| {
                    warn!("{}", e);
                    Vec::new()
                })
            }
            Err(e) => {
                warn!("{}", e);
                Vec::new()
            }
        }
    }
}

fn convert_comments(entities: &mut [DocumentedEntity]) {
    for entity in entities {
        entity.comment = gtkdoc_to_rst(&entity.comment);
        convert_comments(&mut entity.members);
    }
}
