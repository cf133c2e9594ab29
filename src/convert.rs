//! In-place conversion of gtk-doc markup in `/** ... */` comments.

use crate::error::ConvertError;
use crate::markup::gtkdoc_to_rst;
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::warn;
use walkdir::WalkDir;

static RE_DOC_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*\*(.*?)\*/").unwrap());

static RE_DECORATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*(?:\*(?:[ \t]|$))?").unwrap());

/// Extensions processed when none are given.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".c", ".h", ".cpp", ".hpp"];

/// Convert every doc comment in `source`. Comment decoration is kept;
/// blocks without gtk-doc markup are left byte-for-byte unchanged.
pub fn convert_source(source: &str) -> String {
    RE_DOC_BLOCK
        .replace_all(source, |caps: &Captures| {
            let inner = &caps[1];
            match convert_block(inner) {
                Some(converted) => format!("/**{converted}*/"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Convert the text between `/**` and `*/`, or `None` when nothing changes.
fn convert_block(inner: &str) -> Option<String> {
    let mut prefixes = Vec::new();
    let mut contents = Vec::new();
    for line in inner.split('\n') {
        let len = RE_DECORATION.find(line).map_or(0, |m| m.end());
        prefixes.push(&line[..len]);
        contents.push(&line[len..]);
    }

    let content = contents.join("\n");
    let converted = gtkdoc_to_rst(&content);
    if converted == content {
        return None;
    }

    let default = prefixes
        .iter()
        .rev()
        .find(|p| p.contains('*'))
        .copied()
        .unwrap_or(" * ");
    let last = prefixes.len() - 1;
    let lines: Vec<&str> = converted.split('\n').collect();
    let out: Vec<String> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let prefix = if i == lines.len() - 1 {
                prefixes[last]
            } else if i < last {
                prefixes[i]
            } else {
                default
            };
            if line.is_empty() && i != lines.len() - 1 {
                prefix.trim_end().to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect();
    Some(out.join("\n"))
}

/// Convert one file. Returns whether its text changed; the file is only
/// written when it did and `dry_run` is off. With `backup`, the original
/// is first copied to `<file>.bak`. Files that are not valid UTF-8 are
/// left alone.
pub fn convert_file(path: &Path, dry_run: bool, backup: bool) -> Result<bool, ConvertError> {
    let io_err = |source| ConvertError::Io {
        path: path.to_path_buf(),
        source,
    };
    let bytes = fs::read(path).map_err(io_err)?;
    let Ok(original) = String::from_utf8(bytes) else {
        warn!("skipping {}: not valid UTF-8", path.display());
        return Ok(false);
    };
    let result = convert_source(&original);
    if result == original {
        return Ok(false);
    }
    if dry_run {
        return Ok(true);
    }

    if backup {
        let mut bak = path.as_os_str().to_owned();
        bak.push(".bak");
        fs::copy(path, PathBuf::from(bak)).map_err(io_err)?;
    }
    fs::write(path, result).map_err(io_err)?;
    Ok(true)
}

/// The files to convert under `path`: the file itself, or every file of a
/// directory tree whose extension is in `extensions` (case-insensitive),
/// sorted per directory.
pub fn collect_files(path: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, ConvertError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(ConvertError::NotFound(path.to_path_buf()));
    }

    let extensions: Vec<String> = extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect();
    let files = WalkDir::new(path)
        .sort_by(|a, b| {
            let a_dir = a.file_type().is_dir();
            let b_dir = b.file_type().is_dir();
            a_dir.cmp(&b_dir).then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                let failed = e.path().unwrap_or(path);
                warn!("skipping {}: {}", failed.display(), e);
                None
            }
        })
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| extensions.contains(&e.to_lowercase()))
        })
        .collect();
    Ok(files)
}
