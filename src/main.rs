//! cdoc — generate API reference and test catalog pages from C/C++ doc
//! comments.
//!
//! Two modes:
//!
//! - **file mode**: `cdoc src/engine.h src/uart.c` prints one page per file
//!   (or writes `<file>.md` pages with `-o DIR`)
//! - **site mode**: `cdoc -c cdoc.yml` builds every configured collection,
//!   writes the pages and `nav.yml`, and expands directives in `docs_dir`

use anyhow::{Context, Result};
use cdoc::collection::discover_sources;
use cdoc::{Build, Config};
use clap::Parser;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "cdoc",
    about = "Generate markdown documentation from C/C++ doc comments"
)]
struct Cli {
    /// Source files to render (glob patterns supported). Without files,
    /// the site described by the config is built.
    files: Vec<String>,

    /// Config file for site mode
    #[arg(short = 'c', long, default_value = "cdoc.yml")]
    config: PathBuf,

    /// Output directory (overrides `output_dir` in site mode)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Do not link bare backtick names to their documentation
    #[arg(long)]
    no_xref: bool,

    /// Log debug output
    #[arg(short = 'v', long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short = 'q', long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    if cli.files.is_empty() {
        return site_mode(&cli);
    }
    file_mode(&cli)
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("CDOC_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

/// file mode: render each file on its own page, cross-linked with the
/// other files of the same run.
fn file_mode(cli: &Cli) -> Result<()> {
    let files = expand_globs(&cli.files)?;
    if files.is_empty() {
        anyhow::bail!("no input files");
    }

    let config = Config {
        auto_xref: !cli.no_xref,
        ..Config::default()
    };
    let mut build = Build::new(config, Path::new("."));

    let pages: Vec<(PathBuf, String)> = page_names(&files)
        .into_iter()
        .map(|name| format!("{name}.md"))
        .zip(files)
        .map(|(page, path)| (path, page))
        .collect();
    for (path, page) in &pages {
        build.add_file(path, page);
    }

    if let Some(output_dir) = &cli.output {
        fs::create_dir_all(output_dir).with_context(|| {
            format!("failed to create output directory: {}", output_dir.display())
        })?;
    }

    let mut rendered = Vec::new();
    for (path, page) in &pages {
        let markdown = build.render_file(path, page);
        match &cli.output {
            Some(output_dir) => write_page(output_dir, page, &markdown)?,
            None => rendered.push(markdown),
        }
    }
    if !rendered.is_empty() {
        print!("{}", rendered.join("\n"));
    }
    Ok(())
}

/// site mode: build every generated page, the nav tree, and the
/// hand-written pages of `docs_dir`.
fn site_mode(cli: &Cli) -> Result<()> {
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if cli.no_xref {
        config.auto_xref = false;
    }

    let base_dir = cli
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let output_dir = cli
        .output
        .clone()
        .unwrap_or_else(|| base_dir.join(&config.output_dir));
    let docs_dir = config.docs_dir.as_ref().map(|d| base_dir.join(d));

    let mut build = Build::new(config, &base_dir);
    build.discover();

    fs::create_dir_all(&output_dir).with_context(|| {
        format!("failed to create output directory: {}", output_dir.display())
    })?;

    let ids: Vec<String> = build.page_ids().map(str::to_string).collect();
    for id in &ids {
        if let Some(markdown) = build.render_page(id) {
            write_page(&output_dir, id, &markdown)?;
        }
    }

    if let Some(nav) = build.nav() {
        let yaml = serde_yaml::to_string(&vec![nav]).context("failed to serialize nav")?;
        let path = output_dir.join("nav.yml");
        fs::write(&path, yaml).with_context(|| format!("failed to write {}", path.display()))?;
    }

    let mut written = ids.len();
    if let Some(docs_dir) = docs_dir {
        if !docs_dir.is_dir() {
            anyhow::bail!("docs_dir not found: {}", docs_dir.display());
        }
        for rel in discover_sources(&docs_dir, &[".md".to_string()], &[]) {
            let path = docs_dir.join(&rel);
            let text = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let markdown = build.render_markdown(&text, &rel);
            write_page(&output_dir, &rel, &markdown)?;
            written += 1;
        }
    }

    info!("wrote {} pages to {}", written, output_dir.display());
    Ok(())
}

/// Write `markdown` for page id `page` (a `/`-separated relative path).
fn write_page(output_dir: &Path, page: &str, markdown: &str) -> Result<()> {
    let path = output_dir.join(page);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, markdown).with_context(|| format!("failed to write {}", path.display()))
}

/// Page names for file mode: the base name of each file, or, when two
/// files share a base name, each path relative to the deepest directory
/// containing all of them.
fn page_names(files: &[PathBuf]) -> Vec<String> {
    let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();
    let mut seen = HashSet::new();
    if names.iter().all(|n| seen.insert(n.as_str())) {
        return names;
    }

    let absolute: Vec<PathBuf> = files
        .iter()
        .map(|p| fs::canonicalize(p).unwrap_or_else(|_| p.clone()))
        .collect();
    let root = common_ancestor(&absolute);
    absolute
        .iter()
        .map(|p| {
            let rel = p.strip_prefix(&root).unwrap_or(p);
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect()
}

fn common_ancestor(paths: &[PathBuf]) -> PathBuf {
    let mut root = paths
        .first()
        .and_then(|p| p.parent())
        .map(Path::to_path_buf)
        .unwrap_or_default();
    while !paths.iter().all(|p| p.starts_with(&root)) {
        if !root.pop() {
            break;
        }
    }
    root
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// File extensions picked up when a directory is given.
const SUPPORTED_EXTENSIONS: &[&str] = &["c", "h", "cpp", "hpp", "cc", "hh", "cxx", "hxx"];

/// Expand glob patterns into a list of real file paths.
/// Bare directories are scanned (non-recursively) for C/C++ sources.
fn expand_globs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_file() {
            files.push(path.to_path_buf());
            continue;
        }
        if path.is_dir() {
            let entries = fs::read_dir(path)
                .with_context(|| format!("failed to read directory: {}", path.display()))?;
            for entry in entries.flatten() {
                let p = entry.path();
                let supported = p
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()));
                if p.is_file() && supported {
                    files.push(p);
                }
            }
            continue;
        }
        let matches: Vec<_> = glob::glob(pattern)
            .with_context(|| format!("invalid glob pattern: {}", pattern))?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();
        if matches.is_empty() {
            tracing::warn!("no files matched: {}", pattern);
        }
        files.extend(matches);
    }
    files.sort();
    files.dedup();
    Ok(files)
}
