//! cdoc-convert — rewrite gtk-doc markup in C/C++ doc comments as
//! reST-style markup, in place.
//!
//! ```text
//! cdoc-convert src/
//! cdoc-convert src/engine.h --dry-run
//! cdoc-convert src/ --ext .c .h --backup
//! ```

use anyhow::{Context, Result};
use cdoc::convert::{collect_files, convert_file, DEFAULT_EXTENSIONS};
use cdoc::error::ConvertError;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "cdoc-convert",
    about = "Convert gtk-doc markup to reST in C/C++ doc comments"
)]
struct Cli {
    /// File or directory to convert
    path: PathBuf,

    /// File extensions to process (default: .c .h .cpp .hpp)
    #[arg(long, num_args = 1..)]
    ext: Vec<String>,

    /// Show what would change without modifying files
    #[arg(long)]
    dry_run: bool,

    /// Create .bak files before modifying
    #[arg(long)]
    backup: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing()?;

    let extensions: Vec<String> = if cli.ext.is_empty() {
        DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    } else {
        cli.ext.clone()
    };

    let files = match collect_files(&cli.path, &extensions) {
        Ok(files) => files,
        Err(ConvertError::NotFound(path)) => {
            eprintln!("error: {} not found", path.display());
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e).context("failed to list files"),
    };

    let mut changed = 0;
    for path in &files {
        let was_changed = convert_file(path, cli.dry_run, cli.backup)
            .with_context(|| format!("failed to convert {}", path.display()))?;
        if was_changed {
            changed += 1;
            let tag = if cli.dry_run { "[dry-run] " } else { "" };
            println!("{}converted: {}", tag, path.display());
        }
    }

    println!(
        "\n{}/{} files {}modified",
        changed,
        files.len(),
        if cli.dry_run { "would be " } else { "" }
    );
    Ok(ExitCode::SUCCESS)
}

fn init_tracing() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_env("CDOC_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
