use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn cmd() -> assert_cmd::Command {
    assert_cmd::Command::from(Command::new(env!("CARGO_BIN_EXE_cdoc")))
}

fn convert_cmd() -> assert_cmd::Command {
    assert_cmd::Command::from(Command::new(env!("CARGO_BIN_EXE_cdoc-convert")))
}

fn fixture_path(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn read(dir: &TempDir, rel: &str) -> String {
    fs::read_to_string(dir.path().join(rel)).unwrap_or_else(|e| panic!("{rel}: {e}"))
}

// -- file mode --

#[test]
fn file_mode_prints_page() {
    cmd()
        .arg(fixture_path("src/core/engine.h"))
        .assert()
        .success()
        .stdout(predicate::str::starts_with("# engine.h"))
        .stdout(predicate::str::contains("<a id=\"func-engine_init\"></a>"))
        .stdout(predicate::str::contains("Start the engine."))
        .stdout(predicate::str::contains("<a id=\"struct-engine_cfg\"></a>"));
}

#[test]
fn file_mode_links_between_files() {
    let out = TempDir::new().unwrap();
    cmd()
        .arg(fixture_path("src/core/engine.h"))
        .arg(fixture_path("src/drivers/uart.c"))
        .arg("-o")
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let uart = read(&out, "uart.c.md");
    assert!(uart.contains("[`engine_init()`](../engine.h/?h=engine_init#func-engine_init)"));
    assert!(out.path().join("engine.h.md").is_file());
}

#[test]
fn file_mode_shared_base_names() {
    let src = TempDir::new().unwrap();
    for dir in ["core", "legacy"] {
        fs::create_dir_all(src.path().join(dir)).unwrap();
        fs::copy(fixture_path("src/core/engine.h"), src.path().join(dir).join("engine.h")).unwrap();
    }
    let out = TempDir::new().unwrap();
    cmd()
        .arg(src.path().join("core/engine.h"))
        .arg(src.path().join("legacy/engine.h"))
        .arg("-o")
        .arg(out.path())
        .assert()
        .success();

    assert!(read(&out, "core/engine.h.md").starts_with("# engine.h"));
    assert!(read(&out, "legacy/engine.h.md").starts_with("# engine.h"));
    assert!(!out.path().join("engine.h.md").exists());
}

#[test]
fn file_mode_without_xref() {
    cmd()
        .arg(fixture_path("src/core/engine.h"))
        .arg(fixture_path("src/drivers/uart.c"))
        .arg("--no-xref")
        .assert()
        .success()
        .stdout(predicate::str::contains("`engine_init()` on first use"));
}

#[test]
fn file_mode_no_match() {
    cmd()
        .arg("/no/such/dir/*.c")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no input files"));
}

// -- site mode --

#[test]
fn site_mode_writes_pages_and_nav() {
    let out = TempDir::new().unwrap();
    cmd()
        .arg("-c")
        .arg(fixture_path("cdoc.yml"))
        .arg("-o")
        .arg(out.path())
        .assert()
        .success();

    let top = read(&out, "api_reference/index.md");
    assert!(top.starts_with("# API Reference for Engine"));
    assert!(top.contains("<strong>Version 1.4.2</strong>"));
    assert!(top.contains("across 2 source groups."));

    let index = read(&out, "api_reference/src/index.md");
    assert!(index.contains("### core/"));
    assert!(index.contains("[engine.h](core/engine.h.md)"));

    let nav = read(&out, "nav.yml");
    assert!(nav.contains("- API Reference:"));
    assert!(nav.contains("Overview: api_reference/index.md"));
    assert!(nav.contains("By Category: api_reference/tests/by-category.md"));
}

#[test]
fn site_mode_source_page() {
    let out = TempDir::new().unwrap();
    cmd()
        .arg("-c")
        .arg(fixture_path("cdoc.yml"))
        .arg("-o")
        .arg(out.path())
        .assert()
        .success();

    let engine = read(&out, "api_reference/src/core/engine.h.md");
    assert!(engine.starts_with("# engine.h\n\nSource file: `core/engine.h`"));
    assert!(engine.contains("<div class=\"hm-idx\">"));
    assert!(engine.contains("### Appendix"));
    assert!(engine.contains("#### Example usage in code"));
    assert!(engine.contains("drivers/uart.c:"));
    assert!(engine.contains("int rc = engine_init(0);"));

    let uart = read(&out, "api_reference/src/drivers/uart.c.md");
    assert!(uart.contains("../../core/engine.h/?h=engine_init#func-engine_init"));
}

#[test]
fn site_mode_test_catalog() {
    let out = TempDir::new().unwrap();
    cmd()
        .arg("-c")
        .arg(fixture_path("cdoc.yml"))
        .arg("-o")
        .arg(out.path())
        .assert()
        .success();

    let page = read(&out, "api_reference/tests/kms_addfb.c.md");
    assert!(page.contains("# kms addfb"));
    assert!(page.contains("| Category | Display |"));
    assert!(page.contains("## Subtests (2)"));
    assert!(page.contains("<a id=\"subtest-too-high\"></a>"));
    assert!(page.contains("If condition (<code>!has_limits(fd)</code>) is met"));

    let by_category = read(&out, "api_reference/tests/by-category.md");
    assert!(by_category.contains("## Display"));
    assert!(by_category.contains("1 tests, 2 subtests."));

    let by_functionality = read(&out, "api_reference/tests/by-functionality.md");
    assert!(by_functionality.contains("## kms\n\n*2 subtests*"));
}

#[test]
fn site_mode_expands_directives() {
    let out = TempDir::new().unwrap();
    cmd()
        .arg("-c")
        .arg(fixture_path("cdoc.yml"))
        .arg("-o")
        .arg(out.path())
        .assert()
        .success();

    let guide = read(&out, "guide.md");
    assert!(!guide.contains(":::"));
    assert!(guide.contains("Stop the engine."));
    assert!(guide.contains("[`engine_init()`](../api_reference/src/core/engine.h/?h=engine_init#func-engine_init)"));
    assert!(guide.ends_with("Done.\n"));
}

#[test]
fn site_mode_bad_config() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("cdoc.yml");
    fs::write(&config, "heading_levle: 3\n").unwrap();
    cmd()
        .arg("-c")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load"));
}

// -- cdoc-convert --

fn legacy_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::copy(fixture_path("legacy.h"), dir.path().join("legacy.h")).unwrap();
    fs::write(dir.path().join("notes.txt"), "@ignored: yes\n").unwrap();
    dir
}

#[test]
fn convert_dry_run_leaves_files() {
    let dir = legacy_tree();
    let before = read(&dir, "legacy.h");
    convert_cmd()
        .arg(dir.path())
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry-run] converted:"))
        .stdout(predicate::str::ends_with("\n1/1 files would be modified\n"));
    assert_eq!(read(&dir, "legacy.h"), before);
}

#[test]
fn convert_rewrites_with_backup() {
    let dir = legacy_tree();
    convert_cmd()
        .arg(dir.path())
        .arg("--backup")
        .assert()
        .success()
        .stdout(predicate::str::contains("converted:"))
        .stdout(predicate::str::ends_with("\n1/1 files modified\n"));

    let converted = read(&dir, "legacy.h");
    assert!(converted.contains(" * :param path: file to open, see :type:`legacy_handle`"));
    assert!(converted.contains(" * :returns: a handle, or :const:`NULL`"));
    assert!(converted.contains("Opens ``path``."));
    assert!(converted.contains("/** Already clean. */"));
    assert!(dir.path().join("legacy.h.bak").is_file());

    convert_cmd()
        .arg(dir.path().join("legacy.h"))
        .assert()
        .success()
        .stdout(predicate::str::ends_with("\n0/1 files modified\n"));
}

#[test]
fn convert_extension_filter() {
    let dir = legacy_tree();
    convert_cmd()
        .arg(dir.path())
        .args(["--ext", ".c"])
        .assert()
        .success()
        .stdout(predicate::str::ends_with("\n0/0 files modified\n"));
}

#[test]
fn convert_missing_path() {
    convert_cmd()
        .arg("/no/such/path")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error: /no/such/path not found"));
}

#[test]
fn convert_skips_non_utf8_files() {
    let dir = legacy_tree();
    let mut bytes = fs::read(dir.path().join("legacy.h")).unwrap();
    bytes.extend_from_slice(b"/* caf\xe9 */\n");
    fs::write(dir.path().join("legacy.h"), &bytes).unwrap();
    convert_cmd()
        .arg(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("not valid UTF-8"))
        .stdout(predicate::str::ends_with("\n0/1 files modified\n"));
    assert_eq!(fs::read(dir.path().join("legacy.h")).unwrap(), bytes);
}
