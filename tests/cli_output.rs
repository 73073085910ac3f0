// Drives the pagesift binary end to end
mod common;

use anyhow::Result;
use common::{scanned_pages, text_pages, PdfBuilder};
use rexpect::spawn;
use std::fs;
use std::path::Path;
use std::process::Command;

const BIN: &str = env!("CARGO_BIN_EXE_pagesift");

fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> Result<String> {
    let path = dir.join(name);
    fs::write(&path, bytes)?;
    Ok(path.to_string_lossy().into_owned())
}

#[test]
fn test_extract_prints_page_sections() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pdf = write_fixture(dir.path(), "report.pdf", &PdfBuilder::new().pages(text_pages(2, 120)).build())?;

    let mut session = spawn(&format!("{} extract {}", BIN, pdf), Some(10_000))?;
    session.exp_string("=== PAGE 1 ===")?;
    session.exp_string("page001 ")?;
    session.exp_string("=== PAGE 2 ===")?;
    session.exp_eof()?;
    Ok(())
}

#[test]
fn test_classify_prints_summary_line() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pdf = write_fixture(dir.path(), "scan.pdf", &PdfBuilder::new().pages(scanned_pages(2)).build())?;

    let mut session = spawn(&format!("{} classify {}", BIN, pdf), Some(10_000))?;
    session.exp_string("has_text=false sampled_chars=0")?;
    session.exp_eof()?;
    Ok(())
}

#[test]
fn test_exit_status_reflects_outcome() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let text = write_fixture(dir.path(), "text.pdf", &PdfBuilder::new().pages(text_pages(1, 200)).build())?;
    let scan = write_fixture(dir.path(), "scan.pdf", &PdfBuilder::new().pages(scanned_pages(1)).build())?;

    let status = |args: &[&str]| -> Result<Option<i32>> { Ok(Command::new(BIN).args(args).output()?.status.code()) };

    assert_eq!(status(&["extract", text.as_str()])?, Some(0));
    assert_eq!(status(&["extract", scan.as_str()])?, Some(1));
    assert_eq!(status(&["extract", scan.as_str(), "--forced"])?, Some(2));
    Ok(())
}

#[test]
fn test_json_output_and_page_count() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pdf = write_fixture(dir.path(), "three.pdf", &PdfBuilder::new().pages(text_pages(3, 80)).build())?;

    let output = Command::new(BIN).args(["extract", pdf.as_str(), "--format", "json"]).output()?;
    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["outcome"], "success");
    assert_eq!(value["diagnostics"]["pages_with_text"], 3);

    let count = Command::new(BIN).args(["count", pdf.as_str()]).output()?;
    assert_eq!(String::from_utf8_lossy(&count.stdout).trim(), "3");
    Ok(())
}

#[test]
fn test_config_file_lowers_char_limit() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pdf = write_fixture(dir.path(), "long.pdf", &PdfBuilder::new().pages(text_pages(2, 400)).build())?;
    let config = write_fixture(dir.path(), "pagesift.toml", b"max_chars = 200\n")?;

    let output = Command::new(BIN).args(["--config", config.as_str(), "extract", pdf.as_str()]).output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout.contains("REPRESENTATIVE SAMPLE FROM 2 PAGES"));
    Ok(())
}
