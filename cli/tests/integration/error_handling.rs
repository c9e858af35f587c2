//! Error handling integration tests for the ptar CLI.
//!
//! These tests verify:
//! - Setup errors are reported with a stable error code and exit status
//! - Per-file failures do not stop the rest of the batch
//! - Malformed archives and part directories are rejected

#[path = "../common/mod.rs"]
mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::TestFixture;
use predicates::prelude::*;
use std::fs;

#[test]
fn test_source_not_found() {
    let fixture = TestFixture::new();

    cargo_bin_cmd!("ptar")
        .arg("tar")
        .arg(fixture.src.path().join("nope"))
        .arg(fixture.out("a.tar"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error[source_not_found]"));
    assert!(!fixture.out("a.tar").exists());
}

#[test]
fn test_empty_source_is_invalid_input() {
    let fixture = TestFixture::new();

    cargo_bin_cmd!("ptar")
        .arg("tar")
        .arg(fixture.src.path())
        .arg(fixture.out("a.tar"))
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Manifest is empty"));
    assert!(!fixture.out("a.tar").exists());
}

#[test]
fn test_archive_path_is_directory() {
    let fixture = TestFixture::new();
    fixture.create_files(1, 1);

    cargo_bin_cmd!("ptar")
        .arg("tar")
        .arg(fixture.src.path())
        .arg(fixture.work.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("error[invalid_input]"));
}

#[test]
fn test_missing_file_is_partial_failure() {
    let fixture = TestFixture::new();
    fixture.create_files(2, 4);
    let list = fixture.out("list.txt");
    fs::write(&list, "./file0.txt\n./ghost.txt\n./file1.txt\n").unwrap();
    let dest = fixture.out("copy");

    cargo_bin_cmd!("ptar")
        .arg("cp")
        .arg(fixture.src.path())
        .arg(&dest)
        .arg("--manifest-file")
        .arg(&list)
        .arg("-q")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("warning:"))
        .stderr(predicate::str::contains("ghost.txt"))
        .stderr(predicate::str::contains("error[partial_failure]"))
        .stderr(predicate::str::contains("1 of 3"));

    assert!(dest.join("file0.txt").exists());
    assert!(dest.join("file1.txt").exists());
}

#[test]
fn test_manifest_file_not_found() {
    let fixture = TestFixture::new();
    fixture.create_files(1, 1);

    cargo_bin_cmd!("ptar")
        .arg("cp")
        .arg(fixture.src.path())
        .arg(fixture.out("copy"))
        .arg("--manifest-file")
        .arg(fixture.out("missing.txt"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("missing.txt"));
}

#[test]
fn test_untar_without_embedded_manifest() {
    let fixture = TestFixture::new();
    // Two zero blocks: a valid but empty tar stream
    let archive = fixture.out("empty.tar");
    fs::write(&archive, vec![0u8; 1024]).unwrap();

    cargo_bin_cmd!("ptar")
        .arg("untar")
        .arg(&archive)
        .arg(fixture.out("restore"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error[format_error]"));
}

#[test]
fn test_untar_multi_without_parts() {
    let fixture = TestFixture::new();

    cargo_bin_cmd!("ptar")
        .arg("untar-multi")
        .arg(fixture.work.path())
        .arg(fixture.out("restore"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("No part-*.tar files"));
}

#[test]
fn test_zero_part_count_rejected() {
    let fixture = TestFixture::new();
    fixture.create_files(3, 1);

    cargo_bin_cmd!("ptar")
        .arg("tar-multi")
        .arg(fixture.src.path())
        .arg(fixture.out("parts"))
        .args(["--count", "0"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("error[invalid_input]"));
    assert!(!fixture.out("parts").exists());
}

#[test]
fn test_zero_concurrency_rejected() {
    let fixture = TestFixture::new();
    fixture.create_files(3, 1);

    cargo_bin_cmd!("ptar")
        .arg("cp")
        .arg(fixture.src.path())
        .arg(fixture.out("copy"))
        .args(["-j", "0"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_json_error_output() {
    let fixture = TestFixture::new();

    let output = cargo_bin_cmd!("ptar")
        .arg("cp")
        .arg(fixture.src.path().join("nope"))
        .arg(fixture.out("copy"))
        .args(["--output", "json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["status"], "error");
    assert_eq!(value["command"], "cp");
    assert_eq!(value["error_code"], "source_not_found");
}
