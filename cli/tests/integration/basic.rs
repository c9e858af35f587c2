//! Basic functionality integration tests for the ptar CLI: manifests and copy.

#[path = "../common/mod.rs"]
mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::{TestFixture, assert_same_tree};
use predicates::prelude::*;
use std::fs;

#[test]
fn test_manifest_command_writes_sorted_list() {
    let fixture = TestFixture::new();
    fs::create_dir_all(fixture.src.path().join("b/c")).unwrap();
    fs::write(fixture.src.path().join("a.txt"), "a").unwrap();
    fs::write(fixture.src.path().join("b/c/d.txt"), "d").unwrap();
    fs::write(fixture.src.path().join("b/e.txt"), "e").unwrap();
    let manifest = fixture.out("manifest.txt");

    let mut cmd = cargo_bin_cmd!("ptar");
    cmd.arg("manifest")
        .arg(fixture.src.path())
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 files"));

    assert_eq!(
        fs::read_to_string(&manifest).unwrap(),
        "./a.txt\n./b/c/d.txt\n./b/e.txt\n"
    );
}

#[test]
fn test_copy_directory_tree() {
    let fixture = TestFixture::new();
    fixture.create_nested_structure(3, 4);
    let dest = fixture.out("copy");

    let mut cmd = cargo_bin_cmd!("ptar");
    cmd.arg("cp")
        .arg(fixture.src.path())
        .arg(&dest)
        .arg("-q")
        .assert()
        .success()
        .stdout(predicate::str::contains("Copied 12 files"));

    assert_same_tree(fixture.src.path(), &dest);
}

#[test]
fn test_copy_with_manifest_file_copies_only_listed() {
    let fixture = TestFixture::new();
    fixture.create_files(5, 10);
    let list = fixture.out("list.txt");
    fs::write(&list, "./file1.txt\n\n./file3.txt\n").unwrap();
    let dest = fixture.out("copy");

    let mut cmd = cargo_bin_cmd!("ptar");
    cmd.arg("cp")
        .arg(fixture.src.path())
        .arg(&dest)
        .arg("--manifest-file")
        .arg(&list)
        .arg("-q")
        .assert()
        .success();

    let mut names: Vec<_> = fs::read_dir(&dest)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, ["file1.txt", "file3.txt"]);
}

#[test]
fn test_copy_single_worker() {
    let fixture = TestFixture::new();
    fixture.create_nested_structure(2, 10);
    let dest = fixture.out("copy");

    let mut cmd = cargo_bin_cmd!("ptar");
    cmd.arg("cp")
        .arg(fixture.src.path())
        .arg(&dest)
        .args(["-j", "1", "-q"])
        .assert()
        .success();

    assert_same_tree(fixture.src.path(), &dest);
}

#[test]
fn test_copy_json_output() {
    let fixture = TestFixture::new();
    fixture.create_files(4, 100);
    let dest = fixture.out("copy");

    let mut cmd = cargo_bin_cmd!("ptar");
    let output = cmd
        .arg("cp")
        .arg(fixture.src.path())
        .arg(&dest)
        .args(["--output", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["command"], "cp");
    assert_eq!(value["status"], "ok");
    assert_eq!(value["files"], 4);
    assert_eq!(value["succeeded"], 4);
    assert_eq!(value["bytes"], 400);
}

#[test]
fn test_verbose_prints_summary() {
    let fixture = TestFixture::new();
    fixture.create_files(2, 1);
    let dest = fixture.out("copy");

    let mut cmd = cargo_bin_cmd!("ptar");
    cmd.arg("cp")
        .arg(fixture.src.path())
        .arg(&dest)
        .args(["-v", "-q"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Succeeded:      2"));
}
