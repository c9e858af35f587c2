//! Archive integration tests for the ptar CLI: tar, untar and multi-part mode.

#[path = "../common/mod.rs"]
mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::{TestFixture, assert_same_tree};
use predicates::prelude::*;
use std::fs;

#[test]
fn test_tar_untar_round_trip() {
    let fixture = TestFixture::new();
    fixture.create_nested_structure(4, 5);
    let archive = fixture.out("tree.tar");
    let dest = fixture.out("restore");

    cargo_bin_cmd!("ptar")
        .arg("tar")
        .arg(fixture.src.path())
        .arg(&archive)
        .arg("-q")
        .assert()
        .success()
        .stdout(predicate::str::contains("Archived 20 files"));
    assert!(archive.is_file());

    cargo_bin_cmd!("ptar")
        .arg("untar")
        .arg(&archive)
        .arg(&dest)
        .arg("-q")
        .assert()
        .success()
        .stdout(predicate::str::contains("Extracted 20 files"));

    assert_same_tree(fixture.src.path(), &dest);
}

#[test]
fn test_tar_with_manifest_file() {
    let fixture = TestFixture::new();
    fixture.create_files(6, 8);
    let list = fixture.out("list.txt");
    fs::write(&list, "./file0.txt\n./file5.txt\n").unwrap();
    let archive = fixture.out("subset.tar");
    let dest = fixture.out("restore");

    cargo_bin_cmd!("ptar")
        .arg("tar")
        .arg(fixture.src.path())
        .arg(&archive)
        .args(["-m"])
        .arg(&list)
        .arg("-q")
        .assert()
        .success();
    cargo_bin_cmd!("ptar")
        .arg("untar")
        .arg(&archive)
        .arg(&dest)
        .arg("-q")
        .assert()
        .success();

    assert!(dest.join("file0.txt").exists());
    assert!(dest.join("file5.txt").exists());
    assert!(!dest.join("file1.txt").exists());
}

#[test]
fn test_tar_multi_writes_parts_and_manifest() {
    let fixture = TestFixture::new();
    fixture.create_files(10, 16);
    let parts = fixture.out("parts");

    cargo_bin_cmd!("ptar")
        .arg("tar-multi")
        .arg(fixture.src.path())
        .arg(&parts)
        .args(["--count", "3", "-q"])
        .assert()
        .success()
        .stdout(predicate::str::contains("across 3 parts"));

    for name in ["part-0001.tar", "part-0002.tar", "part-0003.tar", "manifest.txt"] {
        assert!(parts.join(name).is_file(), "missing {name}");
    }
    assert!(!parts.join("part-0004.tar").exists());
    let manifest = fs::read_to_string(parts.join("manifest.txt")).unwrap();
    assert_eq!(manifest.lines().count(), 10);
}

#[test]
fn test_tar_multi_round_trip() {
    let fixture = TestFixture::new();
    fixture.create_nested_structure(3, 7);
    let parts = fixture.out("parts");
    let dest = fixture.out("restore");

    cargo_bin_cmd!("ptar")
        .arg("tar-multi")
        .arg(fixture.src.path())
        .arg(&parts)
        .args(["-n", "4", "-j", "4", "-q"])
        .assert()
        .success();
    cargo_bin_cmd!("ptar")
        .arg("untar-multi")
        .arg(&parts)
        .arg(&dest)
        .arg("-q")
        .assert()
        .success()
        .stdout(predicate::str::contains("Extracted 21 files"));

    assert_same_tree(fixture.src.path(), &dest);
}

#[test]
fn test_tar_multi_part_count_clamped() {
    let fixture = TestFixture::new();
    fixture.create_files(2, 4);
    let parts = fixture.out("parts");

    cargo_bin_cmd!("ptar")
        .arg("tar-multi")
        .arg(fixture.src.path())
        .arg(&parts)
        .args(["--count", "16", "--output", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"parts\":2"));
}

#[cfg(unix)]
#[test]
fn test_round_trip_preserves_mode() {
    use std::os::unix::fs::PermissionsExt;

    let fixture = TestFixture::new();
    let script = fixture.src.path().join("run.sh");
    fs::write(&script, "#!/bin/sh\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o750)).unwrap();
    let archive = fixture.out("a.tar");
    let dest = fixture.out("restore");

    cargo_bin_cmd!("ptar")
        .arg("tar")
        .arg(fixture.src.path())
        .arg(&archive)
        .arg("-q")
        .assert()
        .success();
    cargo_bin_cmd!("ptar")
        .arg("untar")
        .arg(&archive)
        .arg(&dest)
        .arg("-q")
        .assert()
        .success();

    let mode = fs::metadata(dest.join("run.sh")).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o750);
}

#[cfg(unix)]
#[test]
fn test_no_perms_skips_mode() {
    use std::os::unix::fs::PermissionsExt;

    let fixture = TestFixture::new();
    let tool = fixture.src.path().join("tool");
    fs::write(&tool, "t").unwrap();
    fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
    let dest = fixture.out("copy");

    cargo_bin_cmd!("ptar")
        .arg("cp")
        .arg(fixture.src.path())
        .arg(&dest)
        .args(["--no-perms", "-q"])
        .assert()
        .success();

    // New files are created without execute bits
    let mode = fs::metadata(dest.join("tool")).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0);
}
