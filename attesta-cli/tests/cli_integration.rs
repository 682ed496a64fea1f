//! CLI integration tests for attesta-cli.
//!
//! These run the actual binary and check outputs and exit codes. Nothing here
//! needs a running capture server.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// SHA-256 of `abc`.
const ABC_HASH: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

/// Nothing listens on port 9 (discard) in the test environment.
const DEAD_SERVER: &str = "http://127.0.0.1:9";

/// Get a Command for the attesta binary.
fn attesta() -> Command {
    let mut cmd = Command::cargo_bin("attesta").unwrap();
    cmd.env_remove("ATTESTA_SERVER")
        .env_remove("ATTESTA_TOKEN")
        .env_remove("ATTESTA_USER_ID")
        .env_remove("ATTESTA_USER_NAME");
    cmd
}

fn write_png(dir: &TempDir, name: &str, level: u8) -> std::path::PathBuf {
    let path = dir.path().join(name);
    image::RgbImage::from_pixel(32, 24, image::Rgb([level, level, level]))
        .save(&path)
        .unwrap();
    path
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    attesta()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Audited image capture"))
        .stdout(predicate::str::contains("hash"))
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("capture"))
        .stdout(predicate::str::contains("audit"));
}

#[test]
fn test_version_displays_version() {
    attesta()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("attesta"));
}

#[test]
fn test_help_shows_exit_codes() {
    attesta()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("66"))
        .stdout(predicate::str::contains("69"));
}

#[test]
fn test_capture_help_shows_options() {
    attesta()
        .args(["capture", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--require-barcode"))
        .stdout(predicate::str::contains("--max"))
        .stdout(predicate::str::contains("--no-audit"))
        .stdout(predicate::str::contains("--lat"));
}

// ============================================================================
// Hash Tests
// ============================================================================

#[test]
fn test_hash_prints_sha256sum_layout() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("abc.bin");
    fs::write(&file, b"abc").unwrap();

    attesta()
        .args(["hash", file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(format!("{ABC_HASH}  ")))
        .stdout(predicate::str::contains("abc.bin"));
}

#[test]
fn test_hash_json_output() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("abc.bin");
    fs::write(&file, b"abc").unwrap();

    let output = attesta()
        .args(["hash", "--format", "json", file.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed[0]["imageHash"], ABC_HASH);
}

#[test]
fn test_hash_missing_file_returns_input_error() {
    // Exit code 66 = EX_NOINPUT
    attesta()
        .args(["hash", "nonexistent_file.jpg"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read file"));
}

// ============================================================================
// Verify Tests
// ============================================================================

#[test]
fn test_verify_matching_hash_is_authentic() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("capture.jpg");
    fs::write(&file, b"abc").unwrap();

    attesta()
        .args(["verify", file.to_str().unwrap(), "--hash", ABC_HASH])
        .assert()
        .success()
        .stdout(predicate::str::contains("AUTHENTIC"));
}

#[test]
fn test_verify_accepts_uppercase_hash() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("capture.jpg");
    fs::write(&file, b"abc").unwrap();

    attesta()
        .args([
            "verify",
            file.to_str().unwrap(),
            "--hash",
            &ABC_HASH.to_uppercase(),
        ])
        .assert()
        .success();
}

#[test]
fn test_verify_modified_file_is_tampered() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("capture.jpg");
    fs::write(&file, b"abd").unwrap();

    // Exit code 65 = EX_DATAERR
    attesta()
        .args(["verify", file.to_str().unwrap(), "--hash", ABC_HASH])
        .assert()
        .code(65)
        .stdout(predicate::str::contains("TAMPERED"))
        .stderr(predicate::str::contains("does not match"));
}

#[test]
fn test_verify_quiet_prints_nothing() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("capture.jpg");
    fs::write(&file, b"abc").unwrap();

    attesta()
        .args(["--quiet", "verify", file.to_str().unwrap(), "--hash", ABC_HASH])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_verify_invalid_hash_is_usage_error() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("capture.jpg");
    fs::write(&file, b"abc").unwrap();

    // Exit code 64 = EX_USAGE
    attesta()
        .args(["verify", file.to_str().unwrap(), "--hash", "abc123"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("Invalid image hash"));
}

#[test]
fn test_verify_missing_file_returns_input_error() {
    attesta()
        .args(["verify", "missing.jpg", "--hash", ABC_HASH])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read file"));
}

#[test]
fn test_verify_requires_entry_or_hash() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("capture.jpg");
    fs::write(&file, b"abc").unwrap();

    attesta()
        .args(["verify", file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--entry"));
}

#[test]
fn test_verify_unreachable_server_returns_network_error() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("capture.jpg");
    fs::write(&file, b"abc").unwrap();

    // Exit code 69 = EX_UNAVAILABLE
    attesta()
        .args([
            "verify",
            file.to_str().unwrap(),
            "--entry",
            "1",
            "--server",
            DEAD_SERVER,
        ])
        .assert()
        .code(69);
}

// ============================================================================
// Capture and Audit Tests
// ============================================================================

#[test]
fn test_capture_undecodable_image_fails_before_upload() {
    let temp = TempDir::new().unwrap();
    let good = write_png(&temp, "good.png", 200);
    let bad = temp.path().join("bad.jpg");
    fs::write(&bad, b"not an image").unwrap();

    attesta()
        .args([
            "capture",
            good.to_str().unwrap(),
            bad.to_str().unwrap(),
            "--server",
            DEAD_SERVER,
        ])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to decode image"));
}

#[test]
fn test_capture_lat_requires_lon() {
    let temp = TempDir::new().unwrap();
    let image = write_png(&temp, "good.png", 200);

    attesta()
        .args(["capture", image.to_str().unwrap(), "--lat", "52.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--lon"));
}

#[test]
fn test_audit_list_unreachable_server_returns_network_error() {
    attesta()
        .args(["audit", "--server", DEAD_SERVER, "list"])
        .assert()
        .code(69)
        .stderr(predicate::str::contains("transport error"));
}
