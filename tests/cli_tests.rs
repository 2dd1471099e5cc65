use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn imgcheck() -> Command {
    Command::cargo_bin("imgcheck").unwrap()
}

#[test]
fn run_rejects_a_missing_image() {
    imgcheck()
        .args(["run", "/nonexistent/fs.img"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a valid image file"));
}

#[test]
fn stats_summarizes_a_saved_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let transcript = dir.path().join("output.txt");
    fs::write(
        &transcript,
        "[PASS] Inode type check\n[PASS] Bitmap check\n[FAIL] Root directory check\n",
    )
    .unwrap();

    imgcheck()
        .arg("stats")
        .arg(&transcript)
        .assert()
        .success()
        .stdout(predicate::str::contains("Total checks: 3"))
        .stdout(predicate::str::contains("[PASS]: 2"))
        .stdout(predicate::str::contains("[FAIL]: 1"));
}

#[test]
fn stats_of_unmarked_text_is_all_zero() {
    let dir = tempfile::tempdir().unwrap();
    let transcript = dir.path().join("output.txt");
    fs::write(&transcript, "nothing interesting here\n").unwrap();

    imgcheck()
        .arg("stats")
        .arg(&transcript)
        .assert()
        .success()
        .stdout(predicate::str::contains("Total checks: 0"));
}

#[test]
fn stats_reports_a_missing_transcript() {
    imgcheck()
        .args(["stats", "/nonexistent/output.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read transcript"));
}

#[cfg(unix)]
mod headless_run {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    fn fake_checker(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-checker");
        fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn image_file(dir: &Path) -> PathBuf {
        let path = dir.join("fs.img");
        fs::write(&path, [0u8; 64]).unwrap();
        path
    }

    #[test]
    fn all_pass_run_succeeds_with_summary() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_checker(dir.path(), "echo '[PASS] check1'\necho '[PASS] check2'\n");
        let image = image_file(dir.path());

        imgcheck()
            .arg("--checker")
            .arg(&script)
            .arg("run")
            .arg(&image)
            .assert()
            .success()
            .stdout(predicate::str::contains("[PASS] check1"))
            .stdout(predicate::str::contains("Total checks: 2"))
            .stdout(predicate::str::contains("[FAIL]: 0"));
    }

    #[test]
    fn failed_checks_exit_nonzero() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_checker(dir.path(), "echo '[PASS] check1'\necho '[FAIL] check2'\n");
        let image = image_file(dir.path());

        imgcheck()
            .arg("--checker")
            .arg(&script)
            .arg("run")
            .arg(&image)
            .assert()
            .failure()
            .stdout(predicate::str::contains("[FAIL]: 1"));
    }

    #[test]
    fn launch_failure_reports_one_synthetic_error_line() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_file(dir.path());

        imgcheck()
            .args(["--checker", "/nonexistent/imgcheck-no-such-binary"])
            .arg("run")
            .arg(&image)
            .assert()
            .success()
            .stderr(predicate::str::contains("[ERROR]"))
            .stderr(predicate::str::contains("failed to start checker"));
    }
}
