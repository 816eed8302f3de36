use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::tempdir;

fn assert_clean_failure(args: &[&str], flag: &str) {
    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.args(args);
    let output = cmd.assert().failure().get_output().clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("panicked"), "panicked: {stderr}");
    assert!(stderr.contains(flag), "stderr was: {stderr}");
}

#[test]
fn record_rejects_infinite_duration() {
    let dir = tempdir().expect("tempdir");
    let out = dir.path().join("ir.csv");
    assert_clean_failure(
        &[
            "record",
            "--host",
            "127.0.0.1",
            "--port",
            "1",
            "--duration-s",
            "inf",
            "--out",
            out.to_str().expect("utf8 path"),
        ],
        "--duration-s",
    );
    assert!(!out.exists());
}

#[test]
fn record_rejects_negative_duration() {
    let dir = tempdir().expect("tempdir");
    let out = dir.path().join("ir.csv");
    assert_clean_failure(
        &[
            "record",
            "--host",
            "127.0.0.1",
            "--duration-s=-1",
            "--out",
            out.to_str().expect("utf8 path"),
        ],
        "--duration-s",
    );
}

#[test]
fn simulate_rejects_nan_rate() {
    assert_clean_failure(
        &[
            "simulate",
            "--kind",
            "ecg",
            "--rate-hz",
            "NaN",
            "--target",
            "127.0.0.1:9",
            "--samples",
            "1",
        ],
        "--rate-hz",
    );
}

#[test]
fn simulate_rejects_nan_bpm() {
    assert_clean_failure(
        &[
            "simulate",
            "--kind",
            "ecg",
            "--bpm",
            "NaN",
            "--target",
            "127.0.0.1:9",
            "--samples",
            "1",
        ],
        "--bpm",
    );
}

#[test]
fn bpm_rejects_zero_rate() {
    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.args(["bpm", "--fs", "0"]).write_stdin("1\n2\n1\n");
    let output = cmd.assert().failure().get_output().clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--fs"), "stderr was: {stderr}");
}
