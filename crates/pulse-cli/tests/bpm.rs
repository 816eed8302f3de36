use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::{error::Error, path::PathBuf};

#[derive(Deserialize)]
struct BpmReport {
    samples: usize,
    peaks: usize,
    bpm: Option<f64>,
}

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

fn sample_path(rel: &str) -> String {
    workspace_root().join(rel).to_string_lossy().into_owned()
}

fn run_bpm(args: &[&str]) -> Result<BpmReport, Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.arg("bpm").args(args);
    let output = cmd.assert().success().get_output().stdout.clone();
    Ok(serde_json::from_slice(&output)?)
}

#[test]
fn bpm_from_newline_series_uses_trailing_window() -> Result<(), Box<dyn Error>> {
    let input = sample_path("test_data/ppg_75bpm.txt");
    let report = run_bpm(&["--input", &input])?;
    assert_eq!(report.samples, 200);
    assert_eq!(report.peaks, 31);
    let bpm = report.bpm.expect("bpm");
    assert!((bpm - 75.0).abs() < 1e-6, "bpm was {bpm}");
    Ok(())
}

#[test]
fn bpm_from_recorded_csv() -> Result<(), Box<dyn Error>> {
    let input = sample_path("test_data/ppg_recording.csv");
    let report = run_bpm(&["--input", &input])?;
    assert_eq!(report.samples, 200);
    let bpm = report.bpm.expect("bpm");
    assert!((bpm - 75.0).abs() < 1e-6, "bpm was {bpm}");
    Ok(())
}

#[test]
fn sample_rate_scales_estimate() -> Result<(), Box<dyn Error>> {
    let input = sample_path("test_data/ppg_75bpm.txt");
    let report = run_bpm(&["--input", &input, "--fs", "16"])?;
    let bpm = report.bpm.expect("bpm");
    assert!((bpm - 150.0).abs() < 1e-6, "bpm was {bpm}");
    Ok(())
}

#[test]
fn flat_stdin_has_no_estimate() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.arg("bpm").write_stdin("500\n500\n500\n500\n");
    let output = cmd.assert().success().get_output().stdout.clone();
    let report: BpmReport = serde_json::from_slice(&output)?;
    assert_eq!(report.samples, 4);
    assert_eq!(report.peaks, 0);
    assert!(report.bpm.is_none());
    Ok(())
}

#[test]
fn garbage_input_fails() {
    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.arg("bpm").write_stdin("512\nnot-a-number\n");
    cmd.assert().failure();
}
