use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::{error::Error, fs, io::Write, net::TcpListener, thread};
use tempfile::tempdir;

#[test]
fn record_writes_csv_until_peer_closes() -> Result<(), Box<dyn Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    let server = thread::spawn(move || {
        let (mut conn, _) = listener.accept().expect("accept");
        conn.write_all(b"600\n60").expect("write");
        conn.write_all(b"5\nbad\n610\n").expect("write");
    });

    let dir = tempdir()?;
    let out = dir.path().join("ir.csv");
    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.args([
        "record",
        "--kind",
        "ppg",
        "--host",
        "127.0.0.1",
        "--port",
        &port.to_string(),
        "--duration-s",
        "10",
        "--out",
        out.to_str().expect("utf8 path"),
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    server.join().expect("server");

    let summary: Value = serde_json::from_slice(&output)?;
    assert_eq!(summary["samples"], 3);
    assert_eq!(summary["rejected"], 1);
    assert_eq!(summary["kind"], "ppg");

    let text = fs::read_to_string(&out)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Timestamp,IR Value");
    assert_eq!(lines.len(), 4);
    assert!(lines[1].ends_with(",600.0"));
    assert!(lines[2].ends_with(",605.0"));
    assert!(lines[3].ends_with(",610.0"));
    Ok(())
}

#[test]
fn record_fails_on_empty_host() {
    let dir = tempdir().expect("tempdir");
    let out = dir.path().join("ir.csv");
    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.args([
        "record",
        "--kind",
        "ppg",
        "--host",
        "",
        "--duration-s",
        "1",
        "--out",
        out.to_str().expect("utf8 path"),
    ]);
    cmd.assert().failure();
    assert!(!out.exists());
}
