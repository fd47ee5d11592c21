use std::process::Command;
use std::thread;

use assert_cmd::prelude::*;
use mftp::{DiskRecorder, FtpServer, NaiveThreadPool, SessionOptions, ThreadPool};
use predicates::str::contains;
use tempfile::TempDir;

#[test]
fn client_cli_without_command_shows_help() {
    Command::cargo_bin("mftp-client")
        .unwrap()
        .assert()
        .failure()
        .stderr(contains("USAGE"));
}

#[test]
fn client_cli_rejects_bad_address() {
    Command::cargo_bin("mftp-client")
        .unwrap()
        .args(&["list", "--addr", "not-an-address"])
        .assert()
        .failure()
        .stderr(contains("could not parse not-an-address"));
}

#[test]
fn server_cli_rejects_bad_thread_count() {
    let dir = TempDir::new().unwrap();
    Command::cargo_bin("mftp-server")
        .unwrap()
        .args(&["--addr", "127.0.0.1:0", "--threads", "zero"])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(contains("invalid thread count"));
}

#[test]
fn server_cli_rejects_unknown_log_level() {
    let dir = TempDir::new().unwrap();
    Command::cargo_bin("mftp-server")
        .unwrap()
        .args(&["--addr", "127.0.0.1:0", "--log-level", "chatty"])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(contains("isn't a valid value"));
    assert!(!dir.path().join("state.json").exists());
}

#[test]
fn server_cli_fails_when_port_is_taken() {
    let dir = TempDir::new().unwrap();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = taken.local_addr().unwrap().to_string();
    Command::cargo_bin("mftp-server")
        .unwrap()
        .args(&["--addr", &addr, "--dir"])
        .arg(dir.path())
        .assert()
        .failure();
}

#[test]
fn client_cli_round_trips_a_file() {
    let dir = TempDir::new().unwrap();
    let serve_dir = dir.path().join("served");
    let recorder = DiskRecorder::open(&serve_dir).unwrap();
    let server = FtpServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        recorder,
        NaiveThreadPool::new(0).unwrap(),
        SessionOptions::new(&serve_dir),
    )
    .unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let shutdown = server.shutdown_handle().unwrap();
    let handle = thread::spawn(move || server.run());

    let local = dir.path().join("local.txt");
    std::fs::write(&local, b"payload from the cli").unwrap();

    Command::cargo_bin("mftp-client")
        .unwrap()
        .args(&["--addr", &addr, "put"])
        .arg(&local)
        .arg("remote.txt")
        .assert()
        .success()
        .stdout(contains("PUT complete: remote.txt (20 bytes)"));
    assert_eq!(
        std::fs::read(serve_dir.join("remote.txt")).unwrap(),
        b"payload from the cli"
    );

    let back = dir.path().join("back.txt");
    Command::cargo_bin("mftp-client")
        .unwrap()
        .args(&["--addr", &addr, "get", "remote.txt"])
        .arg(&back)
        .assert()
        .success();
    assert_eq!(std::fs::read(&back).unwrap(), b"payload from the cli");

    Command::cargo_bin("mftp-client")
        .unwrap()
        .args(&["--addr", &addr, "hello", "cli"])
        .assert()
        .success()
        .stdout(contains("200 WELCOME cli"));

    Command::cargo_bin("mftp-client")
        .unwrap()
        .args(&["--addr", &addr, "get", "missing.txt"])
        .arg(dir.path().join("missing.txt"))
        .assert()
        .failure()
        .stderr(contains("550 File not found"));
    assert!(!dir.path().join("missing.txt").exists());

    // a refused download leaves an existing local file untouched
    Command::cargo_bin("mftp-client")
        .unwrap()
        .args(&["--addr", &addr, "get", "missing.txt"])
        .arg(&back)
        .assert()
        .failure();
    assert_eq!(std::fs::read(&back).unwrap(), b"payload from the cli");

    shutdown.shutdown();
    handle.join().unwrap().unwrap();
}
