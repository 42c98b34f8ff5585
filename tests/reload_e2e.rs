// tests/reload_e2e.rs
//
// Drives a real `cargo run` of a throwaway crate through the default import
// source, launcher and notifier.
#![cfg(unix)]

mod common;
use crate::common::{init_tracing, with_timeout_after};

use std::error::Error;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use treeload::Treeloader;
use treeload::config::Options;
use treeload::exec::CargoRunLauncher;

type TestResult = Result<(), Box<dyn Error>>;

/// First builds can be slow on a cold machine.
const BUILD_LIMIT: Duration = Duration::from_secs(180);

const MANIFEST: &str = r#"[package]
name = "echo-server"
version = "0.1.0"
edition = "2021"

[workspace]

[dependencies]
"#;

fn server_source(response: &str) -> String {
    format!(
        r##"use std::io::{{Read, Write}};
use std::net::TcpListener;

fn main() {{
    let port = std::env::args().nth(1).expect("port");
    let listener = TcpListener::bind(("127.0.0.1", port.parse::<u16>().unwrap())).unwrap();
    for stream in listener.incoming() {{
        let mut stream = match stream {{
            Ok(s) => s,
            Err(_) => continue,
        }};
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf);
        let body = r#"{{"response":"{response}"}}"#;
        let reply = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {{}}\r\nconnection: close\r\n\r\n{{}}",
            body.len(),
            body
        );
        let _ = stream.write_all(reply.as_bytes());
    }}
}}
"##
    )
}

fn free_port() -> std::io::Result<u16> {
    Ok(TcpListener::bind("127.0.0.1:0")?.local_addr()?.port())
}

async fn fetch(port: u16) -> Option<String> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.ok()?;
    stream
        .write_all(b"GET / HTTP/1.1\r\nhost: localhost\r\n\r\n")
        .await
        .ok()?;
    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.ok()?;
    let (_, body) = raw.split_once("\r\n\r\n")?;
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("response")?.as_str().map(str::to_string)
}

/// Poll the endpoint until it answers with `want`.
async fn wait_for_response(port: u16, want: &str) {
    loop {
        if fetch(port).await.as_deref() == Some(want) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

fn write_crate(root: &Path, response: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(root.join("src"))?;
    std::fs::write(root.join("Cargo.toml"), MANIFEST)?;
    std::fs::write(root.join("src/main.rs"), server_source(response))
}

#[tokio::test]
async fn overwritten_entry_serves_the_new_response() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path().canonicalize()?;
    write_crate(&root, "before")?;
    let entry = root.join("src/main.rs");
    let port = free_port()?;

    let (reload_tx, mut reloads) = mpsc::channel(16);
    let (error_tx, mut errors) = mpsc::channel(16);
    let mut loader = Treeloader::builder(Options::new(&entry).verbose(true))
        .launcher(CargoRunLauncher::new().args([port.to_string()]))
        .reload_channel(reload_tx)
        .error_channel(error_tx)
        .start()?;

    let startup = with_timeout_after(BUILD_LIMIT, reloads.recv())
        .await
        .expect("startup notification");
    assert!(startup.is_startup());
    assert!(errors.try_recv().is_err(), "startup cycle reported an error");

    with_timeout_after(BUILD_LIMIT, wait_for_response(port, "before")).await;

    std::fs::write(&entry, server_source("after"))?;
    loop {
        let reload = with_timeout_after(BUILD_LIMIT, reloads.recv())
            .await
            .expect("reload notification");
        if reload.path().ends_with("src/main.rs") {
            break;
        }
    }

    with_timeout_after(BUILD_LIMIT, wait_for_response(port, "after")).await;

    loader.close().await?;
    // The old server went down with its process group.
    assert!(fetch(port).await.is_none());
    Ok(())
}
