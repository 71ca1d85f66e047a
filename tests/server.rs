//! HTTP API tests against a spawned `intake serve` process.

use std::fs;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::time::{Duration, Instant};

use base64::Engine;
use tempfile::TempDir;

const BIND: &str = "127.0.0.1:17432";

fn intake_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("intake");
    path
}

/// Kills the server process when the test ends, pass or fail.
struct ServerGuard(Child);

impl Drop for ServerGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn start_server() -> (TempDir, ServerGuard) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/intake.sqlite"

[objects]
root = "{}/data/objects"

[server]
bind = "{}"
"#,
        root.display(),
        root.display(),
        BIND
    );
    let config_path = root.join("config").join("intake.toml");
    fs::write(&config_path, config_content).unwrap();

    let binary = intake_binary();
    let status = Command::new(&binary)
        .arg("--config")
        .arg(&config_path)
        .arg("init")
        .status()
        .unwrap();
    assert!(status.success(), "init failed");

    let child = Command::new(&binary)
        .arg("--config")
        .arg(&config_path)
        .arg("serve")
        .spawn()
        .unwrap();
    let guard = ServerGuard(child);

    // Wait for the server to come up.
    let client = reqwest::blocking::Client::new();
    let deadline = Instant::now() + Duration::from_secs(15);
    loop {
        if let Ok(resp) = client.get(format!("http://{}/health", BIND)).send() {
            if resp.status().is_success() {
                break;
            }
        }
        assert!(Instant::now() < deadline, "server did not start in time");
        std::thread::sleep(Duration::from_millis(100));
    }

    (tmp, guard)
}

#[test]
fn submit_and_poll_status_over_http() {
    let (_tmp, _guard) = start_server();
    let client = reqwest::blocking::Client::new();

    let payload = base64::engine::general_purpose::STANDARD.encode("hello over http");
    let resp = client
        .post(format!("http://{}/ingestions", BIND))
        .json(&serde_json::json!({
            "source_type": "api",
            "mime_type": "text/plain",
            "payload": payload,
        }))
        .send()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 202);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["status"], "queued");
    let id = body["ingestion_id"].as_str().unwrap().to_string();

    // Processing runs on its own task; poll until terminal.
    let deadline = Instant::now() + Duration::from_secs(15);
    let final_status = loop {
        let resp = client
            .get(format!("http://{}/ingestions/{}", BIND, id))
            .send()
            .unwrap();
        assert!(resp.status().is_success());
        let snapshot: serde_json::Value = resp.json().unwrap();
        let status = snapshot["status"].as_str().unwrap().to_string();
        if status == "complete" || status == "failed" {
            break snapshot;
        }
        assert!(Instant::now() < deadline, "ingestion did not finish in time");
        std::thread::sleep(Duration::from_millis(100));
    };

    assert_eq!(final_status["status"], "complete");
    assert!(final_status["last_error"].is_null());

    // Unknown ids map to the 404 error contract.
    let resp = client
        .get(format!(
            "http://{}/ingestions/00000000-0000-4000-8000-000000000000",
            BIND
        ))
        .send()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["error"]["code"], "not_found");

    // Rejected submissions map to 400 before any record is created.
    let resp = client
        .post(format!("http://{}/ingestions", BIND))
        .json(&serde_json::json!({
            "source_type": "",
            "payload": "",
        }))
        .send()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}
