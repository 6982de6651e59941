//! Integration test: start the server on a free port, GET / and /status, assert JSON.
//! Slack points at a closed local port, so the connection stays down. The server task is left
//! running when the test ends.

use slack_bridge::config::Config;
use slack_bridge::gateway;
use std::path::PathBuf;
use std::time::Duration;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

fn temp_config_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("slack-bridge-server-test-{}", uuid::Uuid::new_v4()))
        .join("config.json")
}

#[tokio::test]
async fn server_health_and_status_respond() {
    let port = free_port();
    let mut config = Config::default();
    config.server.port = port;
    config.server.bind = "127.0.0.1".to_string();
    config.slack.bot_token = Some("xoxb-test".to_string());
    config.slack.api_base = Some(format!("http://127.0.0.1:{}", free_port()));

    let server_handle = tokio::spawn(async move {
        let _ = gateway::run_server(config, temp_config_path()).await;
    });

    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(format!("{}/", base)).send().await {
            Ok(resp) if resp.status().is_success() => {
                let json: serde_json::Value = resp.json().await.expect("parse JSON");
                assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
                assert_eq!(json.get("port").and_then(|v| v.as_u64()), Some(port as u64));

                let status: serde_json::Value = client
                    .get(format!("{}/status", base))
                    .send()
                    .await
                    .expect("GET /status")
                    .json()
                    .await
                    .expect("parse status JSON");
                assert_eq!(status["connected"], false);
                assert_eq!(status["pending"], 0);
                assert_eq!(status["stages"], serde_json::json!(["slack.sendMessages"]));

                let user = client
                    .get(format!("{}/user", base))
                    .send()
                    .await
                    .expect("GET /user");
                assert_eq!(user.status(), reqwest::StatusCode::BAD_REQUEST);
                return;
            }
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    server_handle.abort();
    panic!(
        "GET {}/ did not return 200 with health JSON within 5s; last error: {:?}",
        base, last_err
    );
}
