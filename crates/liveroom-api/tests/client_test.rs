// Integration tests for `LiveClient` using wiremock.
#![allow(clippy::unwrap_used)]

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use liveroom_api::{Error, LiveClient, NewLive};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, LiveClient) {
    let server = MockServer::start().await;
    let client = LiveClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    (server, client)
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_list_lives() {
    let (server, client) = setup().await;

    let body = json!([
        {
            "id": "a1",
            "live_url": "https://live.bilibili.com/1",
            "platform_cn_name": "哔哩哔哩",
            "host_name": "host-a",
            "nick_name": "Alice",
            "room_name": "Morning show",
            "listening": true,
            "recording": true
        },
        {
            "id": "b2",
            "host_name": "host-b",
            "room_name": "Quiet room",
            "listening": false,
            "initializing": true,
            "last_error": "timeout"
        }
    ]);

    Mock::given(method("GET"))
        .and(path("/api/lives"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let lives = client.list_lives().await.unwrap();

    assert_eq!(lives.len(), 2);
    assert_eq!(lives[0].id, "a1");
    assert_eq!(lives[0].nick_name.as_deref(), Some("Alice"));
    assert!(lives[0].recording);
    assert!(lives[1].initializing);
    assert_eq!(lives[1].last_error.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn test_get_live_keeps_open_fields() {
    let (server, client) = setup().await;

    let body = json!({
        "host_name": "host-a",
        "listening": true,
        "recording": false,
        "platform_rate_limit": 15,
        "scheduler_status": {
            "scheduler_running": true,
            "has_waiters": true,
            "seconds_until_next_request": 4.2
        },
        "rate_limit_info": {
            "waited_seconds": 3.0,
            "next_request_in_sec": 0.0,
            "min_interval_sec": 15.0
        },
        "effective_interval": 30
    });

    Mock::given(method("GET"))
        .and(path("/api/lives/a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let detail = client.get_live("a1").await.unwrap();

    assert_eq!(detail["platform_rate_limit"], json!(15));
    assert_eq!(detail["effective_interval"], json!(30));
    assert_eq!(detail["scheduler_status"]["has_waiters"], json!(true));
}

#[tokio::test]
async fn test_get_logs_sends_line_count() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/lives/a1/logs"))
        .and(query_param("lines", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lines": ["one", "two"],
            "total": 2,
            "max_lines": 100
        })))
        .mount(&server)
        .await;

    let logs = client.get_logs("a1", 100).await.unwrap();
    assert_eq!(logs.lines, vec!["one".to_owned(), "two".to_owned()]);
    assert_eq!(logs.max_lines, 100);
}

#[tokio::test]
async fn test_force_refresh_success() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/lives/a1/forceRefresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "强制刷新成功",
            "host_name": "host-a",
            "room_name": "Morning show",
            "status": true
        })))
        .mount(&server)
        .await;

    let resp = client.force_refresh("a1").await.unwrap();
    assert!(resp.success);
    assert_eq!(resp.host_name.as_deref(), Some("host-a"));
}

#[tokio::test]
async fn test_start_listening() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/lives/a1/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "a1",
            "listening": true
        })))
        .mount(&server)
        .await;

    let live = client.start_listening("a1").await.unwrap();
    assert!(live.listening);
}

#[tokio::test]
async fn test_add_lives_posts_url_list() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/lives"))
        .and(body_json(json!([
            {"url": "https://live.bilibili.com/493", "listen": true}
        ])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "c3", "host_name": "host-c", "listening": true}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let added = client
        .add_lives(&[NewLive {
            url: "https://live.bilibili.com/493".into(),
            listen: true,
        }])
        .await
        .unwrap();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].id, "c3");
}

#[tokio::test]
async fn test_remove_live_without_files_sends_no_body() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/lives/a1"))
        .and(body_string(""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "OK"})))
        .expect(1)
        .mount(&server)
        .await;

    client.remove_live("a1", false).await.unwrap();
}

#[tokio::test]
async fn test_remove_live_with_files() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/lives/a1"))
        .and(body_json(json!({"delete_files": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "OK"})))
        .expect(1)
        .mount(&server)
        .await;

    client.remove_live("a1", true).await.unwrap();
}

// ── Error-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_remove_unknown_room_is_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/lives/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "err_no": 404,
            "err_msg": "live id: missing can not find"
        })))
        .mount(&server)
        .await;

    let err = client.remove_live("missing", false).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_force_refresh_failure_maps_err_msg() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/lives/a1/forceRefresh"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "err_no": 500,
            "err_msg": "force refresh failed: upstream timeout"
        })))
        .mount(&server)
        .await;

    let err = client.force_refresh("a1").await.unwrap_err();
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "force refresh failed: upstream timeout");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_room_is_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/lives/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "err_no": 404,
            "err_msg": "live id: missing can not find"
        })))
        .mount(&server)
        .await;

    let err = client.get_live("missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/lives"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client.list_lives().await.unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert_eq!(body, "<html>oops</html>"),
        other => panic!("expected Deserialization error, got {other:?}"),
    }
}
