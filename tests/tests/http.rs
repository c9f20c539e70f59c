//! HTTP surface tests.
//!
//! Drive the real axum router of each node with axum-test.

use axum::http::StatusCode;
use axum_test::{TestResponse, TestServer};
use integration_tests::fixtures::{cookie_value, session_cookie, user_data};
use integration_tests::{settle, TestCluster};
use serde_json::{json, Value};
use session_core::{Command, Reply};

/// `Set-Cookie` values of a response.
fn set_cookies(response: &TestResponse) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

fn session_id_from(response: &TestResponse) -> String {
    set_cookies(response)
        .iter()
        .find_map(|c| cookie_value(c))
        .expect("response should set the session cookie")
}

#[tokio::test]
async fn test_get_without_cookie_is_not_found() {
    let cluster = TestCluster::new(1);
    let server = TestServer::new(cluster.node(1).router()).expect("Failed to create test server");

    let response = server.get("/session").await;
    response.assert_status(StatusCode::NOT_FOUND);

    let body: Value = response.json();
    assert_eq!(body["code"], "SESS_004");
    assert!(set_cookies(&response).is_empty());
}

#[tokio::test]
async fn test_put_starts_session_and_sets_cookie() {
    let cluster = TestCluster::new(1);
    let server = TestServer::new(cluster.node(1).router()).expect("Failed to create test server");

    let response = server.put("/session").json(&user_data("alice")).await;
    response.assert_status_ok();

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].contains("Path=/"));
    assert!(cookies[0].contains("HttpOnly"));

    let id = session_id_from(&response);
    let body: Value = response.json();
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["saved"], true);
    assert_eq!(body["data"]["user"], "alice");
}

#[tokio::test]
async fn test_session_created_on_one_node_is_served_by_another() {
    let cluster = TestCluster::new(2);
    let a = TestServer::new(cluster.node(1).router()).expect("Failed to create test server");
    let b = TestServer::new(cluster.node(2).router()).expect("Failed to create test server");

    let response = a.put("/session").json(&json!({"user": "alice"})).await;
    let id = session_id_from(&response);

    let response = b
        .get("/session")
        .add_header("Cookie", &session_cookie(&id))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["data"]["user"], "alice");
    assert!(set_cookies(&response).is_empty());
}

#[tokio::test]
async fn test_put_merges_into_existing_session() {
    let cluster = TestCluster::new(1);
    let server = TestServer::new(cluster.node(1).router()).expect("Failed to create test server");

    let response = server.put("/session").json(&json!({"user": "alice"})).await;
    let id = session_id_from(&response);

    let response = server
        .put("/session")
        .add_header("Cookie", &session_cookie(&id))
        .json(&json!({"theme": "dark"}))
        .await;
    response.assert_status_ok();
    assert!(set_cookies(&response).is_empty());

    let body: Value = response.json();
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["data"]["user"], "alice");
    assert_eq!(body["data"]["theme"], "dark");
}

#[tokio::test]
async fn test_put_rejects_non_object_body() {
    let cluster = TestCluster::new(1);
    let server = TestServer::new(cluster.node(1).router()).expect("Failed to create test server");

    let response = server.put("/session").json(&json!(["not", "an", "object"])).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_expires_cookie_and_session() {
    let cluster = TestCluster::new(1);
    let server = TestServer::new(cluster.node(1).router()).expect("Failed to create test server");

    let response = server.put("/session").json(&json!({"user": "alice"})).await;
    let id = session_id_from(&response);
    settle().await;

    let response = server
        .delete("/session")
        .add_header("Cookie", &session_cookie(&id))
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].starts_with("DVSESSID=-1;"));
    assert!(cookies[0].contains("Expires="));

    settle().await;
    assert!(!cluster.store().contains(&id));
    let response = server
        .get("/session")
        .add_header("Cookie", &session_cookie(&id))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bus_endpoint_executes_local_commands() {
    let cluster = TestCluster::new(1);
    let node = cluster.node(1);
    let server = TestServer::new(node.router()).expect("Failed to create test server");

    let path = format!("/bus/{}", node.address());
    let response = server.post(&path).json(&Command::save("s1", "{}")).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Reply>(), Reply::Ack(true));

    let response = server.post(&path).json(&Command::get("s1")).await;
    assert_eq!(response.json::<Reply>(), Reply::Record(Some("{}".into())));

    let response = server.post(&path).json(&json!({"act": 99, "id": "s1"})).await;
    assert_eq!(response.json::<Reply>(), Reply::Empty);
}

#[tokio::test]
async fn test_bus_endpoint_rejects_foreign_address() {
    let cluster = TestCluster::new(2);
    let server = TestServer::new(cluster.node(1).router()).expect("Failed to create test server");

    let path = format!("/bus/{}", cluster.node(2).address());
    let response = server.post(&path).json(&Command::get("s1")).await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_endpoint_structure() {
    let cluster = TestCluster::new(1);
    let node = cluster.node(1);
    let server = TestServer::new(node.router()).expect("Failed to create test server");

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    let status = body["status"].as_str().unwrap_or("");
    assert!(
        status == "healthy" || status == "degraded" || status == "unhealthy",
        "Status should be 'healthy', 'degraded', or 'unhealthy', got '{}'",
        status
    );
    assert_eq!(body["address"], node.address());
    assert!(body["components"].is_array());

    server.get("/health/live").await.assert_status_ok();
    // The node's session server is running.
    server.get("/health/ready").await.assert_status_ok();
}
