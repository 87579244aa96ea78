use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use downshiftarr::config::{NotifyLevel, TautulliConfig};
use downshiftarr::error::MonitorError;
use downshiftarr::monitor::{MonitoringService, TautulliClient, TerminationTarget};

fn client(server: &MockServer, notifier_id: Option<u32>) -> TautulliClient {
    TautulliClient::new(&TautulliConfig {
        url: server.uri(),
        api_key: "tautulli-key".into(),
        notifier_id,
        ..TautulliConfig::default()
    })
}

fn ack(result: &str) -> ResponseTemplate {
    let message = (result != "success").then_some("Invalid session");
    ResponseTemplate::new(200).set_body_json(json!({
        "response": {"result": result, "message": message, "data": {}}
    }))
}

#[tokio::test]
async fn terminate_prefers_session_key_and_needs_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2"))
        .and(query_param("apikey", "tautulli-key"))
        .and(query_param("cmd", "terminate_session"))
        .and(query_param("session_key", "37"))
        .and(query_param("message", "pick 1080p"))
        .respond_with(ack("success"))
        .expect(1)
        .mount(&server)
        .await;

    let target = TerminationTarget {
        session_key: Some("37".into()),
        session_id: Some("sess-xyz".into()),
    };
    client(&server, None)
        .terminate(&target, "pick 1080p")
        .await
        .unwrap();
    server.verify().await;
}

#[tokio::test]
async fn terminate_without_success_ack_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2"))
        .and(query_param("session_id", "sess-xyz"))
        .respond_with(ack("error"))
        .mount(&server)
        .await;

    let target = TerminationTarget {
        session_key: None,
        session_id: Some("sess-xyz".into()),
    };
    let err = client(&server, None).terminate(&target, "bye").await.unwrap_err();
    assert!(matches!(err, MonitorError::Rejected { ref message, .. } if message == "Invalid session"));
}

#[tokio::test]
async fn http_error_is_a_request_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let target = TerminationTarget {
        session_key: Some("37".into()),
        session_id: None,
    };
    let err = client(&server, None).terminate(&target, "bye").await.unwrap_err();
    assert!(matches!(err, MonitorError::Request { .. }));
}

#[tokio::test]
async fn notify_is_gated_by_notifier_and_level() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2"))
        .and(query_param("cmd", "notify"))
        .and(query_param("notifier_id", "3"))
        .and(query_param("subject", "Downshiftarr: TERMINATED"))
        .respond_with(ack("success"))
        .expect(1)
        .mount(&server)
        .await;

    // No notifier: nothing is sent.
    client(&server, None)
        .notify(NotifyLevel::Error, "Downshiftarr: TERMINATED", "body")
        .await
        .unwrap();

    let with_notifier = client(&server, Some(3));
    // Below the default warning minimum.
    with_notifier
        .notify(NotifyLevel::Info, "Downshiftarr: SWITCHED", "body")
        .await
        .unwrap();
    with_notifier
        .notify(NotifyLevel::Warning, "Downshiftarr: TERMINATED", "body")
        .await
        .unwrap();

    server.verify().await;
}
