use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use downshiftarr::enforcement::TerminationRoute;
use downshiftarr::error::FailureKind;
use downshiftarr::media_server::PlexConnector;
use downshiftarr::monitor::{MonitoringService, TautulliClient};
use downshiftarr::{Config, Enforcer, InputEvent, Outcome};

fn config(plex: &MockServer, tautulli: Option<&MockServer>) -> Config {
    let mut config = Config::default();
    config.plex.url = plex.uri();
    config.plex.token = "plex-token".into();
    if let Some(tautulli) = tautulli {
        config.tautulli.url = tautulli.uri();
        config.tautulli.api_key = "tautulli-key".into();
    }
    config.policy.preferred_heights = vec![1080, 720];
    config.retry.session_attempts = 2;
    config.retry.session_delay_ms = 0;
    config.retry.seek_settle_ms = 0;
    config
}

fn event(decision: &str) -> InputEvent {
    InputEvent {
        rating_key: Some("5512".into()),
        machine_id: Some("roku-abc".into()),
        username: Some("alice".into()),
        session_id: Some("sess-xyz".into()),
        session_key: Some("37".into()),
        video_decision: Some(decision.into()),
        ..InputEvent::default()
    }
}

async fn enforce(config: &Config, event: &InputEvent) -> Outcome {
    let connector = PlexConnector::new(&config.plex);
    let direct = connector.direct_terminator();
    let tautulli = config
        .tautulli
        .is_configured()
        .then(|| TautulliClient::new(&config.tautulli));
    let monitor = tautulli.as_ref().map(|t| t as &dyn MonitoringService);
    Enforcer::new(config, &connector, monitor, &direct)
        .enforce(event)
        .await
}

async fn mount_identity(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/identity"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaContainer": {"machineIdentifier": "srv-123"}
        })))
        .mount(server)
        .await;
}

async fn mount_sessions(server: &MockServer, sessions: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/status/sessions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"MediaContainer": {"Metadata": sessions}})),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn direct_play_makes_no_server_calls() {
    let plex = MockServer::start().await;
    let outcome = enforce(&config(&plex, None), &event("direct play")).await;

    assert_eq!(outcome, Outcome::NotTranscoding);
    let received = plex
        .received_requests()
        .await
        .expect("mock server should record received requests");
    assert!(received.is_empty());
}

#[tokio::test]
async fn uhd_sdr_transcode_is_switched_to_1080_at_buffered_offset() {
    let plex = MockServer::start().await;
    mount_identity(&plex).await;
    mount_sessions(
        &plex,
        json!([{
            "sessionKey": "37", "ratingKey": "5512", "viewOffset": 65000,
            "Session": {"id": "sess-xyz"},
            "User": {"title": "alice"},
            "Player": {"machineIdentifier": "roku-abc", "title": "Living Room"},
            "Media": [{"id": "900", "height": 2160, "videoDynamicRange": "SDR", "selected": true}]
        }]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/library/metadata/5512"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaContainer": {"Metadata": [{
                "ratingKey": "5512", "title": "Dune",
                "Media": [
                    {"id": "900", "height": 2160, "videoDynamicRange": "SDR"},
                    {"id": "901", "height": 1080, "videoDynamicRange": "SDR"},
                    {"id": "902", "height": 720, "videoDynamicRange": "SDR"}
                ]
            }]}
        })))
        .mount(&plex)
        .await;
    Mock::given(method("GET"))
        .and(path("/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaContainer": {"Server": [{"name": "Living Room", "machineIdentifier": "roku-abc"}]}
        })))
        .mount(&plex)
        .await;
    Mock::given(method("GET"))
        .and(path("/player/playback/playMedia"))
        .and(header("X-Plex-Target-Client-Identifier", "roku-abc"))
        .and(query_param("mediaIndex", "1"))
        .and(query_param("offset", "65000"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&plex)
        .await;
    Mock::given(method("GET"))
        .and(path("/player/playback/seekTo"))
        .and(query_param("offset", "65000"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&plex)
        .await;

    let outcome = enforce(&config(&plex, None), &event("transcode")).await;
    assert_eq!(outcome, Outcome::Switched { media_index: 1 });
    plex.verify().await;
}

#[tokio::test]
async fn unresolvable_session_is_terminated_through_tautulli() {
    let plex = MockServer::start().await;
    let tautulli = MockServer::start().await;
    mount_identity(&plex).await;
    mount_sessions(&plex, json!([])).await;
    Mock::given(method("GET"))
        .and(path("/api/v2"))
        .and(query_param("cmd", "terminate_session"))
        .and(query_param("session_key", "37"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {"result": "success", "message": null, "data": {}}
        })))
        .expect(1)
        .mount(&tautulli)
        .await;

    let outcome = enforce(&config(&plex, Some(&tautulli)), &event("transcode")).await;
    assert_eq!(
        outcome,
        Outcome::Terminated {
            kind: FailureKind::SessionNotFound,
            route: Some(TerminationRoute::MonitoringService),
        }
    );
    tautulli.verify().await;

    let session_queries = plex
        .received_requests()
        .await
        .expect("mock server should record received requests")
        .iter()
        .filter(|r| r.url.path() == "/status/sessions")
        .count();
    assert_eq!(session_queries, 2);
}

#[tokio::test]
async fn unreachable_server_falls_back_to_direct_termination() {
    let plex = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/identity"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&plex)
        .await;
    Mock::given(method("GET"))
        .and(path("/status/sessions/terminate"))
        .and(header("X-Plex-Token", "plex-token"))
        .and(query_param("sessionId", "sess-xyz"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&plex)
        .await;

    let outcome = enforce(&config(&plex, None), &event("transcode")).await;
    assert_eq!(
        outcome,
        Outcome::Terminated {
            kind: FailureKind::ConnectFailure,
            route: Some(TerminationRoute::DirectEndpoint),
        }
    );
    plex.verify().await;
}

#[tokio::test]
async fn disabled_toggle_leaves_the_stream_running() {
    let plex = MockServer::start().await;
    mount_identity(&plex).await;
    mount_sessions(&plex, json!([])).await;
    Mock::given(method("GET"))
        .and(path("/status/sessions/terminate"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&plex)
        .await;

    let mut config = config(&plex, None);
    config.enforcement.kill_on_session_not_found = false;
    let outcome = enforce(&config, &event("transcode")).await;
    assert_eq!(
        outcome,
        Outcome::FailureIgnored {
            kind: FailureKind::SessionNotFound
        }
    );
    plex.verify().await;
}
