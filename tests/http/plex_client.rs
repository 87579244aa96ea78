use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use downshiftarr::config::PlexConfig;
use downshiftarr::error::PlexError;
use downshiftarr::media_server::{
    Catalog, ClientControl, ClientHandle, ClientRoute, DirectTermination, MediaServer,
    PlexConnector, PlexServer, ServerConnector, SessionDirectory,
};
use downshiftarr::quality::DynamicRange;

fn config(server: &MockServer) -> PlexConfig {
    PlexConfig {
        url: format!("{}/", server.uri()),
        token: "plex-token".into(),
        ..PlexConfig::default()
    }
}

async fn mount_identity(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/identity"))
        .and(header("X-Plex-Token", "plex-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaContainer": {"machineIdentifier": "srv-123", "version": "1.40"}
        })))
        .mount(server)
        .await;
}

async fn connected(server: &MockServer) -> PlexServer {
    mount_identity(server).await;
    PlexServer::connect(&config(server)).await.unwrap()
}

#[tokio::test]
async fn connect_records_identity_and_effective_token() {
    let server = MockServer::start().await;
    let plex = connected(&server).await;

    let identity = plex.identity();
    assert_eq!(identity.machine_identifier, "srv-123");
    assert_eq!(identity.base_url, server.uri());
    assert_eq!(identity.effective_token, "plex-token");
    assert!(!format!("{identity:?}").contains("plex-token"));
}

#[tokio::test]
async fn connect_surfaces_rejected_token_as_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/identity"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = PlexServer::connect(&config(&server)).await.err().unwrap();
    assert!(matches!(err, PlexError::Status { status: 401, .. }));
}

#[tokio::test]
async fn sessions_are_listed_with_probed_fields() {
    let server = MockServer::start().await;
    let plex = connected(&server).await;
    Mock::given(method("GET"))
        .and(path("/status/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaContainer": {"size": 2, "Metadata": [
                {
                    "sessionKey": "37", "ratingKey": "5512", "viewOffset": 65000,
                    "Session": {"id": "sess-xyz"},
                    "User": {"id": "7", "title": "alice"},
                    "Player": {"machineIdentifier": "roku-abc", "title": "Living Room",
                               "address": "10.0.0.42", "port": 8060},
                    "Media": [{"id": 900, "videoResolution": "4k", "selected": true,
                               "Part": [{"Stream": [{"streamType": 1, "colorTrc": "smpte2084"}]}]}]
                },
                {"sessionKey": 38}
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sessions = plex.list_active_sessions().await.unwrap();
    assert_eq!(sessions.len(), 2);

    let first = &sessions[0];
    assert_eq!(first.session_key().as_deref(), Some("37"));
    assert_eq!(first.session_id().as_deref(), Some("sess-xyz"));
    assert_eq!(first.machine_id().as_deref(), Some("roku-abc"));
    assert_eq!(first.player_port(), Some(8060));
    assert_eq!(first.view_offset_ms(), 65000);
    let media = first.current_media().unwrap();
    assert_eq!(media.id.as_deref(), Some("900"));
    assert_eq!(media.height, Some(2160));
    assert_eq!(media.dynamic_range, DynamicRange::Hdr);

    assert_eq!(sessions[1].session_key().as_deref(), Some("38"));
    assert_eq!(sessions[1].current_media(), None);
}

#[tokio::test]
async fn catalog_item_exposes_every_version() {
    let server = MockServer::start().await;
    let plex = connected(&server).await;
    Mock::given(method("GET"))
        .and(path("/library/metadata/5512"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaContainer": {"Metadata": [{
                "ratingKey": "5512", "title": "Dune",
                "Media": [
                    {"id": 900, "height": 2160, "Part": [{"Stream": [{"streamType": 1, "DOVIPresent": true}]}]},
                    {"id": 901, "height": 1080, "videoDynamicRange": "SDR"},
                    {"id": 902, "videoResolution": "720"}
                ]
            }]}
        })))
        .mount(&server)
        .await;

    let item = plex.fetch_item("5512").await.unwrap();
    assert_eq!(item.title.as_deref(), Some("Dune"));
    assert_eq!(item.key(), "/library/metadata/5512");
    let summary: Vec<_> = item
        .versions
        .iter()
        .map(|v| (v.index, v.height, v.dynamic_range))
        .collect();
    assert_eq!(
        summary,
        vec![
            (0, Some(2160), DynamicRange::DolbyVision),
            (1, Some(1080), DynamicRange::Sdr),
            (2, Some(720), DynamicRange::Unknown),
        ]
    );
}

#[tokio::test]
async fn missing_catalog_item_is_item_not_found() {
    let server = MockServer::start().await;
    let plex = connected(&server).await;
    Mock::given(method("GET"))
        .and(path("/library/metadata/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"MediaContainer": {"size": 0}})))
        .mount(&server)
        .await;

    let err = plex.fetch_item("1").await.unwrap_err();
    assert!(matches!(err, PlexError::ItemNotFound(ref k) if k == "1"));
}

#[tokio::test]
async fn play_media_is_relayed_with_target_header_and_offset() {
    let server = MockServer::start().await;
    let plex = connected(&server).await;
    Mock::given(method("GET"))
        .and(path("/player/playback/playMedia"))
        .and(header("X-Plex-Target-Client-Identifier", "roku-abc"))
        .and(query_param("key", "/library/metadata/5512"))
        .and(query_param("mediaIndex", "1"))
        .and(query_param("offset", "65000"))
        .and(query_param("machineIdentifier", "srv-123"))
        .and(query_param("commandID", "1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/player/playback/seekTo"))
        .and(query_param("offset", "65000"))
        .and(query_param("commandID", "2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let item = downshiftarr::media_server::CatalogItem {
        rating_key: "5512".into(),
        title: None,
        versions: Vec::new(),
    };
    let client = ClientHandle {
        machine_identifier: "roku-abc".into(),
        title: None,
        route: ClientRoute::ServerRelay,
    };
    plex.play_media(&client, &item, 1, 65000).await.unwrap();
    plex.seek_to(&client, 65000).await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn clients_are_enumerated() {
    let server = MockServer::start().await;
    let plex = connected(&server).await;
    Mock::given(method("GET"))
        .and(path("/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaContainer": {"Server": [
                {"name": "Living Room", "machineIdentifier": "roku-abc",
                 "address": "10.0.0.42", "port": 8060, "protocol": "plex"}
            ]}
        })))
        .mount(&server)
        .await;

    let clients = plex.enumerate_clients().await.unwrap();
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].name.as_deref(), Some("Living Room"));
    assert_eq!(clients[0].base_url().as_deref(), Some("plex://10.0.0.42:8060"));
}

#[tokio::test]
async fn stop_session_uses_session_id() {
    let server = MockServer::start().await;
    let plex = connected(&server).await;
    Mock::given(method("GET"))
        .and(path("/status/sessions/terminate"))
        .and(query_param("sessionId", "sess-xyz"))
        .and(query_param("reason", "pick 1080p"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = downshiftarr::media_server::SessionSnapshot::new(json!({
        "sessionKey": "37", "Session": {"id": "sess-xyz"}
    }));
    plex.stop_session(&snapshot, "pick 1080p").await.unwrap();

    let anonymous = downshiftarr::media_server::SessionSnapshot::new(json!({"sessionKey": "37"}));
    let err = plex.stop_session(&anonymous, "bye").await.unwrap_err();
    assert!(matches!(err, PlexError::Unaddressable(_)));
    server.verify().await;
}

#[tokio::test]
async fn direct_terminator_authenticates_with_the_given_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status/sessions/terminate"))
        .and(header("X-Plex-Token", "effective"))
        .and(query_param("sessionId", "sess-xyz"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let terminator = PlexConnector::new(&config(&server)).direct_terminator();
    terminator
        .terminate_session("sess-xyz", "bye", "effective")
        .await
        .unwrap();
    server.verify().await;
}

#[tokio::test]
async fn connector_and_direct_terminator_share_one_client() {
    let server = MockServer::start().await;
    mount_identity(&server).await;
    Mock::given(method("GET"))
        .and(path("/status/sessions/terminate"))
        .and(header("X-Plex-Client-Identifier", "downshiftarr-shared"))
        .and(query_param("sessionId", "sess-xyz"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let connector = PlexConnector::new(&PlexConfig {
        client_identifier: "downshiftarr-shared".into(),
        ..config(&server)
    });
    let plex = connector.connect().await.unwrap();
    let session = downshiftarr::media_server::SessionSnapshot::new(json!({
        "Session": {"id": "sess-xyz"}
    }));
    plex.stop_session(&session, "bye").await.unwrap();

    let terminator = connector.direct_terminator();
    terminator
        .terminate_session("sess-xyz", "bye", &plex.identity().effective_token)
        .await
        .unwrap();
    server.verify().await;
}
