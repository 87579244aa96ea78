use super::http_client::build_http_client;
use super::probe::{probe_array, probe_str};
use super::traits::{
    BoxFuture, Catalog, ClientControl, DirectTermination, MediaServer, ServerConnector,
    SessionDirectory,
};
use super::types::{
    CatalogItem, ClientEndpoint, ClientHandle, ClientRoute, ServerIdentity, SessionSnapshot,
};
use crate::config::PlexConfig;
use crate::error::PlexError;
use crate::observability::sanitize_error;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use url::Url;

const PRODUCT: &str = "Downshiftarr";

/// Connected media server. Implements every server-side collaborator seam
/// over one pooled HTTP client.
pub struct PlexServer {
    client: Client,
    identity: ServerIdentity,
    client_identifier: String,
    command_id: AtomicU32,
}

impl PlexServer {
    /// Build a fresh client and verify the server answers `/identity` with
    /// the configured token.
    pub async fn connect(config: &PlexConfig) -> Result<Self, PlexError> {
        Self::connect_with(config, build_http_client(config.timeout_secs)).await
    }

    /// Like [`PlexServer::connect`], over an existing client.
    pub async fn connect_with(config: &PlexConfig, client: Client) -> Result<Self, PlexError> {
        let base_url = config.url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(PlexError::NotConfigured("plex.url".into()));
        }
        if config.token.trim().is_empty() {
            return Err(PlexError::NotConfigured("plex.token".into()));
        }

        let token = config.token.trim().to_string();
        let request = with_plex_headers(
            client.get(format!("{base_url}/identity")),
            &token,
            &config.client_identifier,
        );
        let body = send_json(request, "identity").await?;
        let machine_identifier = probe_str(
            &body,
            &["/MediaContainer/machineIdentifier", "/machineIdentifier"],
        )
        .ok_or_else(|| PlexError::Decode {
            endpoint: "identity".into(),
            message: "missing machineIdentifier".into(),
        })?;

        tracing::info!(
            server = machine_identifier.as_str(),
            url = base_url.as_str(),
            "Connected to media server"
        );

        Ok(Self {
            client,
            identity: ServerIdentity {
                machine_identifier,
                base_url,
                effective_token: token,
            },
            client_identifier: config.client_identifier.clone(),
            command_id: AtomicU32::new(0),
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        with_plex_headers(
            self.client.get(format!("{}{path}", self.identity.base_url)),
            &self.identity.effective_token,
            &self.client_identifier,
        )
    }

    fn next_command_id(&self) -> u32 {
        self.command_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Request for a player command, routed per the handle.
    fn player_command(&self, client: &ClientHandle, command: &str) -> RequestBuilder {
        let path = format!("/player/playback/{command}");
        let request = match &client.route {
            ClientRoute::ServerRelay => self.get(&path),
            ClientRoute::Direct { base_url } => with_plex_headers(
                self.client
                    .get(format!("{}{path}", base_url.trim_end_matches('/'))),
                &self.identity.effective_token,
                &self.client_identifier,
            ),
        };
        request
            .header("X-Plex-Target-Client-Identifier", &client.machine_identifier)
            .query(&[("commandID", self.next_command_id().to_string())])
    }

    /// Where the player should fetch media from.
    fn server_location(&self) -> (String, String, String) {
        Url::parse(&self.identity.base_url)
            .ok()
            .map(|url| {
                (
                    url.scheme().to_string(),
                    url.host_str().unwrap_or_default().to_string(),
                    url.port_or_known_default()
                        .map_or_else(|| "32400".to_string(), |p| p.to_string()),
                )
            })
            .unwrap_or_else(|| ("http".into(), String::new(), "32400".into()))
    }
}

impl MediaServer for PlexServer {
    fn identity(&self) -> &ServerIdentity {
        &self.identity
    }
}

/// Connects a [`PlexServer`] from configuration on demand. Owns the one HTTP
/// client every server-side call goes through.
pub struct PlexConnector {
    config: PlexConfig,
    client: Client,
}

impl PlexConnector {
    pub fn new(config: &PlexConfig) -> Self {
        Self {
            config: config.clone(),
            client: build_http_client(config.timeout_secs),
        }
    }

    /// Direct terminator sharing this connector's connection pool.
    pub fn direct_terminator(&self) -> PlexDirectTerminator {
        PlexDirectTerminator::new(&self.config, self.client.clone())
    }
}

impl ServerConnector for PlexConnector {
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn MediaServer>, PlexError>> {
        Box::pin(async move {
            let server = PlexServer::connect_with(&self.config, self.client.clone()).await?;
            Ok(Box::new(server) as Box<dyn MediaServer>)
        })
    }
}

impl SessionDirectory for PlexServer {
    fn list_active_sessions(&self) -> BoxFuture<'_, Result<Vec<SessionSnapshot>, PlexError>> {
        Box::pin(async move {
            let body = send_json(self.get("/status/sessions"), "status/sessions").await?;
            Ok(probe_array(&body, &["/MediaContainer/Metadata", "/MediaContainer/Video"])
                .iter()
                .cloned()
                .map(SessionSnapshot::new)
                .collect())
        })
    }

    fn stop_session<'a>(
        &'a self,
        session: &'a SessionSnapshot,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<(), PlexError>> {
        Box::pin(async move {
            let session_id = session
                .session_id()
                .ok_or(PlexError::Unaddressable("session id"))?;
            let request = self
                .get("/status/sessions/terminate")
                .query(&[("sessionId", session_id.as_str()), ("reason", reason)]);
            send_empty(request, "status/sessions/terminate").await
        })
    }
}

impl Catalog for PlexServer {
    fn fetch_item<'a>(
        &'a self,
        rating_key: &'a str,
    ) -> BoxFuture<'a, Result<CatalogItem, PlexError>> {
        Box::pin(async move {
            let body = send_json(
                self.get(&format!("/library/metadata/{rating_key}")),
                "library/metadata",
            )
            .await?;
            probe_array(&body, &["/MediaContainer/Metadata", "/MediaContainer/Video"])
                .first()
                .map(|raw| CatalogItem::from_json(rating_key, raw))
                .ok_or_else(|| PlexError::ItemNotFound(rating_key.to_string()))
        })
    }
}

impl ClientControl for PlexServer {
    fn enumerate_clients(&self) -> BoxFuture<'_, Result<Vec<ClientEndpoint>, PlexError>> {
        Box::pin(async move {
            let body = send_json(self.get("/clients"), "clients").await?;
            Ok(probe_array(&body, &["/MediaContainer/Server", "/MediaContainer/Device"])
                .iter()
                .map(ClientEndpoint::from_json)
                .collect())
        })
    }

    fn connect_direct<'a>(
        &'a self,
        address: &'a str,
        port: u16,
    ) -> BoxFuture<'a, Result<ClientEndpoint, PlexError>> {
        Box::pin(async move {
            let request = with_plex_headers(
                self.client
                    .get(format!("http://{address}:{port}/resources")),
                &self.identity.effective_token,
                &self.client_identifier,
            );
            let body = send_json(request, "player resources").await?;
            let player = probe_array(&body, &["/MediaContainer/Player"])
                .first()
                .cloned()
                .unwrap_or(Value::Null);
            let mut endpoint = ClientEndpoint::from_json(&player);
            endpoint.address = Some(address.to_string());
            endpoint.port = Some(port);
            Ok(endpoint)
        })
    }

    fn play_media<'a>(
        &'a self,
        client: &'a ClientHandle,
        item: &'a CatalogItem,
        media_index: usize,
        offset_ms: u64,
    ) -> BoxFuture<'a, Result<(), PlexError>> {
        Box::pin(async move {
            let (protocol, address, port) = self.server_location();
            let request = self.player_command(client, "playMedia").query(&[
                ("key", item.key()),
                ("offset", offset_ms.to_string()),
                ("mediaIndex", media_index.to_string()),
                ("machineIdentifier", self.identity.machine_identifier.clone()),
                ("protocol", protocol),
                ("address", address),
                ("port", port),
                ("type", "video".to_string()),
            ]);
            send_empty(request, "playMedia").await
        })
    }

    fn seek_to<'a>(
        &'a self,
        client: &'a ClientHandle,
        offset_ms: u64,
    ) -> BoxFuture<'a, Result<(), PlexError>> {
        Box::pin(async move {
            let request = self.player_command(client, "seekTo").query(&[
                ("offset", offset_ms.to_string()),
                ("type", "video".to_string()),
            ]);
            send_empty(request, "seekTo").await
        })
    }
}

/// Termination addressed straight at the server's terminate endpoint. Used
/// when no resolved session handle is available, including when the connect
/// check failed and no [`PlexServer`] exists.
pub struct PlexDirectTerminator {
    base_url: String,
    client: Client,
    client_identifier: String,
}

impl PlexDirectTerminator {
    pub fn new(config: &PlexConfig, client: Client) -> Self {
        Self {
            base_url: config.url.trim().trim_end_matches('/').to_string(),
            client,
            client_identifier: config.client_identifier.clone(),
        }
    }
}

impl DirectTermination for PlexDirectTerminator {
    fn terminate_session<'a>(
        &'a self,
        session_id: &'a str,
        reason: &'a str,
        token: &'a str,
    ) -> BoxFuture<'a, Result<(), PlexError>> {
        Box::pin(async move {
            if self.base_url.is_empty() {
                return Err(PlexError::NotConfigured("plex.url".into()));
            }
            let request = with_plex_headers(
                self.client
                    .get(format!("{}/status/sessions/terminate", self.base_url)),
                token,
                &self.client_identifier,
            )
            .query(&[("sessionId", session_id), ("reason", reason)]);
            send_empty(request, "status/sessions/terminate").await
        })
    }
}

fn with_plex_headers(request: RequestBuilder, token: &str, client_identifier: &str) -> RequestBuilder {
    request
        .header("Accept", "application/json")
        .header("X-Plex-Token", token)
        .header("X-Plex-Product", PRODUCT)
        .header("X-Plex-Client-Identifier", client_identifier)
}

async fn send(request: RequestBuilder, endpoint: &str) -> Result<reqwest::Response, PlexError> {
    let response = request.send().await.map_err(|e| PlexError::Request {
        endpoint: endpoint.to_string(),
        message: sanitize_error(&e.to_string()),
    })?;
    let status = response.status();
    if !status.is_success() {
        return Err(PlexError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

async fn send_json(request: RequestBuilder, endpoint: &str) -> Result<Value, PlexError> {
    let response = send(request, endpoint).await?;
    let text = response.text().await.map_err(|e| PlexError::Decode {
        endpoint: endpoint.to_string(),
        message: sanitize_error(&e.to_string()),
    })?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| PlexError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

async fn send_empty(request: RequestBuilder, endpoint: &str) -> Result<(), PlexError> {
    send(request, endpoint).await.map(|_| ())
}
