use super::probe::{first_of, probe_array, probe_bool, probe_str, probe_u64};
use crate::quality::{DynamicRange, classify_optional, parse_height};
use serde_json::Value;
use std::fmt;

// ── Server identity ──────────────────────────────────────────────

/// Result of the connect check against the media server.
///
/// `effective_token` is whichever token authenticated the check; the direct
/// termination call later reuses it instead of consulting global state.
#[derive(Clone)]
pub struct ServerIdentity {
    pub machine_identifier: String,
    pub base_url: String,
    pub effective_token: String,
}

impl fmt::Debug for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerIdentity")
            .field("machine_identifier", &self.machine_identifier)
            .field("base_url", &self.base_url)
            .field("effective_token", &"[REDACTED]")
            .finish()
    }
}

// ── Live sessions ────────────────────────────────────────────────

const SESSION_KEY: &[&str] = &["/sessionKey", "/Session/key", "/session_key"];
const SESSION_ID: &[&str] = &["/Session/id", "/sessionId", "/session_id"];
const RATING_KEY: &[&str] = &["/ratingKey", "/rating_key"];
const USERNAMES: &[&str] = &["/User/title", "/User/username", "/username", "/user"];
const USER_ID: &[&str] = &["/User/id", "/user_id"];
const MACHINE_ID: &[&str] = &[
    "/Player/machineIdentifier",
    "/Player/machine_id",
    "/machineIdentifier",
];
const PLAYER_TITLE: &[&str] = &["/Player/title", "/Player/device", "/Player/name"];
const PLAYER_PRODUCT: &[&str] = &["/Player/product", "/Player/platform"];
const PLAYER_ADDRESS: &[&str] = &["/Player/address", "/Player/remotePublicAddress"];
const PLAYER_PORT: &[&str] = &["/Player/port"];
const VIEW_OFFSET: &[&str] = &["/viewOffset", "/view_offset"];

/// One entry of the live session list, kept as the server sent it.
///
/// Accessors never fail: a missing or malformed field reads as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    raw: Value,
}

impl SessionSnapshot {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn session_key(&self) -> Option<String> {
        probe_str(&self.raw, SESSION_KEY)
    }

    pub fn session_id(&self) -> Option<String> {
        probe_str(&self.raw, SESSION_ID)
    }

    pub fn rating_key(&self) -> Option<String> {
        probe_str(&self.raw, RATING_KEY)
    }

    /// Every username the session advertises, first-probed first.
    pub fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = USERNAMES
            .iter()
            .filter_map(|pointer| probe_str(&self.raw, &[pointer]))
            .collect();
        names.extend(
            probe_array(&self.raw, &["/usernames"])
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string),
        );
        names.dedup();
        names
    }

    pub fn user_id(&self) -> Option<String> {
        probe_str(&self.raw, USER_ID)
    }

    pub fn machine_id(&self) -> Option<String> {
        probe_str(&self.raw, MACHINE_ID)
    }

    pub fn player_title(&self) -> Option<String> {
        probe_str(&self.raw, PLAYER_TITLE)
    }

    pub fn player_product(&self) -> Option<String> {
        probe_str(&self.raw, PLAYER_PRODUCT)
    }

    pub fn player_address(&self) -> Option<String> {
        probe_str(&self.raw, PLAYER_ADDRESS)
    }

    pub fn player_port(&self) -> Option<u16> {
        probe_u64(&self.raw, PLAYER_PORT).and_then(|p| u16::try_from(p).ok())
    }

    pub fn view_offset_ms(&self) -> u64 {
        probe_u64(&self.raw, VIEW_OFFSET).unwrap_or(0)
    }

    /// The rendition currently selected for playback: the entry flagged
    /// `selected`, else the first one listed.
    pub fn current_media(&self) -> Option<MediaVersion> {
        let media = probe_array(&self.raw, &["/Media"]);
        let index = media
            .iter()
            .position(|m| probe_bool(m, &["/selected"]).unwrap_or(false))
            .or_else(|| (!media.is_empty()).then_some(0))?;
        Some(MediaVersion::from_json(index, &media[index]))
    }
}

// ── Catalog items ────────────────────────────────────────────────

/// A catalog item together with every rendition the server holds for it.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogItem {
    pub rating_key: String,
    pub title: Option<String>,
    pub versions: Vec<MediaVersion>,
}

impl CatalogItem {
    pub fn from_json(rating_key: &str, raw: &Value) -> Self {
        let versions = probe_array(raw, &["/Media"])
            .iter()
            .enumerate()
            .map(|(index, media)| MediaVersion::from_json(index, media))
            .collect();
        Self {
            rating_key: probe_str(raw, RATING_KEY).unwrap_or_else(|| rating_key.to_string()),
            title: probe_str(raw, &["/title"]),
            versions,
        }
    }

    /// Library key used by player commands.
    pub fn key(&self) -> String {
        format!("/library/metadata/{}", self.rating_key)
    }

    pub fn version_by_id(&self, id: &str) -> Option<&MediaVersion> {
        self.versions.iter().find(|v| v.id.as_deref() == Some(id))
    }
}

// ── Renditions ───────────────────────────────────────────────────

/// One playable rendition. `height` is `None` when unknown, never zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaVersion {
    pub index: usize,
    pub id: Option<String>,
    pub height: Option<u32>,
    pub dynamic_range: DynamicRange,
}

impl MediaVersion {
    pub fn from_json(index: usize, raw: &Value) -> Self {
        let height = first_of(raw, &[explicit_height, resolution_label_height, stream_height]);
        let hint = first_of(raw, &[explicit_range_hint, stream_range_markers, stream_sdr_hint]);
        Self {
            index,
            id: probe_str(raw, &["/id"]),
            height,
            dynamic_range: classify_optional(hint.as_deref()),
        }
    }
}

impl fmt::Display for MediaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.height {
            Some(h) => write!(f, "#{} {}p/{}", self.index, h, self.dynamic_range),
            None => write!(f, "#{} ?p/{}", self.index, self.dynamic_range),
        }
    }
}

fn positive(height: u64) -> Option<u32> {
    u32::try_from(height).ok().filter(|h| *h > 0)
}

fn explicit_height(raw: &Value) -> Option<u32> {
    probe_u64(raw, &["/height"]).and_then(positive)
}

fn resolution_label_height(raw: &Value) -> Option<u32> {
    probe_str(raw, &["/videoResolution", "/video_resolution"]).and_then(|r| parse_height(&r))
}

fn stream_height(raw: &Value) -> Option<u32> {
    video_streams(raw).find_map(|s| probe_u64(s, &["/height"]).and_then(positive))
}

fn explicit_range_hint(raw: &Value) -> Option<String> {
    probe_str(raw, &["/videoDynamicRange", "/video_dynamic_range"]).or_else(|| {
        probe_array(raw, &["/Part"])
            .iter()
            .find_map(|part| probe_str(part, &["/videoDynamicRange"]))
    })
}

fn stream_range_markers(raw: &Value) -> Option<String> {
    video_streams(raw).find_map(|stream| {
        if probe_bool(stream, &["/DOVIPresent"]).unwrap_or(false) {
            return Some("Dolby Vision".to_string());
        }
        match probe_str(stream, &["/colorTrc"]).as_deref() {
            Some("smpte2084") => return Some("HDR10".to_string()),
            Some("arib-std-b67") => return Some("HLG".to_string()),
            _ => {}
        }
        probe_str(stream, &["/extendedDisplayTitle", "/displayTitle"]).filter(|title| {
            let lower = title.to_ascii_lowercase();
            ["hdr", "dovi", "dolby", "hlg"]
                .iter()
                .any(|marker| lower.contains(marker))
        })
    })
}

fn stream_sdr_hint(raw: &Value) -> Option<String> {
    video_streams(raw)
        .find_map(|stream| probe_str(stream, &["/colorTrc"]))
        .map(|_| "SDR".to_string())
}

fn video_streams(raw: &Value) -> impl Iterator<Item = &Value> {
    probe_array(raw, &["/Part"])
        .iter()
        .flat_map(|part| probe_array(part, &["/Stream"]).iter())
        .filter(|stream| probe_u64(stream, &["/streamType"]) == Some(1))
}

// ── Controllable players ─────────────────────────────────────────

/// A player advertised by the server's client list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientEndpoint {
    pub name: Option<String>,
    pub machine_identifier: Option<String>,
    pub product: Option<String>,
    pub address: Option<String>,
    pub port: Option<u16>,
    pub protocol: String,
}

impl ClientEndpoint {
    pub fn from_json(raw: &Value) -> Self {
        Self {
            name: probe_str(raw, &["/name", "/title"]),
            machine_identifier: probe_str(raw, &["/machineIdentifier", "/clientIdentifier"]),
            product: probe_str(raw, &["/product"]),
            address: probe_str(raw, &["/address", "/host"]),
            port: probe_u64(raw, &["/port"]).and_then(|p| u16::try_from(p).ok()),
            protocol: probe_str(raw, &["/protocol"]).unwrap_or_else(|| "http".to_string()),
        }
    }

    pub fn base_url(&self) -> Option<String> {
        let address = self.address.as_deref()?;
        let port = self.port?;
        Some(format!("{}://{address}:{port}", self.protocol))
    }
}

/// How player commands reach a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRoute {
    /// Sent to the media server, which forwards them to the player named by
    /// `X-Plex-Target-Client-Identifier`.
    ServerRelay,
    /// Sent straight to the player's own HTTP endpoint.
    Direct { base_url: String },
}

/// A controllable playback endpoint located for the resolved session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHandle {
    pub machine_identifier: String,
    pub title: Option<String>,
    pub route: ClientRoute,
}
