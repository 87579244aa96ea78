use crate::error::{ConfigError, FailureKind};
use crate::observability::parse_level;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path the config was read from - computed, not serialized
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    #[serde(default)]
    pub plex: PlexConfig,

    #[serde(default)]
    pub tautulli: TautulliConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub enforcement: EnforcementConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ── Media server ─────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct PlexConfig {
    /// Base URL, e.g. `http://127.0.0.1:32400`
    #[serde(default)]
    pub url: String,
    /// `X-Plex-Token` used for every server call
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_plex_timeout_secs")]
    pub timeout_secs: u64,
    /// Sent as `X-Plex-Client-Identifier`
    #[serde(default = "default_client_identifier")]
    pub client_identifier: String,
}

fn default_plex_timeout_secs() -> u64 {
    15
}

fn default_client_identifier() -> String {
    "downshiftarr".into()
}

impl Default for PlexConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            timeout_secs: default_plex_timeout_secs(),
            client_identifier: default_client_identifier(),
        }
    }
}

impl std::fmt::Debug for PlexConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlexConfig")
            .field("url", &self.url)
            .field("token", &redacted(&self.token))
            .field("timeout_secs", &self.timeout_secs)
            .field("client_identifier", &self.client_identifier)
            .finish()
    }
}

// ── Monitoring service ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotifyLevel {
    Info,
    #[default]
    Warning,
    Error,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TautulliConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_tautulli_timeout_secs")]
    pub timeout_secs: u64,
    /// Notification agent id; notifications are skipped when unset
    #[serde(default)]
    pub notifier_id: Option<u32>,
    #[serde(default)]
    pub notify_min_level: NotifyLevel,
}

fn default_tautulli_timeout_secs() -> u64 {
    10
}

impl Default for TautulliConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            timeout_secs: default_tautulli_timeout_secs(),
            notifier_id: None,
            notify_min_level: NotifyLevel::default(),
        }
    }
}

impl TautulliConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.api_key.trim().is_empty()
    }
}

impl std::fmt::Debug for TautulliConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TautulliConfig")
            .field("url", &self.url)
            .field("api_key", &redacted(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .field("notifier_id", &self.notifier_id)
            .field("notify_min_level", &self.notify_min_level)
            .finish()
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "[REDACTED]" }
}

// ── Quality policy ───────────────────────────────────────────────

/// Which fallback passes the selector runs, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum FallbackMode {
    /// One SDR-only pass; never relaxed.
    SdrOnly,
    /// SDR-only pass, then a pass admitting HDR/Dolby Vision renditions.
    SdrPreferred,
    /// One pass without any dynamic-range restriction.
    HdrAllowed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Heights at or above this are high quality regardless of dynamic range
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: u32,
    /// Fallback ladder, best first
    #[serde(default = "default_preferred_heights")]
    pub preferred_heights: Vec<u32>,
    #[serde(default = "default_true")]
    pub sdr_only: bool,
    /// With `sdr_only`, retry with HDR renditions when no SDR one fits
    #[serde(default)]
    pub allow_hdr_fallback: bool,
    /// Exact, case-sensitive usernames never enforced against
    #[serde(default)]
    pub exempt_users: Vec<String>,
}

fn default_quality_threshold() -> u32 {
    2000
}

fn default_preferred_heights() -> Vec<u32> {
    vec![1080, 720, 576, 480, 360, 240]
}

fn default_true() -> bool {
    true
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            quality_threshold: default_quality_threshold(),
            preferred_heights: default_preferred_heights(),
            sdr_only: true,
            allow_hdr_fallback: false,
            exempt_users: Vec::new(),
        }
    }
}

impl PolicyConfig {
    pub fn fallback_mode(&self) -> FallbackMode {
        match (self.sdr_only, self.allow_hdr_fallback) {
            (true, false) => FallbackMode::SdrOnly,
            (true, true) => FallbackMode::SdrPreferred,
            (false, _) => FallbackMode::HdrAllowed,
        }
    }

    pub fn is_exempt(&self, username: &str) -> bool {
        self.exempt_users.iter().any(|u| u == username)
    }
}

// ── Retries and settle delays ────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_session_attempts")]
    pub session_attempts: u32,
    #[serde(default = "default_session_delay_ms")]
    pub session_delay_ms: u64,
    #[serde(default = "default_seek_attempts")]
    pub seek_attempts: u32,
    #[serde(default = "default_seek_settle_ms")]
    pub seek_settle_ms: u64,
}

fn default_session_attempts() -> u32 {
    4
}

fn default_session_delay_ms() -> u64 {
    2_000
}

fn default_seek_attempts() -> u32 {
    3
}

fn default_seek_settle_ms() -> u64 {
    1_500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            session_attempts: default_session_attempts(),
            session_delay_ms: default_session_delay_ms(),
            seek_attempts: default_seek_attempts(),
            seek_settle_ms: default_seek_settle_ms(),
        }
    }
}

// ── Fail-closed enforcement ──────────────────────────────────────

pub const DEFAULT_KILL_MESSAGE: &str = "This title cannot be streamed in 4K/HDR/Dolby Vision on this device. \
     Please pick a 1080p (or lower) version from the ... menu.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementConfig {
    #[serde(default = "default_true")]
    pub kill_on_connect_failure: bool,
    #[serde(default = "default_true")]
    pub kill_on_session_not_found: bool,
    #[serde(default = "default_true")]
    pub kill_on_client_not_found: bool,
    #[serde(default = "default_true")]
    pub kill_on_no_fallback_media: bool,
    #[serde(default = "default_true")]
    pub kill_on_switch_failure: bool,
    #[serde(default = "default_true")]
    pub kill_on_unexpected_error: bool,

    /// Shared viewer message; per-kind messages below override it
    #[serde(default = "default_kill_message")]
    pub kill_message: String,
    #[serde(default)]
    pub connect_failure_message: Option<String>,
    #[serde(default)]
    pub session_not_found_message: Option<String>,
    #[serde(default)]
    pub client_not_found_message: Option<String>,
    #[serde(default)]
    pub no_fallback_media_message: Option<String>,
    #[serde(default)]
    pub switch_failure_message: Option<String>,
    #[serde(default)]
    pub unexpected_error_message: Option<String>,

    /// Decide and log, but never switch, terminate or notify
    #[serde(default)]
    pub dry_run: bool,
}

fn default_kill_message() -> String {
    DEFAULT_KILL_MESSAGE.into()
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            kill_on_connect_failure: true,
            kill_on_session_not_found: true,
            kill_on_client_not_found: true,
            kill_on_no_fallback_media: true,
            kill_on_switch_failure: true,
            kill_on_unexpected_error: true,
            kill_message: default_kill_message(),
            connect_failure_message: None,
            session_not_found_message: None,
            client_not_found_message: None,
            no_fallback_media_message: None,
            switch_failure_message: None,
            unexpected_error_message: None,
            dry_run: false,
        }
    }
}

impl EnforcementConfig {
    pub fn kill_enabled(&self, kind: FailureKind) -> bool {
        match kind {
            FailureKind::ConnectFailure => self.kill_on_connect_failure,
            FailureKind::SessionNotFound => self.kill_on_session_not_found,
            FailureKind::ClientNotFound => self.kill_on_client_not_found,
            FailureKind::NoFallbackMedia => self.kill_on_no_fallback_media,
            FailureKind::SwitchFailure => self.kill_on_switch_failure,
            FailureKind::UnexpectedError => self.kill_on_unexpected_error,
        }
    }

    pub fn message_for(&self, kind: FailureKind) -> &str {
        let specific = match kind {
            FailureKind::ConnectFailure => &self.connect_failure_message,
            FailureKind::SessionNotFound => &self.session_not_found_message,
            FailureKind::ClientNotFound => &self.client_not_found_message,
            FailureKind::NoFallbackMedia => &self.no_fallback_media_message,
            FailureKind::SwitchFailure => &self.switch_failure_message,
            FailureKind::UnexpectedError => &self.unexpected_error_message,
        };
        specific
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(&self.kill_message)
    }
}

// ── Logging ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl Config {
    /// `~/.downshiftarr/config.toml`, when a home directory exists.
    pub fn default_path() -> Option<PathBuf> {
        UserDirs::new().map(|u| u.home_dir().join(".downshiftarr").join("config.toml"))
    }

    /// Resolve the config path (`--config`, then `DOWNSHIFTARR_CONFIG`, then
    /// the default), load it if present, and apply environment overrides.
    pub fn load(explicit: Option<&str>) -> Result<Self, ConfigError> {
        let from_env = std::env::var("DOWNSHIFTARR_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty());
        let chosen = explicit
            .map(str::to_string)
            .or(from_env)
            .map(|p| PathBuf::from(shellexpand::tilde(&p).to_string()));
        let explicit_choice = chosen.is_some();

        let mut config = match chosen.or_else(Self::default_path) {
            Some(path) if path.exists() => Self::load_from_path(&path)?,
            Some(path) if explicit_choice => {
                return Err(ConfigError::Load(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            _ => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Apply environment overrides to config. Empty values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty_env("PLEX_URL") {
            self.plex.url = url;
        }
        if let Some(token) = non_empty_env("PLEX_TOKEN") {
            self.plex.token = token;
        }
        if let Some(url) = non_empty_env("TAUTULLI_URL") {
            self.tautulli.url = url;
        }
        if let Some(key) = non_empty_env("TAUTULLI_APIKEY") {
            self.tautulli.api_key = key;
        }
        if let Some(level) = non_empty_env("DOWNSHIFTARR_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(threshold) =
            non_empty_env("DOWNSHIFTARR_QUALITY_THRESHOLD").and_then(|t| t.parse::<u32>().ok())
        {
            self.policy.quality_threshold = threshold;
        }
        if let Some(dry_run) = non_empty_env("DOWNSHIFTARR_DRY_RUN") {
            self.enforcement.dry_run = matches!(
                dry_run.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.policy.quality_threshold == 0 {
            return Err(ConfigError::Validation(
                "policy.quality_threshold must be greater than 0".into(),
            ));
        }
        if self.policy.preferred_heights.contains(&0) {
            return Err(ConfigError::Validation(
                "policy.preferred_heights must only contain positive heights".into(),
            ));
        }
        if self.retry.session_attempts == 0 {
            return Err(ConfigError::Validation(
                "retry.session_attempts must be at least 1".into(),
            ));
        }
        if parse_level(&self.logging.level).is_none() {
            return Err(ConfigError::Validation(format!(
                "logging.level '{}' is not a valid level",
                self.logging.level
            )));
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
