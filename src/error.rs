use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Errors that end an invocation before enforcement starts.
///
/// Collaborator failures never reach this type: the enforcement pipeline
/// folds them into [`EnforcementError`], whose [`FailureKind`] selects the
/// fail-closed toggle and viewer message.
#[derive(Debug, Error)]
pub enum DownshiftError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Media server errors ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PlexError {
    #[error("media server not configured: {0}")]
    NotConfigured(String),

    #[error("request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("could not decode {endpoint} response: {message}")]
    Decode { endpoint: String, message: String },

    #[error("catalog item {0} not found")]
    ItemNotFound(String),

    #[error("session snapshot has no {0} to address it by")]
    Unaddressable(&'static str),
}

// ─── Monitoring service errors ───────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("monitoring service not configured")]
    NotConfigured,

    #[error("{cmd} request failed: {message}")]
    Request { cmd: String, message: String },

    #[error("{cmd} was not acknowledged: {message}")]
    Rejected { cmd: String, message: String },
}

// ─── Enforcement failure taxonomy ────────────────────────────────────────────

/// The failure kinds that reach the escalator. Each one owns an independent
/// kill toggle and viewer message in `[enforcement]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    ConnectFailure,
    SessionNotFound,
    ClientNotFound,
    NoFallbackMedia,
    SwitchFailure,
    UnexpectedError,
}

#[derive(Debug, Error)]
pub enum EnforcementError {
    #[error("cannot reach media server: {0}")]
    Connect(#[source] PlexError),

    #[error("no live session matched after {attempts} attempt(s)")]
    SessionNotFound { attempts: u32 },

    #[error("no controllable client for machine '{machine_id}'")]
    ClientNotFound { machine_id: String },

    #[error("no safe fallback rendition: {0}")]
    NoFallbackMedia(String),

    #[error("switch command failed: {0}")]
    Switch(#[source] PlexError),

    #[error("unexpected: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl EnforcementError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Connect(_) => FailureKind::ConnectFailure,
            Self::SessionNotFound { .. } => FailureKind::SessionNotFound,
            Self::ClientNotFound { .. } => FailureKind::ClientNotFound,
            Self::NoFallbackMedia(_) => FailureKind::NoFallbackMedia,
            Self::Switch(_) => FailureKind::SwitchFailure,
            Self::Unexpected(_) => FailureKind::UnexpectedError,
        }
    }
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, DownshiftError>;
