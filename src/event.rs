//! The trigger payload, normalized once per invocation.

use crate::quality::{DynamicRange, classify_optional, parse_height};

/// Video decisions that mean the server is not transcoding the video.
const DIRECT_DECISIONS: [&str; 7] = [
    "directplay",
    "direct play",
    "direct_play",
    "directstream",
    "direct stream",
    "direct_stream",
    "copy",
];

/// Normalized trigger payload. Every field is optional because the trigger
/// may leave any placeholder unfilled; resolution hints are untrusted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputEvent {
    pub rating_key: Option<String>,
    pub machine_id: Option<String>,
    pub username: Option<String>,
    pub session_id: Option<String>,
    pub session_key: Option<String>,
    pub user_id: Option<String>,
    pub video_decision: Option<String>,
    pub source_resolution: Option<String>,
    pub stream_resolution: Option<String>,
    pub dynamic_range: Option<String>,
}

impl InputEvent {
    /// True when the decision names direct play/stream or copy.
    pub fn is_direct(&self) -> bool {
        self.video_decision.as_deref().is_some_and(|d| {
            let normalized = d.trim().to_ascii_lowercase();
            DIRECT_DECISIONS.contains(&normalized.as_str())
        })
    }

    pub fn username_or_empty(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }

    /// Largest height either hint claims. Logged for diagnosis only; quality
    /// decisions read the server's own data.
    pub fn hinted_height(&self) -> Option<u32> {
        [&self.source_resolution, &self.stream_resolution]
            .into_iter()
            .filter_map(|hint| hint.as_deref().and_then(parse_height))
            .max()
    }

    pub fn hinted_dynamic_range(&self) -> DynamicRange {
        classify_optional(self.dynamic_range.as_deref())
    }
}

/// Trim a raw trigger value; blanks and unfilled `{placeholder}` literals
/// read as absent.
pub fn normalize_field(raw: Option<String>) -> Option<String> {
    let value = raw?;
    let trimmed = value.trim();
    if trimmed.is_empty() || (trimmed.starts_with('{') && trimmed.ends_with('}')) {
        None
    } else {
        Some(trimmed.to_string())
    }
}
