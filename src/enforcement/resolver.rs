//! Session resolution: map the trigger event onto one live server session.

use crate::error::EnforcementError;
use crate::event::InputEvent;
use crate::media_server::{MediaVersion, SessionDirectory, SessionSnapshot};
use std::time::Duration;

/// How a candidate session matched the event, strongest first.
///
/// Unmatched candidates have no tier at all, so no sentinel score can collide
/// with a real one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum MatchTier {
    SessionKey,
    SessionId,
    RatingKeyAndUser,
    RatingKeyAndMachine,
}

impl MatchTier {
    /// Lower is better.
    pub fn score(self) -> u8 {
        match self {
            Self::SessionKey => 0,
            Self::SessionId => 1,
            Self::RatingKeyAndUser => 5,
            Self::RatingKeyAndMachine => 10,
        }
    }
}

/// The live session the event resolved to, frozen at resolution time.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub handle: SessionSnapshot,
    pub session_key: Option<String>,
    pub session_id: Option<String>,
    pub rating_key: Option<String>,
    pub username: Option<String>,
    pub machine_id: Option<String>,
    pub player_title: Option<String>,
    pub player_product: Option<String>,
    pub player_address: Option<String>,
    pub player_port: Option<u16>,
    pub view_offset_ms: u64,
    pub current_media: Option<MediaVersion>,
    pub matched_by: MatchTier,
}

impl SessionContext {
    fn from_snapshot(snapshot: SessionSnapshot, matched_by: MatchTier) -> Self {
        Self {
            session_key: snapshot.session_key(),
            session_id: snapshot.session_id(),
            rating_key: snapshot.rating_key(),
            username: snapshot.usernames().into_iter().next(),
            machine_id: snapshot.machine_id(),
            player_title: snapshot.player_title(),
            player_product: snapshot.player_product(),
            player_address: snapshot.player_address(),
            player_port: snapshot.player_port(),
            view_offset_ms: snapshot.view_offset_ms(),
            current_media: snapshot.current_media(),
            handle: snapshot,
            matched_by,
        }
    }
}

fn same(event_value: Option<&str>, candidate_value: Option<&str>) -> bool {
    matches!((event_value, candidate_value), (Some(a), Some(b)) if !a.is_empty() && a == b)
}

/// Best tier this candidate satisfies, if any.
pub fn score_candidate(event: &InputEvent, candidate: &SessionSnapshot) -> Option<MatchTier> {
    if same(event.session_key.as_deref(), candidate.session_key().as_deref()) {
        return Some(MatchTier::SessionKey);
    }
    if same(event.session_id.as_deref(), candidate.session_id().as_deref()) {
        return Some(MatchTier::SessionId);
    }

    let rating_match = same(event.rating_key.as_deref(), candidate.rating_key().as_deref());
    if !rating_match {
        return None;
    }

    let user_match = event.username.as_deref().is_some_and(|wanted| {
        candidate
            .usernames()
            .iter()
            .any(|name| name.eq_ignore_ascii_case(wanted))
    });
    if user_match {
        return Some(MatchTier::RatingKeyAndUser);
    }

    if same(event.machine_id.as_deref(), candidate.machine_id().as_deref()) {
        return Some(MatchTier::RatingKeyAndMachine);
    }
    None
}

/// Lowest-scoring candidate; ties go to the one listed first.
pub fn best_match(
    event: &InputEvent,
    sessions: Vec<SessionSnapshot>,
) -> Option<(SessionSnapshot, MatchTier)> {
    let mut best: Option<(SessionSnapshot, MatchTier)> = None;
    for candidate in sessions {
        let tier = score_candidate(event, &candidate);
        tracing::debug!(
            session_key = candidate.session_key().as_deref().unwrap_or("-"),
            session_id = candidate.session_id().as_deref().unwrap_or("-"),
            rating_key = candidate.rating_key().as_deref().unwrap_or("-"),
            users = ?candidate.usernames(),
            machine = candidate.machine_id().as_deref().unwrap_or("-"),
            matched = tier.map_or("no", |_| "yes"),
            "Session candidate"
        );
        let Some(tier) = tier else { continue };
        if best.as_ref().is_none_or(|(_, current)| tier < *current) {
            best = Some((candidate, tier));
        }
    }
    best
}

pub struct SessionResolver<'a> {
    directory: &'a dyn SessionDirectory,
    attempts: u32,
    delay: Duration,
}

impl<'a> SessionResolver<'a> {
    pub fn new(directory: &'a dyn SessionDirectory, attempts: u32, delay: Duration) -> Self {
        Self {
            directory,
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Re-query the full session list on every attempt; the client may still
    /// be negotiating when the trigger fires.
    pub async fn resolve(&self, event: &InputEvent) -> Result<SessionContext, EnforcementError> {
        for attempt in 1..=self.attempts {
            let sessions = match self.directory.list_active_sessions().await {
                Ok(sessions) => sessions,
                Err(e) => {
                    tracing::warn!(attempt, "Failed to query live sessions: {e}");
                    Vec::new()
                }
            };
            tracing::info!(
                attempt,
                max_attempts = self.attempts,
                sessions = sessions.len(),
                "Scanning live sessions"
            );

            if let Some((snapshot, tier)) = best_match(event, sessions) {
                tracing::info!(
                    matched_by = %tier,
                    score = tier.score(),
                    session_key = snapshot.session_key().as_deref().unwrap_or("-"),
                    "Session resolved"
                );
                return Ok(SessionContext::from_snapshot(snapshot, tier));
            }

            if attempt < self.attempts {
                tokio::time::sleep(self.delay).await;
            }
        }

        Err(EnforcementError::SessionNotFound {
            attempts: self.attempts,
        })
    }
}
