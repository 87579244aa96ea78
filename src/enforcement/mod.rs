//! The enforcement pipeline: resolve, classify, downshift, or fail closed.

pub mod controller;
pub mod escalation;
pub mod fallback;
pub mod resolver;

pub use controller::{ClientController, LocateStrategy};
pub use escalation::{Escalator, TerminationRequest, TerminationRoute};
pub use fallback::{CurrentRendition, FallbackSelector};
pub use resolver::{MatchTier, SessionContext, SessionResolver};

use crate::config::{Config, NotifyLevel};
use crate::error::{EnforcementError, FailureKind};
use crate::event::InputEvent;
use crate::media_server::{
    CatalogItem, DirectTermination, MediaServer, ServerConnector, SessionDirectory,
};
use crate::monitor::MonitoringService;
use crate::quality::{DynamicRange, is_high_quality};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

/// Terminal state of one invocation. Every variant exits 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Exempt,
    NotTranscoding,
    NotHighQuality,
    AlreadyCompliant,
    Switched {
        media_index: usize,
    },
    /// Termination was attempted; `route` is the tier that confirmed it.
    Terminated {
        kind: FailureKind,
        route: Option<TerminationRoute>,
    },
    FailureIgnored {
        kind: FailureKind,
    },
}

impl Outcome {
    /// Notification severity, or `None` for outcomes that took no action.
    pub fn notify_level(self) -> Option<NotifyLevel> {
        match self {
            Self::Switched { .. } => Some(NotifyLevel::Info),
            Self::Terminated {
                kind: FailureKind::UnexpectedError,
                ..
            }
            | Self::FailureIgnored {
                kind: FailureKind::UnexpectedError,
            } => Some(NotifyLevel::Error),
            Self::Terminated { .. } | Self::FailureIgnored { .. } => Some(NotifyLevel::Warning),
            Self::Exempt | Self::NotTranscoding | Self::NotHighQuality | Self::AlreadyCompliant => {
                None
            }
        }
    }
}

/// What the pipeline learned before it stopped; escalation and reporting
/// work from whatever got filled in.
#[derive(Default)]
struct Progress {
    server: Option<Box<dyn MediaServer>>,
    session: Option<SessionContext>,
    title: Option<String>,
}

pub struct Enforcer<'a> {
    config: &'a Config,
    connector: &'a dyn ServerConnector,
    monitor: Option<&'a dyn MonitoringService>,
    direct: &'a dyn DirectTermination,
}

impl<'a> Enforcer<'a> {
    pub fn new(
        config: &'a Config,
        connector: &'a dyn ServerConnector,
        monitor: Option<&'a dyn MonitoringService>,
        direct: &'a dyn DirectTermination,
    ) -> Self {
        Self {
            config,
            connector,
            monitor,
            direct,
        }
    }

    fn dry_run(&self) -> bool {
        self.config.enforcement.dry_run
    }

    /// Run one event to a terminal outcome. Never fails: every error is
    /// routed through escalation, and a panic inside the pipeline counts as
    /// an unexpected error.
    pub async fn enforce(&self, event: &InputEvent) -> Outcome {
        let username = event.username_or_empty();
        if self.config.policy.is_exempt(username) {
            tracing::info!(user = username, "User is exempt");
            return self.finish(event, &Progress::default(), Outcome::Exempt).await;
        }
        if event.is_direct() {
            tracing::info!(
                decision = event.video_decision.as_deref().unwrap_or("-"),
                "Not transcoding video"
            );
            return self
                .finish(event, &Progress::default(), Outcome::NotTranscoding)
                .await;
        }

        tracing::debug!(
            hinted_height = ?event.hinted_height(),
            hinted_range = %event.hinted_dynamic_range(),
            "Event hints (advisory only)"
        );

        let mut progress = Progress::default();
        let result = AssertUnwindSafe(self.pipeline(event, &mut progress))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(EnforcementError::Unexpected(anyhow::anyhow!(
                    "pipeline panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => self.escalate(event, &progress, &err).await,
        };
        self.finish(event, &progress, outcome).await
    }

    async fn pipeline(
        &self,
        event: &InputEvent,
        progress: &mut Progress,
    ) -> Result<Outcome, EnforcementError> {
        let policy = &self.config.policy;
        let retry = &self.config.retry;

        let server: &dyn MediaServer = &**progress
            .server
            .insert(self.connector.connect().await.map_err(EnforcementError::Connect)?);

        let session = progress.session.insert(
            SessionResolver::new(
                server,
                retry.session_attempts,
                Duration::from_millis(retry.session_delay_ms),
            )
            .resolve(event)
            .await?,
        );

        let item = self.fetch_item(server, event, session).await;
        if let Ok(item) = &item {
            progress.title.clone_from(&item.title);
        }

        let current = current_rendition(item.as_ref().ok(), session);
        tracing::info!(
            height = ?current.height,
            dynamic_range = %current.dynamic_range,
            threshold = policy.quality_threshold,
            "Current rendition"
        );
        if !is_high_quality(current.height, current.dynamic_range, policy.quality_threshold) {
            return Ok(
                if current.height.is_some() && current.dynamic_range == DynamicRange::Sdr {
                    Outcome::AlreadyCompliant
                } else {
                    Outcome::NotHighQuality
                },
            );
        }

        let item = item.map_err(EnforcementError::NoFallbackMedia)?;
        let mode = policy.fallback_mode();
        let media_index =
            FallbackSelector::new(policy.quality_threshold, &policy.preferred_heights, mode)
                .select(&item, current)
                .ok_or_else(|| {
                    EnforcementError::NoFallbackMedia(format!(
                        "no rendition below {}p under {mode} among {} version(s)",
                        policy.quality_threshold,
                        item.versions.len()
                    ))
                })?;

        let controller = ClientController::new(
            server,
            retry.seek_attempts,
            Duration::from_millis(retry.seek_settle_ms),
        );
        let client = controller
            .locate_client(session, event.machine_id.as_deref())
            .await
            .ok_or_else(|| EnforcementError::ClientNotFound {
                machine_id: session
                    .machine_id
                    .clone()
                    .or_else(|| event.machine_id.clone())
                    .unwrap_or_else(|| "-".into()),
            })?;

        if self.dry_run() {
            tracing::info!(
                media_index,
                offset_ms = session.view_offset_ms,
                client = client.machine_identifier.as_str(),
                "Dry run: switch not sent"
            );
        } else {
            controller
                .switch(&client, &item, media_index, session.view_offset_ms)
                .await
                .map_err(EnforcementError::Switch)?;
        }
        Ok(Outcome::Switched { media_index })
    }

    /// The item the session is playing. An event naming a different item
    /// than the live session wins: the session snapshot may be stale.
    async fn fetch_item(
        &self,
        server: &dyn MediaServer,
        event: &InputEvent,
        session: &SessionContext,
    ) -> Result<CatalogItem, String> {
        let rating_key = match (event.rating_key.as_deref(), session.rating_key.as_deref()) {
            (Some(wanted), Some(live)) if wanted != live => {
                tracing::warn!(
                    event_rating_key = wanted,
                    session_rating_key = live,
                    "Session is playing a different item than the event; using the event's"
                );
                wanted
            }
            (_, Some(live)) => live,
            (Some(wanted), None) => wanted,
            (None, None) => return Err("no rating key known for the session".into()),
        };
        server
            .fetch_item(rating_key)
            .await
            .map_err(|e| format!("catalog lookup for {rating_key} failed: {e}"))
    }

    async fn escalate(
        &self,
        event: &InputEvent,
        progress: &Progress,
        err: &EnforcementError,
    ) -> Outcome {
        let kind = err.kind();
        tracing::error!(%kind, "Enforcement failed: {err}");

        let enforcement = &self.config.enforcement;
        if !enforcement.kill_enabled(kind) {
            tracing::warn!(%kind, "Termination disabled for this failure; leaving stream alone");
            return Outcome::FailureIgnored { kind };
        }

        let session = progress.session.as_ref();
        let server = progress.server.as_deref();
        let request = TerminationRequest {
            session_key: session
                .and_then(|s| s.session_key.as_deref())
                .or(event.session_key.as_deref()),
            session_id: session
                .and_then(|s| s.session_id.as_deref())
                .or(event.session_id.as_deref()),
            handle: session.map(|s| &s.handle),
            token: server
                .map(|s| s.identity().effective_token.as_str())
                .or(Some(self.config.plex.token.trim()))
                .filter(|t| !t.is_empty()),
        };

        if self.dry_run() {
            tracing::info!(
                %kind,
                session_key = request.session_key.unwrap_or("-"),
                session_id = request.session_id.unwrap_or("-"),
                "Dry run: termination not sent"
            );
            return Outcome::Terminated { kind, route: None };
        }

        let directory = server.map(|s| s as &dyn SessionDirectory);
        let route = Escalator::new(self.monitor, directory, self.direct)
            .terminate(request, enforcement.message_for(kind))
            .await;
        Outcome::Terminated { kind, route }
    }

    /// Log the outcome line and send the notification, if any.
    async fn finish(&self, event: &InputEvent, progress: &Progress, outcome: Outcome) -> Outcome {
        let session = progress.session.as_ref();
        let user = session
            .and_then(|s| s.username.as_deref())
            .or(event.username.as_deref())
            .unwrap_or("-");
        let player = session
            .and_then(|s| s.player_title.as_deref())
            .or(event.machine_id.as_deref())
            .unwrap_or("-");
        let title = progress.title.as_deref().unwrap_or("-");

        tracing::info!(
            %outcome,
            user,
            player,
            title,
            rating_key = event.rating_key.as_deref().unwrap_or("-"),
            matched_by = %session.map_or_else(|| "-".to_string(), |s| s.matched_by.to_string()),
            dry_run = self.dry_run(),
            "Enforcement finished"
        );

        if self.dry_run() {
            return outcome;
        }
        if let (Some(level), Some(monitor)) = (outcome.notify_level(), self.monitor) {
            let subject = format!("Downshiftarr: {outcome}");
            let body = describe(outcome, user, player, title);
            if let Err(e) = monitor.notify(level, &subject, &body).await {
                tracing::warn!("Notification failed: {e}");
            }
        }
        outcome
    }
}

/// Height and range of what is playing now, from the catalog entry when the
/// session names one, else from the session's own media block.
fn current_rendition<'s>(
    item: Option<&CatalogItem>,
    session: &'s SessionContext,
) -> CurrentRendition<'s> {
    let live = session.current_media.as_ref();
    let media_id = live.and_then(|m| m.id.as_deref());
    let authoritative = item
        .and_then(|item| match media_id {
            Some(id) => item.version_by_id(id),
            None if item.versions.len() == 1 => item.versions.first(),
            None => None,
        })
        .or(live);

    CurrentRendition {
        media_id,
        height: authoritative.and_then(|m| m.height),
        dynamic_range: authoritative.map_or(DynamicRange::Unknown, |m| m.dynamic_range),
    }
}

fn describe(outcome: Outcome, user: &str, player: &str, title: &str) -> String {
    let action = match outcome {
        Outcome::Switched { media_index } => {
            format!("switched to rendition #{media_index}")
        }
        Outcome::Terminated { kind, route } => match route {
            Some(route) => format!("terminated after {kind} (via {route})"),
            None => format!("termination after {kind} was not confirmed"),
        },
        Outcome::FailureIgnored { kind } => format!("{kind}; termination disabled"),
        other => other.to_string(),
    };
    format!("{title} for {user} on {player}: {action}")
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".into())
}
