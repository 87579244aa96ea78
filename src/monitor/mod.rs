//! Companion monitoring service: stream termination and notifications.

pub mod tautulli;

pub use tautulli::TautulliClient;

use crate::config::NotifyLevel;
use crate::error::MonitorError;
use crate::media_server::BoxFuture;

/// Identifiers the monitoring service can terminate a stream by. The session
/// key is preferred when both are known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminationTarget {
    pub session_key: Option<String>,
    pub session_id: Option<String>,
}

impl TerminationTarget {
    pub fn is_empty(&self) -> bool {
        self.session_key.is_none() && self.session_id.is_none()
    }
}

pub trait MonitoringService: Send + Sync {
    /// Succeeds only on an explicit success acknowledgement.
    fn terminate<'a>(
        &'a self,
        target: &'a TerminationTarget,
        message: &'a str,
    ) -> BoxFuture<'a, Result<(), MonitorError>>;

    /// Best-effort notification; levels below the configured minimum are
    /// dropped without error.
    fn notify<'a>(
        &'a self,
        level: NotifyLevel,
        subject: &'a str,
        body: &'a str,
    ) -> BoxFuture<'a, Result<(), MonitorError>>;
}
