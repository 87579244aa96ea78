//! Fail-closed termination: monitoring service first, then the media server.

use crate::media_server::{DirectTermination, SessionDirectory, SessionSnapshot};
use crate::monitor::{MonitoringService, TerminationTarget};

/// Which tier confirmed the termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TerminationRoute {
    MonitoringService,
    SessionHandle,
    DirectEndpoint,
}

/// Everything known about the stream to terminate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminationRequest<'a> {
    pub session_key: Option<&'a str>,
    pub session_id: Option<&'a str>,
    pub handle: Option<&'a SessionSnapshot>,
    /// Token for the direct call: the one that authenticated the connect
    /// check, or the configured one when the connect itself failed.
    pub token: Option<&'a str>,
}

pub struct Escalator<'a> {
    monitor: Option<&'a dyn MonitoringService>,
    directory: Option<&'a dyn SessionDirectory>,
    direct: &'a dyn DirectTermination,
}

impl<'a> Escalator<'a> {
    pub fn new(
        monitor: Option<&'a dyn MonitoringService>,
        directory: Option<&'a dyn SessionDirectory>,
        direct: &'a dyn DirectTermination,
    ) -> Self {
        Self {
            monitor,
            directory,
            direct,
        }
    }

    /// Try each tier in order; the first confirmed one wins. Failures are
    /// logged, never propagated.
    pub async fn terminate(
        &self,
        request: TerminationRequest<'_>,
        message: &str,
    ) -> Option<TerminationRoute> {
        if self.via_monitor(request, message).await {
            return Some(TerminationRoute::MonitoringService);
        }
        if self.via_handle(request, message).await {
            return Some(TerminationRoute::SessionHandle);
        }
        if self.via_direct(request, message).await {
            return Some(TerminationRoute::DirectEndpoint);
        }
        tracing::error!(
            session_key = request.session_key.unwrap_or("-"),
            session_id = request.session_id.unwrap_or("-"),
            "Every termination route failed"
        );
        None
    }

    async fn via_monitor(&self, request: TerminationRequest<'_>, message: &str) -> bool {
        let Some(monitor) = self.monitor else {
            tracing::debug!("Monitoring service not configured, skipping");
            return false;
        };
        let target = TerminationTarget {
            session_key: request.session_key.map(str::to_string),
            session_id: request.session_id.map(str::to_string),
        };
        if target.is_empty() {
            tracing::debug!("No session key or id for the monitoring service");
            return false;
        }
        match monitor.terminate(&target, message).await {
            Ok(()) => {
                tracing::info!("Stream terminated through monitoring service");
                true
            }
            Err(e) => {
                tracing::warn!("Monitoring-service termination failed: {e}");
                false
            }
        }
    }

    async fn via_handle(&self, request: TerminationRequest<'_>, message: &str) -> bool {
        let (Some(directory), Some(handle)) = (self.directory, request.handle) else {
            tracing::debug!("No resolved session handle to stop");
            return false;
        };
        match directory.stop_session(handle, message).await {
            Ok(()) => {
                tracing::info!("Stream terminated through session handle");
                true
            }
            Err(e) => {
                tracing::warn!("Session-handle termination failed: {e}");
                false
            }
        }
    }

    async fn via_direct(&self, request: TerminationRequest<'_>, message: &str) -> bool {
        let (Some(session_id), Some(token)) = (request.session_id, request.token) else {
            tracing::debug!("Direct termination needs a session id and a token");
            return false;
        };
        match self.direct.terminate_session(session_id, message, token).await {
            Ok(()) => {
                tracing::info!("Stream terminated through direct server call");
                true
            }
            Err(e) => {
                tracing::warn!("Direct termination failed: {e}");
                false
            }
        }
    }
}
