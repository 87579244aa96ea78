use super::{MonitoringService, TerminationTarget};
use crate::config::{NotifyLevel, TautulliConfig};
use crate::error::MonitorError;
use crate::media_server::BoxFuture;
use crate::media_server::http_client::build_http_client;
use crate::observability::sanitize_error;
use reqwest::Client;
use serde::Deserialize;

pub struct TautulliClient {
    base_url: String,
    api_key: String,
    notifier_id: Option<u32>,
    min_level: NotifyLevel,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    response: ApiResponse,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    result: String,
    #[serde(default)]
    message: Option<String>,
}

impl TautulliClient {
    pub fn new(config: &TautulliConfig) -> Self {
        Self {
            base_url: config.url.trim().trim_end_matches('/').to_string(),
            api_key: config.api_key.trim().to_string(),
            notifier_id: config.notifier_id,
            min_level: config.notify_min_level,
            client: build_http_client(config.timeout_secs),
        }
    }

    fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.api_key.is_empty()
    }

    async fn call(&self, cmd: &str, params: &[(&str, String)]) -> Result<(), MonitorError> {
        if !self.is_configured() {
            return Err(MonitorError::NotConfigured);
        }

        let response = self
            .client
            .get(format!("{}/api/v2", self.base_url))
            .query(&[("apikey", self.api_key.as_str()), ("cmd", cmd)])
            .query(params)
            .send()
            .await
            .map_err(|e| MonitorError::Request {
                cmd: cmd.to_string(),
                message: sanitize_error(&e.to_string()),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Request {
                cmd: cmd.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        let envelope: ApiEnvelope = response.json().await.map_err(|e| MonitorError::Rejected {
            cmd: cmd.to_string(),
            message: format!("unreadable acknowledgement: {}", sanitize_error(&e.to_string())),
        })?;

        if envelope.response.result.eq_ignore_ascii_case("success") {
            Ok(())
        } else {
            Err(MonitorError::Rejected {
                cmd: cmd.to_string(),
                message: envelope
                    .response
                    .message
                    .unwrap_or_else(|| format!("result '{}'", envelope.response.result)),
            })
        }
    }
}

impl MonitoringService for TautulliClient {
    fn terminate<'a>(
        &'a self,
        target: &'a TerminationTarget,
        message: &'a str,
    ) -> BoxFuture<'a, Result<(), MonitorError>> {
        Box::pin(async move {
            let mut params = vec![("message", message.to_string())];
            match (&target.session_key, &target.session_id) {
                (Some(key), _) => params.push(("session_key", key.clone())),
                (None, Some(id)) => params.push(("session_id", id.clone())),
                (None, None) => {
                    return Err(MonitorError::Rejected {
                        cmd: "terminate_session".into(),
                        message: "no session key or id to terminate".into(),
                    });
                }
            }
            self.call("terminate_session", &params).await
        })
    }

    fn notify<'a>(
        &'a self,
        level: NotifyLevel,
        subject: &'a str,
        body: &'a str,
    ) -> BoxFuture<'a, Result<(), MonitorError>> {
        Box::pin(async move {
            let Some(notifier_id) = self.notifier_id else {
                tracing::debug!("No notifier configured, skipping notification");
                return Ok(());
            };
            if level < self.min_level {
                tracing::debug!(%level, min = %self.min_level, "Notification below minimum level");
                return Ok(());
            }
            self.call(
                "notify",
                &[
                    ("notifier_id", notifier_id.to_string()),
                    ("subject", subject.to_string()),
                    ("body", body.to_string()),
                ],
            )
            .await
        })
    }
}
