//! Webhook alert delivery.
//!
//! One POST with body `{"text": message}` per triggered alert. The response is
//! classified and logged; nothing is retried, queued or persisted. A failed
//! alert never stops the cycle.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::core::config::AlertSettings;
use crate::core::errors::{CleanerError, Result};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};

/// Upper bound for one webhook request, connect through body.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Mattermost-style incoming-webhook body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookPayload<'a> {
    pub text: &'a str,
}

// ──── transport ────

/// Sends one JSON POST and returns the HTTP status.
///
/// Non-2xx statuses are returned as `Ok`; only transport problems are `Err`.
pub trait WebhookTransport: Send + Sync {
    fn post_json(&self, url: &str, payload: &WebhookPayload<'_>) -> Result<u16>;
}

/// Blocking `ureq` transport with a global timeout.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(WEBHOOK_TIMEOUT)
    }
}

impl WebhookTransport for UreqTransport {
    fn post_json(&self, url: &str, payload: &WebhookPayload<'_>) -> Result<u16> {
        let response = self.agent.post(url).send_json(payload)?;
        Ok(response.status().as_u16())
    }
}

/// In-memory transport that records requests and answers with a fixed status.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    /// `None` simulates a transport failure.
    status: Option<u16>,
    requests: Mutex<Vec<(String, String)>>,
}

impl RecordingTransport {
    #[must_use]
    pub fn responding(status: u16) -> Self {
        Self {
            status: Some(status),
            requests: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self::default()
    }

    /// `(url, json body)` of every request seen so far.
    #[must_use]
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().clone()
    }
}

impl WebhookTransport for RecordingTransport {
    fn post_json(&self, url: &str, payload: &WebhookPayload<'_>) -> Result<u16> {
        let body = serde_json::to_string(payload)?;
        self.requests.lock().push((url.to_string(), body));
        self.status.ok_or_else(|| CleanerError::WebhookTransport {
            details: format!("connection refused: {url}"),
        })
    }
}

// ──── endpoint ────

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Endpoint for a webhook token.
///
/// A token that already is an `http(s)` URL is used verbatim; otherwise the
/// endpoint is `{base}/hooks/{token}`.
pub fn resolve_endpoint(token: &str, base_url: Option<&str>) -> Result<String> {
    let token = token.trim();
    if is_http_url(token) {
        return Ok(token.to_string());
    }
    match base_url {
        Some(base) if is_http_url(base) => Ok(format!(
            "{}/hooks/{}",
            base.trim_end_matches('/'),
            token.trim_matches('/')
        )),
        Some(base) => Err(CleanerError::WebhookEndpoint {
            details: format!("base URL {base:?} is not an http(s) URL"),
        }),
        None => Err(CleanerError::WebhookEndpoint {
            details: "token is not a URL and no WebhookBaseUrl is configured".to_string(),
        }),
    }
}

// ──── dispatcher ────

/// Classified result of one alert attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertOutcome {
    Delivered { status: u16 },
    Rejected { status: u16 },
    Failed { error_code: String, error_message: String },
}

impl AlertOutcome {
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    fn from_status(status: u16) -> Self {
        if (200..300).contains(&status) {
            Self::Delivered { status }
        } else {
            Self::Rejected { status }
        }
    }

    fn from_error(err: &CleanerError) -> Self {
        Self::Failed {
            error_code: err.code().to_string(),
            error_message: err.to_string(),
        }
    }

    fn to_event(&self) -> ActivityEvent {
        match self {
            Self::Delivered { status } => ActivityEvent::AlertDelivered { status: *status },
            Self::Rejected { status } => ActivityEvent::AlertRejected { status: *status },
            Self::Failed {
                error_code,
                error_message,
            } => ActivityEvent::AlertFailed {
                error_code: error_code.clone(),
                error_message: error_message.clone(),
            },
        }
    }
}

/// Delivers the configured alert message to the webhook.
pub struct AlertDispatcher {
    settings: AlertSettings,
    base_url: Option<String>,
    transport: Arc<dyn WebhookTransport>,
    logger: ActivityLoggerHandle,
}

impl AlertDispatcher {
    #[must_use]
    pub fn new(
        settings: AlertSettings,
        base_url: Option<String>,
        transport: Arc<dyn WebhookTransport>,
        logger: ActivityLoggerHandle,
    ) -> Self {
        Self {
            settings,
            base_url,
            transport,
            logger,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.settings.message
    }

    /// Send the alert once and log the classified outcome.
    pub fn dispatch(&self) -> AlertOutcome {
        let outcome = match self.send() {
            Ok(status) => AlertOutcome::from_status(status),
            Err(err) => AlertOutcome::from_error(&err),
        };
        self.logger.send(outcome.to_event());
        outcome
    }

    fn send(&self) -> Result<u16> {
        let endpoint = resolve_endpoint(&self.settings.webhook_token, self.base_url.as_deref())?;
        let payload = WebhookPayload {
            text: &self.settings.message,
        };
        self.transport.post_json(&endpoint, &payload)
    }
}
