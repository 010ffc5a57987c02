//! Capture submission: payload → remote API → classified result → history.

use crate::api::{ApiResponse, CandidateApi, TransportError};
use crate::clock::Clock;
use crate::config::ConfigStore;
use crate::history::{Attempt, HistoryLedger};
use crate::store::StoreError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use wharf_common::error::CaptureError;
use wharf_common::protocol::{
    CapturePayload, CaptureSource, ConnectionStatus, ExperienceEntry, Notification,
    SubmissionResult,
};

/// Upper bound on the health check.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

const DUPLICATE_MESSAGE: &str = "Candidate already exists";

/// Body of `POST /api/candidates`. Absent values are sent as explicit `null`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CandidateBody<'a> {
    name: &'a str,
    email: Option<&'a str>,
    headline: Option<&'a str>,
    #[serde(rename = "linkedin_url")]
    linkedin_url: Option<&'a str>,
    about: Option<&'a str>,
    skills: &'a [String],
    experience: &'a [ExperienceEntry],
    source: CaptureSource,
    notes: Option<&'a str>,
    captured_at: String,
    captured_from: Option<&'a str>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Builds the request body, stamping `capturedAt` with `now`.
pub fn candidate_body(
    payload: &CapturePayload,
    now: DateTime<Utc>,
) -> Result<Value, serde_json::Error> {
    serde_json::to_value(CandidateBody {
        name: &payload.name,
        email: non_empty(&payload.email),
        headline: non_empty(&payload.headline),
        linkedin_url: non_empty(&payload.linkedin_url),
        about: non_empty(&payload.about),
        skills: &payload.skills,
        experience: &payload.experience,
        source: payload.source,
        notes: non_empty(&payload.notes),
        captured_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        captured_from: non_empty(&payload.captured_from),
    })
}

/// What a submission produced. Side effects are described, not performed.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub result: SubmissionResult,
    /// Response body of a successful create.
    pub candidate: Option<Value>,
    /// Notification the host should show, if the user enabled them.
    pub notification: Option<Notification>,
}

#[derive(Clone)]
pub struct SubmissionClient {
    config: ConfigStore,
    ledger: HistoryLedger,
    api: Arc<dyn CandidateApi>,
    clock: Arc<dyn Clock>,
}

impl SubmissionClient {
    pub fn new(
        config: ConfigStore,
        ledger: HistoryLedger,
        api: Arc<dyn CandidateApi>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            ledger,
            api,
            clock,
        }
    }

    /// Submit one capture.
    ///
    /// Returns `Err` only for a missing API key (checked before any network call,
    /// nothing recorded) or a storage failure. Every attempted submission appends
    /// exactly one history record.
    pub async fn submit(&self, payload: CapturePayload) -> Result<Submission, CaptureError> {
        let config = self.config.get().await?;
        if config.api_key.is_empty() {
            return Err(CaptureError::MissingCredential);
        }

        let body = candidate_body(&payload, self.clock.now()).map_err(StoreError::from)?;
        let reply = self
            .api
            .create_candidate(&config.api_url, &config.api_key, &body)
            .await;

        let (result, attempt, candidate) = match reply {
            Ok(response) => classify(response, &payload),
            Err(e) => {
                warn!("Capture of '{}' failed in transport: {}", payload.name, e);
                let message = transport_message(&e);
                let attempt = Attempt::Failed {
                    name: payload.name.clone(),
                    source: payload.source,
                    error: message.clone(),
                };
                (SubmissionResult::Failed { message }, attempt, None)
            }
        };

        self.ledger.append(attempt).await?;

        let notification = match &result {
            SubmissionResult::Created { id } => {
                info!(
                    "Captured '{}' as {}",
                    payload.name,
                    id.as_deref().unwrap_or("<no id>")
                );
                config
                    .show_notifications
                    .then(|| Notification::captured(&payload.name))
            }
            SubmissionResult::Duplicate { existing_id, .. } => {
                info!(
                    "'{}' already exists remotely ({})",
                    payload.name,
                    existing_id.as_deref().unwrap_or("unknown id")
                );
                None
            }
            SubmissionResult::Failed { message } => {
                warn!("Capture of '{}' rejected: {}", payload.name, message);
                None
            }
        };

        Ok(Submission {
            result,
            candidate,
            notification,
        })
    }

    /// Call `GET /health`, bounded by [`HEALTH_TIMEOUT`]. Never fails on network errors;
    /// those are reported as a disconnected status.
    pub async fn check_connection(&self) -> Result<ConnectionStatus, CaptureError> {
        let config = self.config.get().await?;
        if config.api_key.is_empty() {
            return Ok(ConnectionStatus::disconnected("No API key configured"));
        }

        let status = match tokio::time::timeout(HEALTH_TIMEOUT, self.api.health(&config.api_url))
            .await
        {
            Err(_) => ConnectionStatus::disconnected(format!(
                "Connection timed out after {}s",
                HEALTH_TIMEOUT.as_secs()
            )),
            Ok(Err(e)) => ConnectionStatus::disconnected(e.to_string()),
            Ok(Ok(response)) if !response.is_success() => {
                ConnectionStatus::disconnected(format!("Server returned {}", response.status))
            }
            Ok(Ok(response)) => ConnectionStatus::connected(response.field("status")),
        };

        if !status.connected {
            warn!(
                "API at {} unavailable: {}",
                config.api_url,
                status.reason.as_deref().unwrap_or("unknown")
            );
        }
        Ok(status)
    }
}

fn transport_message(e: &TransportError) -> String {
    if e.is_network() {
        CaptureError::NetworkUnreachable.to_string()
    } else {
        e.to_string()
    }
}

fn classify(
    response: ApiResponse,
    payload: &CapturePayload,
) -> (SubmissionResult, Attempt, Option<Value>) {
    let failed = |error: String| Attempt::Failed {
        name: payload.name.clone(),
        source: payload.source,
        error,
    };

    // The remote created the record on any 2xx, whether or not the body names it.
    if response.is_success() {
        let id = response.field("id");
        let attempt = Attempt::Succeeded {
            id: id.clone(),
            name: payload.name.clone(),
            source: payload.source,
        };
        return (SubmissionResult::Created { id }, attempt, Some(response.body));
    }

    let server_error = response.field("error");
    let status_error = format!("HTTP {}", response.status);

    if response.status == 409 {
        let result = SubmissionResult::Duplicate {
            existing_id: response.field("existingId"),
            message: server_error
                .clone()
                .unwrap_or_else(|| DUPLICATE_MESSAGE.to_string()),
        };
        return (result, failed(server_error.unwrap_or(status_error)), None);
    }

    let message = CaptureError::RemoteRejected {
        status: response.status,
        message: server_error.unwrap_or(status_error),
    }
    .to_string();
    (
        SubmissionResult::Failed {
            message: message.clone(),
        },
        failed(message),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_body_uses_explicit_nulls() {
        let payload = CapturePayload {
            name: "Ada Lovelace".into(),
            email: Some(String::new()),
            skills: vec!["Analysis".into()],
            experience: vec![ExperienceEntry {
                title: "Analyst".into(),
                company: "Babbage & Co".into(),
                duration: "2 yrs".into(),
            }],
            source: CaptureSource::LinkedIn,
            ..Default::default()
        };
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();

        let body = candidate_body(&payload, now).unwrap();
        assert_eq!(
            body,
            json!({
                "name": "Ada Lovelace",
                "email": null,
                "headline": null,
                "linkedin_url": null,
                "about": null,
                "skills": ["Analysis"],
                "experience": [{ "title": "Analyst", "company": "Babbage & Co", "duration": "2 yrs" }],
                "source": "LinkedIn",
                "notes": null,
                "capturedAt": "2026-10-19T08:30:00.000Z",
                "capturedFrom": null
            })
        );
    }

    #[test]
    fn test_classify_remote_rejection_falls_back_to_status() {
        let payload = CapturePayload::named("Grace");
        let (result, attempt, _) = classify(ApiResponse::new(503, json!({})), &payload);
        assert_eq!(
            result,
            SubmissionResult::Failed {
                message: "HTTP 503".into()
            }
        );
        assert!(matches!(attempt, Attempt::Failed { error, .. } if error == "HTTP 503"));
    }

    #[test]
    fn test_classify_duplicate_without_error_text() {
        let payload = CapturePayload::named("Grace");
        let (result, attempt, candidate) =
            classify(ApiResponse::new(409, json!({ "existingId": "c9" })), &payload);
        assert_eq!(
            result,
            SubmissionResult::Duplicate {
                existing_id: Some("c9".into()),
                message: DUPLICATE_MESSAGE.into()
            }
        );
        assert!(matches!(attempt, Attempt::Failed { error, .. } if error == "HTTP 409"));
        assert!(candidate.is_none());
    }

    #[test]
    fn test_classify_success_without_id() {
        let payload = CapturePayload::named("Grace");
        let body = json!({ "candidate": { "id": "c1" } });
        let (result, attempt, candidate) =
            classify(ApiResponse::new(201, body.clone()), &payload);
        assert_eq!(result, SubmissionResult::Created { id: None });
        assert!(matches!(attempt, Attempt::Succeeded { id: None, .. }));
        assert_eq!(candidate, Some(body));
    }
}
