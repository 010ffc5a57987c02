use crate::error::CaptureError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Endpoint used when the user has not configured one.
pub const DEFAULT_API_URL: &str = "http://localhost:3001";

/// Background colour of the badge counter.
pub const BADGE_COLOR: &str = "#000000";

/// Deserializes a field whose producer may send an explicit `null` in place of the
/// default value (extractors emit `skills: null` when a section is missing).
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================
// Requests
// ============================================================

/// Closed set of actions the dispatcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    CaptureCandidate,
    GetConfig,
    SetConfig,
    CheckConnection,
    GetCaptureHistory,
    ClearHistory,
    GetStats,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::CaptureCandidate,
        ActionKind::GetConfig,
        ActionKind::SetConfig,
        ActionKind::CheckConnection,
        ActionKind::GetCaptureHistory,
        ActionKind::ClearHistory,
        ActionKind::GetStats,
    ];

    /// Wire name of the action.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::CaptureCandidate => "CAPTURE_CANDIDATE",
            ActionKind::GetConfig => "GET_CONFIG",
            ActionKind::SetConfig => "SET_CONFIG",
            ActionKind::CheckConnection => "CHECK_CONNECTION",
            ActionKind::GetCaptureHistory => "GET_CAPTURE_HISTORY",
            ActionKind::ClearHistory => "CLEAR_HISTORY",
            ActionKind::GetStats => "GET_STATS",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request as it arrives from a UI surface, before the action is validated.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRequest {
    pub action: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A validated request, one variant per action.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    CaptureCandidate(CapturePayload),
    GetConfig,
    SetConfig(ConfigUpdate),
    CheckConnection,
    GetCaptureHistory,
    ClearHistory,
    GetStats,
}

impl Request {
    pub fn kind(&self) -> ActionKind {
        match self {
            Request::CaptureCandidate(_) => ActionKind::CaptureCandidate,
            Request::GetConfig => ActionKind::GetConfig,
            Request::SetConfig(_) => ActionKind::SetConfig,
            Request::CheckConnection => ActionKind::CheckConnection,
            Request::GetCaptureHistory => ActionKind::GetCaptureHistory,
            Request::ClearHistory => ActionKind::ClearHistory,
            Request::GetStats => ActionKind::GetStats,
        }
    }
}

fn parse_data<T: DeserializeOwned>(kind: ActionKind, data: Value) -> Result<T, CaptureError> {
    serde_json::from_value(data).map_err(|e| CaptureError::InvalidRequest {
        action: kind.as_str().to_string(),
        detail: e.to_string(),
    })
}

impl TryFrom<RawRequest> for Request {
    type Error = CaptureError;

    fn try_from(raw: RawRequest) -> Result<Self, Self::Error> {
        let kind = ActionKind::from_name(&raw.action)
            .ok_or_else(|| CaptureError::UnrecognizedAction(raw.action.clone()))?;
        let data = raw.data.unwrap_or(Value::Null);

        // Unit actions ignore whatever payload the caller attached.
        Ok(match kind {
            ActionKind::CaptureCandidate => Request::CaptureCandidate(parse_data(kind, data)?),
            ActionKind::SetConfig => Request::SetConfig(parse_data(kind, data)?),
            ActionKind::GetConfig => Request::GetConfig,
            ActionKind::CheckConnection => Request::CheckConnection,
            ActionKind::GetCaptureHistory => Request::GetCaptureHistory,
            ActionKind::ClearHistory => Request::ClearHistory,
            ActionKind::GetStats => Request::GetStats,
        })
    }
}

// ============================================================
// Capture payload
// ============================================================

/// Site the capture originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaptureSource {
    LinkedIn,
    Gmail,
    #[default]
    Extension,
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureSource::LinkedIn => "LinkedIn",
            CaptureSource::Gmail => "Gmail",
            CaptureSource::Extension => "Extension",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration: String,
}

/// Contact record produced by a page extractor.
///
/// Extractors attach extra fields (e.g. `location`) that are not part of the
/// capture contract; those are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturePayload {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default, rename = "linkedin_url", alias = "linkedinUrl")]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub experience: Vec<ExperienceEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: CaptureSource,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub captured_from: Option<String>,
}

impl CapturePayload {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

// ============================================================
// Submission
// ============================================================

/// Outcome of one capture submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    /// Any 2xx reply. `id` is absent when the reply body carried none.
    Created {
        id: Option<String>,
    },
    /// The API already holds an equivalent record.
    Duplicate {
        existing_id: Option<String>,
        message: String,
    },
    Failed {
        message: String,
    },
}

impl SubmissionResult {
    pub fn is_created(&self) -> bool {
        matches!(self, SubmissionResult::Created { .. })
    }
}

// ============================================================
// History
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

/// One entry of the capture history. Never modified after it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub source: CaptureSource,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

/// Counters derived from the capture history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub today_count: usize,
    pub week_count: usize,
    pub total_count: usize,
    pub failed_count: usize,
}

// ============================================================
// Configuration
// ============================================================

/// User configuration as persisted by the options page.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub api_key: String,
    pub api_url: String,
    pub auto_capture: bool,
    pub show_notifications: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            auto_capture: false,
            show_notifications: true,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.api_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("Config")
            .field("api_key", &key)
            .field("api_url", &self.api_url)
            .field("auto_capture", &self.auto_capture)
            .field("show_notifications", &self.show_notifications)
            .finish()
    }
}

/// Partial configuration; only the supplied keys are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_capture: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_notifications: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ConnectionStatus {
    pub fn connected(server_status: Option<String>) -> Self {
        Self {
            connected: true,
            server_status,
            reason: None,
        }
    }

    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self {
            connected: false,
            server_status: None,
            reason: Some(reason.into()),
        }
    }
}

// ============================================================
// Response envelope
// ============================================================

/// Normalized reply to every request: `{success, ...payload}`.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(flatten)]
    pub payload: Payload,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Captured {
        candidate: Value,
    },
    Duplicate {
        duplicate: bool,
        #[serde(rename = "existingId")]
        existing_id: Option<String>,
        error: String,
    },
    Error {
        error: String,
    },
    Config(Config),
    Connection(ConnectionStatus),
    History {
        history: Vec<HistoryRecord>,
    },
    Stats(Stats),
    Ack {},
}

impl Envelope {
    pub fn ok(payload: Payload) -> Self {
        Self {
            success: true,
            payload,
        }
    }

    pub fn ack() -> Self {
        Self::ok(Payload::Ack {})
    }

    pub fn failure(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            payload: Payload::Error {
                error: error.to_string(),
            },
        }
    }

    pub fn duplicate(existing_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: Payload::Duplicate {
                duplicate: true,
                existing_id,
                error: message.into(),
            },
        }
    }

    /// Error text, if this envelope reports a failure.
    pub fn error(&self) -> Option<&str> {
        match &self.payload {
            Payload::Error { error } | Payload::Duplicate { error, .. } => Some(error),
            _ => None,
        }
    }
}

// ============================================================
// Effects
// ============================================================

/// Desktop notification shown after a capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn captured(name: &str) -> Self {
        Self {
            title: "Candidate Captured".to_string(),
            message: format!("{} added to your pipeline", name),
        }
    }
}

/// Toolbar badge. An empty `text` hides the badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeState {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl BadgeState {
    pub fn from_count(count: usize) -> Self {
        if count == 0 {
            return Self::cleared();
        }
        Self {
            text: count.to_string(),
            color: Some(BADGE_COLOR.to_string()),
        }
    }

    pub fn cleared() -> Self {
        Self {
            text: String::new(),
            color: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        !self.text.is_empty()
    }
}

/// Side effect requested by the core and performed by whichever surface hosts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Effect {
    Notification(Notification),
    Badge(BadgeState),
    OpenOptionsPage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_action_is_rejected() {
        let raw: RawRequest = serde_json::from_value(json!({ "action": "FOO" })).unwrap();
        let err = Request::try_from(raw).unwrap_err();
        assert_eq!(err.to_string(), "Unknown action: FOO");
    }

    #[test]
    fn test_unit_action_ignores_data() {
        let raw: RawRequest =
            serde_json::from_value(json!({ "action": "GET_STATS", "data": { "x": 1 } })).unwrap();
        assert_eq!(Request::try_from(raw).unwrap().kind(), ActionKind::GetStats);
    }

    #[test]
    fn test_capture_payload_accepts_extractor_shape() {
        let raw: RawRequest = serde_json::from_value(json!({
            "action": "CAPTURE_CANDIDATE",
            "data": {
                "name": "Ada Lovelace",
                "linkedinUrl": "https://www.linkedin.com/in/ada",
                "location": "London",
                "skills": null,
                "experience": [{ "title": "Analyst", "company": "Babbage & Co" }],
                "source": "LinkedIn",
                "capturedFrom": "https://www.linkedin.com/in/ada?trk=x"
            }
        }))
        .unwrap();

        let Request::CaptureCandidate(payload) = Request::try_from(raw).unwrap() else {
            panic!("expected capture request");
        };
        assert_eq!(payload.name, "Ada Lovelace");
        assert_eq!(
            payload.linkedin_url.as_deref(),
            Some("https://www.linkedin.com/in/ada")
        );
        assert!(payload.skills.is_empty());
        assert_eq!(payload.experience[0].duration, "");
        assert_eq!(payload.source, CaptureSource::LinkedIn);
        assert_eq!(payload.email, None);
    }

    #[test]
    fn test_experience_fields_are_all_optional() {
        let payload: CapturePayload = serde_json::from_value(json!({
            "name": "Grace Hopper",
            "experience": [
                { "company": "Navy" },
                { "title": null, "company": "Remington Rand", "duration": "5 yrs" }
            ]
        }))
        .unwrap();
        assert_eq!(payload.experience.len(), 2);
        assert_eq!(payload.experience[0].title, "");
        assert_eq!(payload.experience[1].title, "");
        assert_eq!(payload.experience[1].company, "Remington Rand");
    }

    #[test]
    fn test_capture_without_name_is_invalid() {
        let raw: RawRequest = serde_json::from_value(json!({
            "action": "CAPTURE_CANDIDATE",
            "data": { "email": "x@example.com" }
        }))
        .unwrap();
        let err = Request::try_from(raw).unwrap_err();
        assert!(
            err.to_string()
                .starts_with("Invalid request data for CAPTURE_CANDIDATE")
        );
    }

    #[test]
    fn test_envelope_shapes() {
        let dup = serde_json::to_value(Envelope::duplicate(Some("c1".into()), "exists")).unwrap();
        assert_eq!(
            dup,
            json!({ "success": false, "duplicate": true, "existingId": "c1", "error": "exists" })
        );

        let ack = serde_json::to_value(Envelope::ack()).unwrap();
        assert_eq!(ack, json!({ "success": true }));

        let stats = serde_json::to_value(Envelope::ok(Payload::Stats(Stats {
            today_count: 1,
            week_count: 2,
            total_count: 3,
            failed_count: 4,
        })))
        .unwrap();
        assert_eq!(stats["todayCount"], 1);
        assert_eq!(stats["failedCount"], 4);
        assert_eq!(stats["success"], true);
    }

    #[test]
    fn test_config_debug_hides_key() {
        let config = Config {
            api_key: "tw_secret".into(),
            ..Config::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("tw_secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_effect_wire_format() {
        let badge = serde_json::to_value(Effect::Badge(BadgeState::from_count(3))).unwrap();
        assert_eq!(
            badge,
            json!({ "event": "badge", "text": "3", "color": "#000000" })
        );
        let open = serde_json::to_value(Effect::OpenOptionsPage).unwrap();
        assert_eq!(open, json!({ "event": "open_options_page" }));
    }
}
