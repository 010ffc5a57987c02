//! Single entry point for requests coming from UI surfaces.
//!
//! Every request resolves to an [`Envelope`]; failures become
//! `{success: false, error}` instead of propagating.

use crate::api::{CandidateApi, HttpCandidateApi};
use crate::clock::{Clock, SystemClock};
use crate::config::ConfigStore;
use crate::effects::{EffectSink, NullSink};
use crate::history::HistoryLedger;
use crate::stats::StatsAggregator;
use crate::store::Store;
use crate::submission::SubmissionClient;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use wharf_common::error::CaptureError;
use wharf_common::protocol::{
    BadgeState, CapturePayload, DEFAULT_API_URL, Effect, Envelope, Payload, RawRequest, Request,
    SubmissionResult,
};

/// Why the host is (re)initializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallReason {
    Install,
    Update,
}

pub struct DispatcherBuilder {
    store: Arc<dyn Store>,
    api: Option<Arc<dyn CandidateApi>>,
    effects: Option<Arc<dyn EffectSink>>,
    clock: Option<Arc<dyn Clock>>,
    default_api_url: String,
}

impl DispatcherBuilder {
    pub fn api(mut self, api: Arc<dyn CandidateApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn effects(mut self, effects: Arc<dyn EffectSink>) -> Self {
        self.effects = Some(effects);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn default_api_url(mut self, url: impl Into<String>) -> Self {
        self.default_api_url = url.into();
        self
    }

    pub fn build(self) -> Dispatcher {
        let api = self
            .api
            .unwrap_or_else(|| Arc::new(HttpCandidateApi::new()) as Arc<dyn CandidateApi>);
        let effects = self
            .effects
            .unwrap_or_else(|| Arc::new(NullSink) as Arc<dyn EffectSink>);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        let config = ConfigStore::with_default_api_url(self.store.clone(), self.default_api_url);
        let ledger = HistoryLedger::new(self.store, clock.clone());
        let client = SubmissionClient::new(config.clone(), ledger.clone(), api, clock.clone());
        let stats = StatsAggregator::new(ledger.clone(), clock, effects.clone());

        Dispatcher {
            config,
            ledger,
            client,
            stats,
            effects,
        }
    }
}

/// Routes each action to its handler. Holds no mutable state; safe to share across tasks.
#[derive(Clone)]
pub struct Dispatcher {
    config: ConfigStore,
    ledger: HistoryLedger,
    client: SubmissionClient,
    stats: StatsAggregator,
    effects: Arc<dyn EffectSink>,
}

impl Dispatcher {
    pub fn builder(store: Arc<dyn Store>) -> DispatcherBuilder {
        DispatcherBuilder {
            store,
            api: None,
            effects: None,
            clock: None,
            default_api_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    /// Handle a request in its wire form `{action, data?}`.
    pub async fn handle_value(&self, message: Value) -> Envelope {
        let request = serde_json::from_value::<RawRequest>(message)
            .map_err(|e| CaptureError::MalformedRequest(e.to_string()))
            .and_then(Request::try_from);

        match request {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!("Rejected request: {}", e);
                Envelope::failure(e)
            }
        }
    }

    pub async fn handle(&self, request: Request) -> Envelope {
        let action = request.kind();
        debug!("Dispatching {}", action);
        match self.route(request).await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("{} failed: {}", action, e);
                Envelope::failure(e)
            }
        }
    }

    async fn route(&self, request: Request) -> Result<Envelope, CaptureError> {
        match request {
            Request::CaptureCandidate(payload) => self.capture(payload).await,
            Request::GetConfig => Ok(Envelope::ok(Payload::Config(self.config.get().await?))),
            Request::SetConfig(update) => {
                self.config.set(update).await?;
                Ok(Envelope::ack())
            }
            Request::CheckConnection => Ok(Envelope::ok(Payload::Connection(
                self.client.check_connection().await?,
            ))),
            Request::GetCaptureHistory => Ok(Envelope::ok(Payload::History {
                history: self.ledger.list().await?,
            })),
            Request::ClearHistory => {
                self.ledger.clear().await?;
                self.effects.emit(Effect::Badge(BadgeState::cleared()));
                Ok(Envelope::ack())
            }
            Request::GetStats => Ok(Envelope::ok(Payload::Stats(self.stats.stats().await?))),
        }
    }

    async fn capture(&self, payload: CapturePayload) -> Result<Envelope, CaptureError> {
        let submission = self.client.submit(payload).await?;

        if let Some(notification) = submission.notification {
            self.effects.emit(Effect::Notification(notification));
        }

        Ok(match submission.result {
            SubmissionResult::Created { id } => {
                // The capture already succeeded; a badge failure must not turn it into an error.
                if let Err(e) = self.stats.refresh_badge().await {
                    warn!("Badge refresh after capture failed: {}", e);
                }
                let candidate = submission.candidate.unwrap_or_else(|| {
                    let mut body = Map::new();
                    if let Some(id) = id {
                        body.insert("id".into(), Value::String(id));
                    }
                    Value::Object(body)
                });
                Envelope::ok(Payload::Captured { candidate })
            }
            SubmissionResult::Duplicate {
                existing_id,
                message,
            } => Envelope::duplicate(existing_id, message),
            SubmissionResult::Failed { message } => Envelope::failure(message),
        })
    }

    /// Effect a host should perform when it starts for the given reason.
    pub fn install_effect(reason: InstallReason) -> Option<Effect> {
        match reason {
            InstallReason::Install => Some(Effect::OpenOptionsPage),
            InstallReason::Update => None,
        }
    }

    pub fn on_installed(&self, reason: InstallReason) {
        if let Some(effect) = Self::install_effect(reason) {
            self.effects.emit(effect);
        }
    }
}
