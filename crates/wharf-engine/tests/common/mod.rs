#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;
use wharf_engine::api::{ApiResponse, CandidateApi, TransportError};
use wharf_engine::effects::EffectSink;
use wharf_engine::protocol::Effect;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub api_url: String,
    pub api_key: String,
    pub body: Value,
}

/// Canned API: every create and health call returns the configured reply.
pub struct MockApi {
    create_reply: Result<ApiResponse, TransportError>,
    health_reply: Result<ApiResponse, TransportError>,
    health_delay: Option<Duration>,
    pub calls: Mutex<Vec<RecordedCall>>,
    pub health_calls: Mutex<usize>,
}

impl MockApi {
    pub fn replying(status: u16, body: Value) -> Self {
        Self {
            create_reply: Ok(ApiResponse::new(status, body)),
            health_reply: Ok(ApiResponse::new(200, serde_json::json!({ "status": "ok" }))),
            health_delay: None,
            calls: Mutex::new(Vec::new()),
            health_calls: Mutex::new(0),
        }
    }

    pub fn failing(error: TransportError) -> Self {
        Self {
            create_reply: Err(error.clone()),
            health_reply: Err(error),
            ..Self::replying(200, Value::Null)
        }
    }

    pub fn with_health(mut self, reply: Result<ApiResponse, TransportError>) -> Self {
        self.health_reply = reply;
        self
    }

    pub fn with_health_delay(mut self, delay: Duration) -> Self {
        self.health_delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> RecordedCall {
        self.calls.lock().unwrap().last().cloned().expect("no calls")
    }
}

#[async_trait]
impl CandidateApi for MockApi {
    async fn create_candidate(
        &self,
        api_url: &str,
        api_key: &str,
        body: &Value,
    ) -> Result<ApiResponse, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            body: body.clone(),
        });
        self.create_reply.clone()
    }

    async fn health(&self, _api_url: &str) -> Result<ApiResponse, TransportError> {
        *self.health_calls.lock().unwrap() += 1;
        if let Some(delay) = self.health_delay {
            tokio::time::sleep(delay).await;
        }
        self.health_reply.clone()
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub effects: Mutex<Vec<Effect>>,
}

impl RecordingSink {
    pub fn taken(&self) -> Vec<Effect> {
        std::mem::take(&mut *self.effects.lock().unwrap())
    }
}

impl EffectSink for RecordingSink {
    fn emit(&self, effect: Effect) {
        self.effects.lock().unwrap().push(effect);
    }
}
