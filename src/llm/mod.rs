//! Bridge between spatial state and the language-model service
//!
//! The flow per decision is encode -> infer -> decode. Inference failure
//! is represented as data (`DecisionStatus`), never as control flow, so
//! the step controller can apply one uniform fallback policy.

pub mod cache;
pub mod client;
pub mod decode;
pub mod prompt;

pub use cache::PromptCache;
pub use client::{HttpSource, InferenceConfig};
pub use decode::decode;
pub use prompt::{encode, DecisionRequest};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

/// How a decision attempt turned out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    /// Response parsed and validated
    Ok,
    /// Response received but failed schema or bounds checks
    Malformed,
    /// Inference call exceeded its time bound
    Timeout,
    /// Transport failure or non-2xx from the service
    ServiceError,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStatus::Ok => "ok",
            DecisionStatus::Malformed => "malformed",
            DecisionStatus::Timeout => "timeout",
            DecisionStatus::ServiceError => "service_error",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, DecisionStatus::Ok)
    }
}

/// Raw model output plus transport outcome, retained within the tick
/// for decoding and audit logging
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionResponse {
    pub raw: String,
    pub status: DecisionStatus,
}

impl DecisionResponse {
    pub fn ok(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            status: DecisionStatus::Ok,
        }
    }

    pub fn timeout() -> Self {
        Self {
            raw: String::new(),
            status: DecisionStatus::Timeout,
        }
    }

    pub fn service_error(detail: impl Into<String>) -> Self {
        Self {
            raw: detail.into(),
            status: DecisionStatus::ServiceError,
        }
    }
}

/// The seam between the step controller and whatever produces decisions.
///
/// The HTTP client is the production implementation; `ScriptedSource`
/// replays fixed sequences for tests and offline runs. Implementations
/// must not panic and must represent failure in the returned status.
#[allow(async_fn_in_trait)]
pub trait DecisionSource {
    async fn decide(&self, request: &DecisionRequest) -> DecisionResponse;

    /// Flush any persistent state (caches). Default is a no-op.
    fn finalize(&self) -> crate::core::error::Result<()> {
        Ok(())
    }
}

/// Replays pre-recorded responses per agent, in order.
///
/// When an agent's queue runs dry it keeps returning the configured
/// default, so fixtures only need to script the interesting prefix.
pub struct ScriptedSource {
    queues: Mutex<AHashMap<String, VecDeque<DecisionResponse>>>,
    default: DecisionResponse,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(AHashMap::new()),
            default: DecisionResponse::ok(r#"{"action": "wait"}"#),
        }
    }

    pub fn with_default(mut self, default: DecisionResponse) -> Self {
        self.default = default;
        self
    }

    /// Queue `responses` for the named agent, appended after any already
    /// scripted ones.
    pub fn script(self, agent: &str, responses: Vec<DecisionResponse>) -> Self {
        {
            let mut queues = self.queues.lock().expect("scripted source poisoned");
            queues
                .entry(agent.to_string())
                .or_default()
                .extend(responses);
        }
        self
    }
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionSource for ScriptedSource {
    async fn decide(&self, request: &DecisionRequest) -> DecisionResponse {
        let mut queues = self.queues.lock().expect("scripted source poisoned");
        queues
            .get_mut(&request.agent)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| self.default.clone())
    }
}
