//! HTTP client for a local OpenAI-compatible completion service
//!
//! The endpoint is configuration, not code: any service speaking the
//! chat-completions protocol works. Transport failures and timeouts are
//! mapped into `DecisionStatus` values instead of errors, so one bad
//! call never unwinds past the step controller.

use crate::core::error::{Result, SimError};
use crate::llm::cache::PromptCache;
use crate::llm::prompt::DecisionRequest;
use crate::llm::{DecisionResponse, DecisionSource};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Connection and sampling parameters for the inference endpoint
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Base URL of the service, e.g. `http://localhost:1234/v1`
    pub base_url: String,
    /// Sent as a bearer token; local services usually ignore it
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Bound on one inference call, timer starts at dispatch
    pub timeout: Duration,
    /// Extra attempts after the first, for timeout/transport failures only
    pub retry_attempts: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234/v1".into(),
            api_key: "foo".into(),
            model: "meta-llama-3-8b-instruct".into(),
            max_tokens: 1024,
            temperature: 0.7,
            timeout: Duration::from_secs(60),
            retry_attempts: 2,
        }
    }
}

impl InferenceConfig {
    /// Defaults overridden by `GEOLLM_BASE_URL`, `GEOLLM_API_KEY`,
    /// `GEOLLM_MODEL` when set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("GEOLLM_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(key) = std::env::var("GEOLLM_API_KEY") {
            config.api_key = key;
        }
        if let Ok(model) = std::env::var("GEOLLM_MODEL") {
            config.model = model;
        }
        config
    }
}

/// Production decision source backed by the HTTP endpoint
pub struct HttpSource {
    http: Client,
    config: InferenceConfig,
    cache: Option<Mutex<PromptCache>>,
}

impl HttpSource {
    pub fn new(config: InferenceConfig) -> Self {
        Self {
            http: Client::new(),
            config,
            cache: None,
        }
    }

    /// Enable the prompt cache backed by the file at `path`
    pub fn with_cache(mut self, path: &Path) -> Result<Self> {
        self.cache = Some(Mutex::new(PromptCache::open(path)?));
        Ok(self)
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    fn cached(&self, request: &DecisionRequest) -> Option<String> {
        let cache = self.cache.as_ref()?;
        let cache = cache.lock().expect("prompt cache poisoned");
        cache.get(&request.system, &request.user).map(String::from)
    }

    fn store(&self, request: &DecisionRequest, response: &str) {
        if let Some(cache) = &self.cache {
            let mut cache = cache.lock().expect("prompt cache poisoned");
            cache.insert(&request.system, &request.user, response.to_string());
        }
    }

    /// One attempt, no retry, no timeout wrapper
    async fn post_completion(&self, request: &DecisionRequest) -> Result<String> {
        let payload = ChatRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            messages: vec![
                Message {
                    role: "system".into(),
                    content: request.system.clone(),
                },
                Message {
                    role: "user".into(),
                    content: request.user.clone(),
                },
            ],
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| SimError::Service(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SimError::Service(format!("{status}: {body}")));
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| SimError::Service(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| SimError::Service("empty choices in completion".into()))
    }
}

impl DecisionSource for HttpSource {
    async fn decide(&self, request: &DecisionRequest) -> DecisionResponse {
        if let Some(hit) = self.cached(request) {
            tracing::debug!(agent = %request.agent, "prompt cache hit");
            return DecisionResponse::ok(hit);
        }

        let attempts = 1 + self.config.retry_attempts;
        let mut last = DecisionResponse::timeout();

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.config.timeout, self.post_completion(request)).await {
                Ok(Ok(text)) => {
                    self.store(request, &text);
                    return DecisionResponse::ok(text);
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        agent = %request.agent,
                        attempt,
                        error = %e,
                        "inference call failed"
                    );
                    last = DecisionResponse::service_error(e.to_string());
                }
                Err(_) => {
                    tracing::warn!(agent = %request.agent, attempt, "inference call timed out");
                    last = DecisionResponse::timeout();
                }
            }
        }

        // Content-level problems are the decoder's concern; only
        // transport outcomes reach this point.
        last
    }

    fn finalize(&self) -> Result<()> {
        if let Some(cache) = &self.cache {
            cache.lock().expect("prompt cache poisoned").persist()?;
        }
        Ok(())
    }
}

// OpenAI-compatible wire format

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_targets_local_service() {
        let config = InferenceConfig::default();
        assert_eq!(config.base_url, "http://localhost:1234/v1");
        assert_eq!(config.model, "meta-llama-3-8b-instruct");
        assert_eq!(config.max_tokens, 1024);
    }

    #[test]
    fn test_source_without_cache_has_no_hits() {
        let source = HttpSource::new(InferenceConfig::default());
        let request = DecisionRequest {
            agent: "Ada".into(),
            system: "s".into(),
            user: "u".into(),
        };
        assert!(source.cached(&request).is_none());
        // store is a no-op without a cache
        source.store(&request, "r");
        assert!(source.cached(&request).is_none());
    }

    #[tokio::test]
    async fn test_cache_short_circuits_network() {
        let path = std::env::temp_dir().join("geollm-client-cache.json");
        let _ = std::fs::remove_file(&path);

        // Endpoint that cannot exist; only the cache can answer
        let config = InferenceConfig {
            base_url: "http://127.0.0.1:1".into(),
            timeout: Duration::from_secs(1),
            retry_attempts: 0,
            ..InferenceConfig::default()
        };
        let source = HttpSource::new(config).with_cache(&path).unwrap();
        let request = DecisionRequest {
            agent: "Ada".into(),
            system: "sys".into(),
            user: "user".into(),
        };
        source.store(&request, "{\"action\": \"wait\"}");

        let response = source.decide(&request).await;
        assert!(response.status.is_ok());
        assert!(response.raw.contains("wait"));
    }
}
