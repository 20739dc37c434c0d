use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use concierge_core::config::LlmConfig;
use concierge_core::domain::intent::{
    Entities, Intent, IntentResult, DEFAULT_DATETIME, DEFAULT_LOCATION, DEFAULT_SERVICE,
};
use concierge_core::errors::CollaboratorError;

use crate::tools::IntentExtractor;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 256;

pub const INTENT_SYSTEM_PROMPT: &str = "You are an appointment booking assistant. \
Analyze the user's message and extract:\n\
1. Intent: search, book, check, or unknown\n\
2. Service type: haircut, massage, etc.\n\
3. Date/time preference\n\
4. Location preference\n\n\
Respond with JSON only, for example:\n\
{\"intent\": \"book\", \"service\": \"haircut\", \
\"datetime\": \"tomorrow at 2pm\", \"location\": \"Antibes\"}";

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    temperature: f32,
}

impl AnthropicClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key =
            config.api_key.clone().ok_or_else(|| anyhow!("llm.api_key is not configured"))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client for the anthropic provider")?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn request_body<'a>(&'a self, system: &'a str, prompt: &'a str) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: self.temperature,
            system,
            messages: vec![RequestMessage { role: "user", content: prompt }],
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.request_body(system, prompt))
            .send()
            .await
            .context("anthropic request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("anthropic returned HTTP {status}"));
        }

        let body: MessagesResponse =
            response.json().await.context("anthropic response was not valid JSON")?;
        Ok(body.text())
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

impl MessagesResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Intent extraction backed by a language model.
pub struct LlmIntentExtractor<C> {
    client: C,
}

impl<C> LlmIntentExtractor<C>
where
    C: LlmClient,
{
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C> IntentExtractor for LlmIntentExtractor<C>
where
    C: LlmClient,
{
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn extract(&self, text: &str) -> Result<IntentResult, CollaboratorError> {
        let completion = self
            .client
            .complete(INTENT_SYSTEM_PROMPT, text)
            .await
            .map_err(|error| {
                CollaboratorError::unavailable("intent_extractor", format!("{error:#}"))
            })?;

        Ok(parse_completion(&completion))
    }
}

#[derive(Deserialize)]
struct RawIntent {
    intent: Option<String>,
    service: Option<String>,
    location: Option<String>,
    datetime: Option<String>,
}

/// Reads the first JSON object in a completion. Anything unparseable is `unknown`.
pub fn parse_completion(completion: &str) -> IntentResult {
    let Some(raw) = first_json_object(completion)
        .and_then(|candidate| serde_json::from_str::<RawIntent>(candidate).ok())
    else {
        debug!(
            event_name = "turn.intent_unparseable",
            "model output was not an intent object; treating as unknown"
        );
        return IntentResult::unknown();
    };

    let intent = raw.intent.as_deref().map(Intent::parse_lenient).unwrap_or(Intent::Unknown);
    IntentResult {
        intent,
        entities: Entities {
            service: Some(or_default(raw.service, DEFAULT_SERVICE)),
            location: Some(or_default(raw.location, DEFAULT_LOCATION)),
            datetime: Some(or_default(raw.datetime, DEFAULT_DATETIME)),
        },
    }
}

fn or_default(value: Option<String>, default: &str) -> String {
    value.filter(|value| !value.trim().is_empty()).unwrap_or_else(|| default.to_string())
}

fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use concierge_core::config::{AppConfig, LlmConfig};
    use concierge_core::domain::intent::Intent;

    use super::{parse_completion, AnthropicClient, LlmClient, LlmIntentExtractor};
    use crate::tools::IntentExtractor;

    struct ScriptedLlm {
        responses: Mutex<VecDeque<Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<Result<String>>) -> Self {
            Self { responses: Mutex::new(responses.into()), prompts: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String> {
            self.prompts.lock().await.push(prompt.to_string());
            self.responses.lock().await.pop_front().unwrap_or_else(|| Err(anyhow!("no response")))
        }
    }

    #[test]
    fn parses_json_wrapped_in_prose() {
        let result = parse_completion(
            "Sure! {\"intent\": \"book\", \"service\": \"massage\", \"location\": \"Nice\"} Done.",
        );

        assert_eq!(result.intent, Intent::Book);
        assert_eq!(result.entities.service.as_deref(), Some("massage"));
        assert_eq!(result.entities.location.as_deref(), Some("Nice"));
        assert_eq!(result.entities.datetime.as_deref(), Some("tomorrow at 2pm"));
    }

    #[test]
    fn malformed_output_falls_back_to_unknown() {
        for completion in ["", "no json here", "{not json}", "} {"] {
            let result = parse_completion(completion);
            assert_eq!(result.intent, Intent::Unknown, "completion: {completion}");
            assert_eq!(result.entities.service, None);
        }
    }

    #[test]
    fn unrecognized_intent_label_is_unknown() {
        let result = parse_completion("{\"intent\": \"cancel\", \"service\": \"\"}");
        assert_eq!(result.intent, Intent::Unknown);
        assert_eq!(result.entities.service.as_deref(), Some("haircut"));
    }

    #[tokio::test]
    async fn extractor_sends_user_text_to_model() {
        let extractor = LlmIntentExtractor::new(ScriptedLlm::new(vec![Ok(
            "{\"intent\": \"search\"}".to_string()
        )]));

        let result = extractor.extract("find a salon").await.expect("extraction succeeds");
        assert_eq!(result.intent, Intent::Search);
        assert_eq!(extractor.client.prompts.lock().await.as_slice(), ["find a salon"]);
    }

    #[tokio::test]
    async fn transport_failure_is_a_collaborator_error() {
        let extractor = LlmIntentExtractor::new(ScriptedLlm::new(vec![Err(anyhow!("boom"))]));

        let error = extractor.extract("book").await.expect_err("transport failure surfaces");
        assert_eq!(error.collaborator(), "intent_extractor");
    }

    #[test]
    fn anthropic_client_requires_api_key() {
        let config = AppConfig::default().llm;
        assert!(AnthropicClient::from_config(&config).is_err());

        let config = LlmConfig { api_key: Some("sk-test".to_string().into()), ..config };
        let client = AnthropicClient::from_config(&config).expect("client builds");
        let body = serde_json::to_value(client.request_body("system", "hello")).expect("json");
        assert_eq!(body["model"], "claude-3-haiku-20240307");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
    }
}
