//! LLM provider implementations
//!
//! OpenAI goes through `async-openai` with a forced tool call so the answer
//! arrives as a `{"text": ...}` object. Anthropic is called directly over
//! HTTP. The mock provider backs tests.

use crate::llm_composer::{LLMProvider, LlmRequest};
use crate::PromoError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

fn service_error(service: &str, message: impl ToString) -> PromoError {
    PromoError::ExternalServiceError {
        service: service.to_string(),
        message: message.to_string(),
    }
}

/// Extract the outermost `{...}` block from free text.
fn extract_json_from_text(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start > end {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Interpret free-form model output: JSON when it parses, the text itself otherwise.
fn answer_from_text(content: &str) -> Value {
    let content = content.trim();
    serde_json::from_str::<Value>(content)
        .ok()
        .filter(Value::is_object)
        .or_else(|| extract_json_from_text(content).filter(|v| v.get("text").is_some()))
        .unwrap_or_else(|| serde_json::json!({ "text": content }))
}

enum MockBehavior {
    FromSchema,
    Answer(Value),
    Fail(String),
}

/// Mock LLM provider for testing
pub struct MockProvider {
    behavior: MockBehavior,
    requests: Mutex<Vec<LlmRequest>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Answers with placeholder values shaped by the request schema.
    pub fn new() -> Self {
        Self::with_behavior(MockBehavior::FromSchema)
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self::with_answer(serde_json::json!({ "text": text.into() }))
    }

    pub fn with_answer(answer: Value) -> Self {
        Self::with_behavior(MockBehavior::Answer(answer))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behavior(MockBehavior::Fail(message.into()))
    }

    fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LLMProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &LlmRequest) -> Result<Value, PromoError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        match &self.behavior {
            MockBehavior::Answer(answer) => Ok(answer.clone()),
            MockBehavior::Fail(message) => Err(service_error("mock", message)),
            MockBehavior::FromSchema => {
                let mut result = serde_json::Map::new();
                if let Some(props) = request.schema.get("properties").and_then(Value::as_object) {
                    for (key, prop_schema) in props {
                        let value = match prop_schema.get("type").and_then(Value::as_str) {
                            Some("string") => Value::String("Mock value".to_string()),
                            Some("number") | Some("integer") => Value::from(42),
                            Some("boolean") => Value::Bool(true),
                            Some("array") => Value::Array(vec![]),
                            Some("object") => Value::Object(serde_json::Map::new()),
                            _ => Value::Null,
                        };
                        result.insert(key.clone(), value);
                    }
                }
                Ok(Value::Object(result))
            }
        }
    }
}

pub mod openai {
    use super::*;
    use async_openai::config::OpenAIConfig;
    use async_openai::types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, FunctionObjectArgs,
    };
    use async_openai::Client;

    pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
    const SERVICE: &str = "OpenAI";

    /// OpenAI provider implementation
    pub struct OpenAIProvider {
        client: Client<OpenAIConfig>,
        model: String,
    }

    impl OpenAIProvider {
        pub fn new(api_key: String) -> Self {
            let config = OpenAIConfig::new().with_api_key(api_key);
            Self::from_config(config, DEFAULT_OPENAI_MODEL.to_string())
        }

        pub fn with_model(mut self, model: String) -> Self {
            self.model = model;
            self
        }

        /// Create from custom client configuration, e.g. an OpenAI-compatible gateway
        pub fn from_config(config: OpenAIConfig, model: String) -> Self {
            Self {
                client: Client::with_config(config),
                model,
            }
        }

        pub fn model(&self) -> &str {
            &self.model
        }
    }

    #[async_trait]
    impl LLMProvider for OpenAIProvider {
        fn name(&self) -> &str {
            "openai"
        }

        async fn generate(&self, request: &LlmRequest) -> Result<Value, PromoError> {
            let function = FunctionObjectArgs::default()
                .name("write_post")
                .description("Return the finished social media post")
                .parameters(request.schema.clone())
                .build()
                .map_err(|e| service_error(SERVICE, e))?;

            let tool = ChatCompletionToolArgs::default()
                .r#type(ChatCompletionToolType::Function)
                .function(function)
                .build()
                .map_err(|e| service_error(SERVICE, e))?;

            let system_message = ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.clone())
                .build()
                .map_err(|e| service_error(SERVICE, e))?;

            let user_message = ChatCompletionRequestUserMessageArgs::default()
                .content(request.prompt.clone())
                .build()
                .map_err(|e| service_error(SERVICE, e))?;

            let chat_request = CreateChatCompletionRequestArgs::default()
                .model(&self.model)
                .messages(vec![
                    ChatCompletionRequestMessage::System(system_message),
                    ChatCompletionRequestMessage::User(user_message),
                ])
                .tools(vec![tool])
                .tool_choice("required")
                .temperature(request.temperature)
                .max_tokens(request.max_tokens)
                .build()
                .map_err(|e| service_error(SERVICE, e))?;

            let response = self
                .client
                .chat()
                .create(chat_request)
                .await
                .map_err(|e| service_error(SERVICE, e))?;

            let choice = response
                .choices
                .first()
                .ok_or_else(|| service_error(SERVICE, "response has no choices"))?;

            if let Some(tool_call) = choice.message.tool_calls.as_ref().and_then(|c| c.first()) {
                return serde_json::from_str(&tool_call.function.arguments)
                    .map_err(|e| PromoError::ParseError(e.to_string()));
            }

            // Some compatible gateways ignore tools and answer in plain content
            match choice.message.content.as_deref() {
                Some(content) if !content.trim().is_empty() => Ok(answer_from_text(content)),
                _ => Err(service_error(SERVICE, "No tool call or content in response")),
            }
        }
    }
}

pub mod anthropic {
    use super::*;
    use reqwest::StatusCode;

    pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";
    const SERVICE: &str = "Anthropic";
    const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

    /// Anthropic Claude provider implementation
    pub struct AnthropicProvider {
        client: reqwest::Client,
        api_key: String,
        model: String,
    }

    impl AnthropicProvider {
        pub fn new(api_key: String) -> Self {
            Self {
                client: reqwest::Client::new(),
                api_key,
                model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            }
        }

        pub fn with_model(mut self, model: String) -> Self {
            self.model = model;
            self
        }

        pub fn model(&self) -> &str {
            &self.model
        }
    }

    #[async_trait]
    impl LLMProvider for AnthropicProvider {
        fn name(&self) -> &str {
            "anthropic"
        }

        async fn generate(&self, request: &LlmRequest) -> Result<Value, PromoError> {
            let schema = serde_json::to_string_pretty(&request.schema)?;
            let system_prompt = format!(
                "{}\n\nRespond with a JSON object that matches this schema:\n\n{}\n\n\
                 Only return the JSON object, no explanations or markdown.",
                request.system, schema
            );

            let body = serde_json::json!({
                "model": self.model,
                "max_tokens": request.max_tokens,
                "temperature": request.temperature,
                "system": system_prompt,
                "messages": [{
                    "role": "user",
                    "content": request.prompt
                }]
            });

            let response = self
                .client
                .post(MESSAGES_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&body)
                .send()
                .await
                .map_err(|e| PromoError::FetchError(e.to_string()))?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                return Err(PromoError::AuthError("Anthropic rejected the API key".into()));
            }
            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(service_error(SERVICE, format!("API error {status}: {error_text}")));
            }

            let response_json: Value = response
                .json()
                .await
                .map_err(|e| PromoError::ParseError(e.to_string()))?;

            let content = response_json["content"][0]["text"]
                .as_str()
                .ok_or_else(|| service_error(SERVICE, "No content in response"))?;

            Ok(answer_from_text(content))
        }
    }
}
