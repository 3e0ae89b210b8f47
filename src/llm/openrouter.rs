use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{VisionBackend, VisionRequest};
use crate::config::Config;
use crate::error::{Result, VisionError};

/// Vision client backed by the OpenRouter chat-completions API.
///
/// OpenRouter exposes an OpenAI-compatible endpoint that routes to many
/// vision models (Claude, GPT-4o, Qwen-VL, ...) through a single API key.
/// Images travel inline as `data:` URLs inside `image_url` content parts.
pub struct OpenRouterClient {
    client: Client,
    /// `None` when no key is configured; every call then fails before any
    /// network traffic.
    api_key: Option<String>,
    base_url: String,
    site_url: String,
    app_name: String,
}

// -- OpenAI-compatible request/response types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u64,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl OpenRouterClient {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.api_key().ok().map(str::to_string);
        if api_key.is_none() {
            warn!("OPENROUTER_API_KEY not set; tool calls will fail until it is configured");
        }

        let timeout_secs = if config.openrouter.timeout_secs > 0 {
            config.openrouter.timeout_secs
        } else {
            120
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| VisionError::Config(format!("failed to create HTTP client: {e}")))?;

        let base_url = config.openrouter.base_url.trim_end_matches('/').to_string();

        info!(
            base_url = %base_url,
            default_model = %config.openrouter.default_model,
            timeout_secs,
            app_name = %config.openrouter.app_name,
            "OpenRouter client initialized"
        );

        Ok(Self {
            client,
            api_key,
            base_url,
            site_url: config.openrouter.site_url.clone(),
            app_name: config.openrouter.app_name.clone(),
        })
    }

    /// Send one analysis request and return the plain-text answer.
    pub async fn analyze(&self, request: &VisionRequest) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            VisionError::Config(
                "OPENROUTER_API_KEY environment variable not set. \
                 Please set it to your OpenRouter API key."
                    .into(),
            )
        })?;

        let url = format!("{}/chat/completions", self.base_url);
        let params = &request.params;

        let mut parts = vec![ContentPart::Text {
            text: &request.query,
        }];
        parts.extend(request.images.iter().map(|img| ContentPart::ImageUrl {
            image_url: ImageUrl { url: img.data_url() },
        }));

        let body = ChatRequest {
            model: &params.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(&request.system_prompt),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(parts),
                },
            ],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            presence_penalty: params.presence_penalty,
            frequency_penalty: params.frequency_penalty,
        };

        debug!(
            model = %params.model,
            images = request.images.len(),
            query_len = request.query.len(),
            max_tokens = params.max_tokens,
            "invoking OpenRouter API"
        );

        let mut req = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json");

        if !self.site_url.is_empty() {
            req = req.header("HTTP-Referer", self.site_url.as_str());
        }
        if !self.app_name.is_empty() {
            req = req.header("X-Title", self.app_name.as_str());
        }

        let resp = req.json(&body).send().await.map_err(|e| {
            VisionError::Transport(format!("Network error when connecting to OpenRouter: {e}"))
        })?;

        let status = resp.status();

        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            let error_msg = if let Ok(err_resp) = serde_json::from_str::<ErrorResponse>(&error_text)
            {
                err_resp
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| error_text.clone())
            } else {
                error_text
            };

            warn!(
                status = %status,
                error = %error_msg,
                "OpenRouter API error"
            );

            return Err(VisionError::RemoteService {
                status: status.as_u16(),
                body: error_msg,
            });
        }

        let chat_resp: ChatResponse = resp.json().await.map_err(|e| {
            VisionError::Transport(format!("Error parsing OpenRouter response: {e}"))
        })?;

        if let Some(ref usage) = chat_resp.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "OpenRouter usage"
            );
        }

        let response = chat_resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
            .trim()
            .to_string();

        info!(
            response_len = response.len(),
            model = %params.model,
            "analysis completed"
        );

        if response.is_empty() {
            return Err(VisionError::Transport(
                "OpenRouter returned empty response".into(),
            ));
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl VisionBackend for OpenRouterClient {
    fn name(&self) -> &str {
        "OpenRouter API"
    }

    async fn analyze(&self, request: &VisionRequest) -> Result<String> {
        OpenRouterClient::analyze(self, request).await
    }
}
