pub mod openrouter;
pub mod prompts;

use std::ops::RangeInclusive;

use crate::error::{Result, VisionError};
use crate::image::ResolvedImage;

pub use openrouter::OpenRouterClient;

// -- Backend trait ----------------------------------------------------------

/// A vision-capable chat-completions service. Tools only see this trait, so
/// tests can swap in a recording backend.
#[async_trait::async_trait]
pub trait VisionBackend: Send + Sync {
    /// Human-readable name of this backend (e.g. "OpenRouter API").
    fn name(&self) -> &str;

    /// Send one system + user turn with the attached images and return the
    /// model's text answer.
    async fn analyze(&self, request: &VisionRequest) -> Result<String>;
}

/// Everything one outbound call needs.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub system_prompt: String,
    pub query: String,
    pub images: Vec<ResolvedImage>,
    pub params: GenerationParams,
}

// -- Generation parameters --------------------------------------------------

pub const MAX_TOKENS_RANGE: RangeInclusive<u64> = 100..=8000;
pub const DEFAULT_MAX_TOKENS: u64 = 4000;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Sampling parameters for one call, validated at the tool boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Opaque model identifier; the remote service rejects unknown ones.
    pub model: String,
    pub max_tokens: u64,
    pub temperature: f64,
    pub top_p: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub frequency_penalty: Option<f64>,
}

impl GenerationParams {
    /// Defaults for a call that only names the model.
    #[cfg(test)]
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: None,
            presence_penalty: None,
            frequency_penalty: None,
        }
    }

    /// Read and validate the generation parameters of a tool call.
    /// `default_model` is used when `model` is absent.
    pub fn from_tool_params(params: &serde_json::Value, default_model: &str) -> Result<Self> {
        let model = match params.get("model") {
            None | Some(serde_json::Value::Null) => default_model.to_string(),
            Some(v) => v
                .as_str()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .ok_or_else(|| {
                    VisionError::InvalidParams("model must be a non-empty string".into())
                })?
                .to_string(),
        };

        if model.is_empty() {
            return Err(VisionError::InvalidParams(
                "no model given and no default model configured".into(),
            ));
        }

        let max_tokens = match params.get("max_tokens") {
            None | Some(serde_json::Value::Null) => DEFAULT_MAX_TOKENS,
            Some(v) => v.as_u64().ok_or_else(|| {
                VisionError::InvalidParams("max_tokens must be a positive integer".into())
            })?,
        };
        if !MAX_TOKENS_RANGE.contains(&max_tokens) {
            return Err(VisionError::InvalidParams(format!(
                "max_tokens must be between {} and {}",
                MAX_TOKENS_RANGE.start(),
                MAX_TOKENS_RANGE.end()
            )));
        }

        let temperature =
            float_param(params, "temperature", 0.0..=1.0)?.unwrap_or(DEFAULT_TEMPERATURE);

        Ok(Self {
            model,
            max_tokens,
            temperature,
            top_p: float_param(params, "top_p", 0.0..=1.0)?,
            presence_penalty: float_param(params, "presence_penalty", 0.0..=2.0)?,
            frequency_penalty: float_param(params, "frequency_penalty", 0.0..=2.0)?,
        })
    }
}

fn float_param(
    params: &serde_json::Value,
    name: &str,
    range: RangeInclusive<f64>,
) -> Result<Option<f64>> {
    let value = match params.get(name) {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| VisionError::InvalidParams(format!("{name} must be a number")))?,
    };

    if !range.contains(&value) {
        return Err(VisionError::InvalidParams(format!(
            "{name} must be between {:.1} and {:.1}",
            range.start(),
            range.end()
        )));
    }

    Ok(Some(value))
}
