use std::path::Path;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{Tool, ToolContext, ToolOutput};
use crate::error::{Result, VisionError};
use crate::image::resolve_image;
use crate::llm::{GenerationParams, VisionRequest, prompts};

const MIN_COMPARE_IMAGES: usize = 2;
const MAX_COMPARE_IMAGES: usize = 4;

const IMAGE_DESCRIPTION: &str = "The image as a local file path (absolute, or relative together \
with project_root), a public URL, a base64-encoded string, or a data URL";

/// Non-empty string parameter.
fn str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

/// Schema properties shared by every vision tool.
fn common_properties() -> serde_json::Map<String, Value> {
    json!({
        "system_prompt": {
            "type": "string",
            "description": "Instructions defining the model's role and behavior"
        },
        "model": {
            "type": "string",
            "description": "Vision model identifier (defaults to the server's configured model)"
        },
        "max_tokens": {
            "type": "integer",
            "minimum": 100,
            "maximum": 8000,
            "description": "Maximum number of tokens in the response (default 4000)"
        },
        "temperature": {
            "type": "number",
            "minimum": 0.0,
            "maximum": 1.0,
            "description": "Sampling temperature (default 0.7)"
        },
        "top_p": {
            "type": "number",
            "minimum": 0.0,
            "maximum": 1.0,
            "description": "Nucleus sampling parameter"
        },
        "presence_penalty": {
            "type": "number",
            "minimum": 0.0,
            "maximum": 2.0,
            "description": "Penalty for tokens already present in the text so far"
        },
        "frequency_penalty": {
            "type": "number",
            "minimum": 0.0,
            "maximum": 2.0,
            "description": "Penalty for tokens by their frequency in the text so far"
        },
        "project_root": {
            "type": "string",
            "description": "Root directory to resolve relative image paths against"
        }
    })
    .as_object()
    .cloned()
    .unwrap_or_default()
}

fn schema(required: &[&str], extra: Value) -> Value {
    let mut props = common_properties();
    if let Value::Object(extra) = extra {
        props.extend(extra);
    }
    json!({
        "type": "object",
        "required": required,
        "properties": props,
    })
}

/// Resolve every image, then send one request to the vision backend.
///
/// Parameter and image problems come back as a failed [`ToolOutput`] the
/// caller can act on; backend failures propagate as errors.
async fn run_vision_call(
    tool: &str,
    params: &Value,
    ctx: &ToolContext,
    references: &[&str],
    system_prompt: String,
    query: String,
) -> Result<ToolOutput> {
    let generation = match GenerationParams::from_tool_params(params, &ctx.default_model) {
        Ok(g) => g,
        Err(e) => return Ok(ToolOutput::error(e.to_string())),
    };

    let project_root = str_param(params, "project_root").map(Path::new);

    let mut images = Vec::with_capacity(references.len());
    for reference in references {
        match resolve_image(reference, project_root, &ctx.image, &ctx.http_client).await {
            Ok(image) => images.push(image),
            Err(e @ VisionError::ImageProcessing(_)) => {
                return Ok(ToolOutput::error(e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    let mime_types: Vec<_> = images.iter().map(|i| i.mime_type.clone()).collect();

    info!(
        tool,
        model = %generation.model,
        backend = ctx.vision.name(),
        images = images.len(),
        "sending vision request"
    );

    let request = VisionRequest {
        system_prompt,
        query,
        images,
        params: generation,
    };

    let answer = ctx.vision.analyze(&request).await?;

    Ok(ToolOutput::ok_with_meta(
        answer,
        json!({
            "model": request.params.model,
            "mime_types": mime_types,
        }),
    ))
}

// -- ImageAnalysis ---------------------------------------------------------

/// Describe or answer questions about one image.
pub struct ImageAnalysisTool;

#[async_trait]
impl Tool for ImageAnalysisTool {
    fn name(&self) -> &str {
        "image_analysis"
    }

    fn description(&self) -> &str {
        "Analyze an image with a vision model. Provide a query with context about why you are \
         analyzing the image and what information you need; specific, purposeful queries give \
         more useful answers."
    }

    fn parameters_schema(&self) -> Value {
        schema(
            &["image"],
            json!({
                "image": {"type": "string", "description": IMAGE_DESCRIPTION},
                "query": {
                    "type": "string",
                    "description": "What to analyze (default: 'Describe this image in detail')"
                }
            }),
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let Some(image) = str_param(&params, "image") else {
            return Ok(ToolOutput::error("image is required"));
        };

        let query = str_param(&params, "query").unwrap_or(prompts::ANALYSIS_QUERY);
        let system_prompt =
            str_param(&params, "system_prompt").unwrap_or(prompts::ANALYSIS_SYSTEM_PROMPT);

        debug!(query_len = query.len(), "image analysis requested");

        run_vision_call(
            self.name(),
            &params,
            ctx,
            &[image],
            system_prompt.to_string(),
            query.to_string(),
        )
        .await
    }
}

// -- ExtractText -----------------------------------------------------------

/// Transcribe the text visible in one image.
pub struct ExtractTextTool;

#[async_trait]
impl Tool for ExtractTextTool {
    fn name(&self) -> &str {
        "extract_text"
    }

    fn description(&self) -> &str {
        "Extract all visible text from an image (screenshots, documents, signs, receipts), \
         preserving layout where possible."
    }

    fn parameters_schema(&self) -> Value {
        schema(
            &["image"],
            json!({
                "image": {"type": "string", "description": IMAGE_DESCRIPTION},
                "query": {
                    "type": "string",
                    "description": "Override the extraction instruction"
                },
                "language": {
                    "type": "string",
                    "description": "Expected language of the text, e.g. 'Japanese'"
                }
            }),
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let Some(image) = str_param(&params, "image") else {
            return Ok(ToolOutput::error("image is required"));
        };

        let query = prompts::text_extraction_query(
            str_param(&params, "query").unwrap_or(prompts::TEXT_EXTRACTION_QUERY),
            str_param(&params, "language"),
        );
        let system_prompt = str_param(&params, "system_prompt")
            .unwrap_or(prompts::TEXT_EXTRACTION_SYSTEM_PROMPT);

        run_vision_call(
            self.name(),
            &params,
            ctx,
            &[image],
            system_prompt.to_string(),
            query,
        )
        .await
    }
}

// -- CompareImages ---------------------------------------------------------

/// Compare two to four images in a single request.
pub struct CompareImagesTool;

#[async_trait]
impl Tool for CompareImagesTool {
    fn name(&self) -> &str {
        "compare_images"
    }

    fn description(&self) -> &str {
        "Compare two to four images and describe their similarities and differences, e.g. \
         before/after screenshots or design revisions."
    }

    fn parameters_schema(&self) -> Value {
        schema(
            &["images"],
            json!({
                "images": {
                    "type": "array",
                    "items": {"type": "string", "description": IMAGE_DESCRIPTION},
                    "minItems": MIN_COMPARE_IMAGES,
                    "maxItems": MAX_COMPARE_IMAGES,
                    "description": "Images to compare, in order"
                },
                "query": {
                    "type": "string",
                    "description": "What to compare (default: similarities and differences)"
                }
            }),
        )
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let Some(items) = params.get("images").and_then(|v| v.as_array()) else {
            return Ok(ToolOutput::error("images is required and must be an array"));
        };

        let references: Option<Vec<&str>> = items
            .iter()
            .map(|v| v.as_str().filter(|s| !s.trim().is_empty()))
            .collect();
        let Some(references) = references else {
            return Ok(ToolOutput::error("every entry of images must be a non-empty string"));
        };

        if !(MIN_COMPARE_IMAGES..=MAX_COMPARE_IMAGES).contains(&references.len()) {
            return Ok(ToolOutput::error(format!(
                "images must contain between {MIN_COMPARE_IMAGES} and {MAX_COMPARE_IMAGES} entries, got {}",
                references.len()
            )));
        }

        let query = str_param(&params, "query").unwrap_or(prompts::COMPARISON_QUERY);
        let system_prompt =
            str_param(&params, "system_prompt").unwrap_or(prompts::COMPARISON_SYSTEM_PROMPT);

        run_vision_call(
            self.name(),
            &params,
            ctx,
            &references,
            system_prompt.to_string(),
            query.to_string(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{RecordingBackend, test_ctx};

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[tokio::test]
    async fn analysis_uses_defaults() {
        let backend = RecordingBackend::answering("A cat on a sofa.");
        let ctx = test_ctx(backend.clone());

        let out = ImageAnalysisTool
            .execute(json!({"image": "SGVsbG8gV29ybGQ="}), &ctx)
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.output, "A cat on a sofa.");
        assert_eq!(out.metadata.unwrap()["mime_types"], json!(["image/jpeg"]));

        let sent = backend.recorded();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].query, prompts::ANALYSIS_QUERY);
        assert_eq!(sent[0].system_prompt, prompts::ANALYSIS_SYSTEM_PROMPT);
        assert_eq!(sent[0].params.model, "qwen/qwen2.5-vl-32b-instruct:free");
        assert_eq!(sent[0].images[0].payload_base64, "SGVsbG8gV29ybGQ=");
    }

    #[tokio::test]
    async fn analysis_resolves_relative_path_with_project_root() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("ui.jpg"), PNG).unwrap();

        let backend = RecordingBackend::answering("A login form.");
        let ctx = test_ctx(backend.clone());
        let out = ImageAnalysisTool
            .execute(
                json!({
                    "image": "ui.jpg",
                    "project_root": root.path().to_str().unwrap(),
                    "query": "Which fields does this form have?",
                    "model": "anthropic/claude-3-5-sonnet",
                }),
                &ctx,
            )
            .await
            .unwrap();
        assert!(out.success, "{}", out.output);

        let sent = backend.recorded();
        assert_eq!(sent[0].images[0].mime_type, "image/png");
        assert_eq!(sent[0].query, "Which fields does this form have?");
        assert_eq!(sent[0].params.model, "anthropic/claude-3-5-sonnet");
    }

    #[tokio::test]
    async fn missing_image_is_reported() {
        let backend = RecordingBackend::answering("unused");
        let ctx = test_ctx(backend.clone());
        let out = ImageAnalysisTool.execute(json!({}), &ctx).await.unwrap();
        assert!(!out.success);
        assert!(out.output.contains("image is required"));
        assert!(backend.recorded().is_empty());
    }

    #[tokio::test]
    async fn invalid_params_rejected_before_backend() {
        let backend = RecordingBackend::answering("unused");
        let ctx = test_ctx(backend.clone());
        let out = ImageAnalysisTool
            .execute(json!({"image": "SGVsbG8gV29ybGQ=", "temperature": 3.0}), &ctx)
            .await
            .unwrap();
        assert!(!out.success);
        assert!(out.output.contains("temperature must be between 0.0 and 1.0"));
        assert!(backend.recorded().is_empty());
    }

    #[tokio::test]
    async fn unresolvable_image_returns_guidance() {
        let backend = RecordingBackend::answering("unused");
        let ctx = test_ctx(backend.clone());
        let out = ImageAnalysisTool
            .execute(json!({"image": "no/such/openvision-image.png"}), &ctx)
            .await
            .unwrap();
        assert!(!out.success);
        assert!(out.output.starts_with("Failed to process image:"));
        assert!(out.output.contains("without specifying project_root"));
        assert!(out.output.contains("For relative paths, specify the project_root parameter"));
        assert!(backend.recorded().is_empty());
    }

    #[tokio::test]
    async fn backend_failure_propagates() {
        let backend = RecordingBackend::failing(429, "rate limited");
        let ctx = test_ctx(backend);
        let err = ImageAnalysisTool
            .execute(json!({"image": "SGVsbG8gV29ybGQ="}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::RemoteService { status: 429, .. }));
    }

    #[tokio::test]
    async fn extract_text_adds_language_hint() {
        let backend = RecordingBackend::answering("TOTAL 12.50");
        let ctx = test_ctx(backend.clone());
        let out = ExtractTextTool
            .execute(json!({"image": "data:image/png;base64,iVBORw0KGgo=", "language": "French"}), &ctx)
            .await
            .unwrap();
        assert!(out.success);

        let sent = backend.recorded();
        assert_eq!(sent[0].system_prompt, prompts::TEXT_EXTRACTION_SYSTEM_PROMPT);
        assert!(sent[0].query.contains("French"));
        assert_eq!(sent[0].images[0].mime_type, "image/png");
    }

    #[tokio::test]
    async fn compare_sends_all_images_in_order() {
        let backend = RecordingBackend::answering("The second has a blue button.");
        let ctx = test_ctx(backend.clone());
        let out = CompareImagesTool
            .execute(
                json!({"images": ["data:image/png;base64,AAAA", "data:image/webp;base64,BBBB"]}),
                &ctx,
            )
            .await
            .unwrap();
        assert!(out.success);

        let sent = backend.recorded();
        let payloads: Vec<_> = sent[0].images.iter().map(|i| i.payload_base64.as_str()).collect();
        assert_eq!(payloads, vec!["AAAA", "BBBB"]);
        assert_eq!(sent[0].query, prompts::COMPARISON_QUERY);
    }

    #[tokio::test]
    async fn compare_validates_image_count() {
        let backend = RecordingBackend::answering("unused");
        let ctx = test_ctx(backend.clone());

        for images in [json!(["AAAA"]), json!(["AAAA", "AAAA", "AAAA", "AAAA", "AAAA"])] {
            let out = CompareImagesTool
                .execute(json!({"images": images}), &ctx)
                .await
                .unwrap();
            assert!(!out.success);
            assert!(out.output.contains("between 2 and 4"));
        }

        let out = CompareImagesTool
            .execute(json!({"images": ["AAAA", 7]}), &ctx)
            .await
            .unwrap();
        assert!(!out.success);

        let out = CompareImagesTool.execute(json!({}), &ctx).await.unwrap();
        assert!(!out.success);
        assert!(backend.recorded().is_empty());
    }

    #[tokio::test]
    async fn compare_stops_at_first_bad_image() {
        let backend = RecordingBackend::answering("unused");
        let ctx = test_ctx(backend.clone());
        let out = CompareImagesTool
            .execute(json!({"images": ["AAAA", "data:image/png,raw"]}), &ctx)
            .await
            .unwrap();
        assert!(!out.success);
        assert!(out.output.contains("base64,"));
        assert!(backend.recorded().is_empty());
    }
}
