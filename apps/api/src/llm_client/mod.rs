/// Generation client: the single point of entry for all generative-AI calls.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// All model interactions MUST go through `GenerationClient`.
///
/// Model: gemini-2.5-flash (hardcoded; do not make configurable to prevent drift)
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod prompts;
pub mod schema;
#[cfg(test)]
pub mod testing;

pub use schema::Schema;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
/// The model used for every generation call.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "gemini-2.5-flash";
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Generation API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Generation backend returned empty content")]
    EmptyContent,

    #[error("Response did not match the expected shape: {0}")]
    SchemaViolation(String),
}

impl GenerationError {
    /// Transport-level failures may succeed if the caller tries again.
    /// Shape violations are surfaced as-is and left to the user.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::Transport(_) | GenerationError::Api { .. }
        )
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        GenerationError::Transport(e.to_string())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Prompt model
// ────────────────────────────────────────────────────────────────────────────

/// A base64-encoded image sent alongside the prompt text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttachment {
    pub mime_type: String,
    pub data: String,
}

impl ImageAttachment {
    /// Checks the mime type and that `data` is decodable base64.
    pub fn validate(&self) -> Result<(), String> {
        if !self.mime_type.starts_with("image/") {
            return Err(format!(
                "Unsupported image type '{}'; expected image/*",
                self.mime_type
            ));
        }
        if self.data.trim().is_empty() {
            return Err("Image data is empty".to_string());
        }
        base64::engine::general_purpose::STANDARD
            .decode(self.data.trim())
            .map_err(|e| format!("Image data is not valid base64: {e}"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PromptPart {
    Text(String),
    Image(ImageAttachment),
}

/// An ordered multi-part prompt. The text always comes first, images after it,
/// and the whole prompt is sent as a single user message.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    parts: Vec<PromptPart>,
}

impl Prompt {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![PromptPart::Text(text.into())],
        }
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.parts.push(PromptPart::Image(image));
        self
    }

    pub fn with_images(self, images: impl IntoIterator<Item = ImageAttachment>) -> Self {
        images.into_iter().fold(self, Prompt::with_image)
    }

    pub fn parts(&self) -> &[PromptPart] {
        &self.parts
    }

    /// Concatenated text parts.
    #[cfg(test)]
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                PromptPart::Text(t) => Some(t.as_str()),
                PromptPart::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[cfg(test)]
    pub fn image_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, PromptPart::Image(_)))
            .count()
    }
}

/// One completion call. `label` names the calling stage for logs.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub label: &'a str,
    pub system: &'a str,
    pub prompt: &'a Prompt,
    pub schema: Option<&'a Schema>,
}

#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: Option<Usage>,
}

/// A generative backend. Implement this to swap providers without touching
/// the pipeline, the selector, or handler code.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest<'_>)
        -> Result<Completion, GenerationError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Typed client
// ────────────────────────────────────────────────────────────────────────────

/// The typed wrapper every caller uses. Holds no per-call state.
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Requests JSON matching `schema`, validates it, and deserializes it into `T`.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        label: &str,
        system: &str,
        prompt: &Prompt,
        schema: &Schema,
    ) -> Result<T, GenerationError> {
        let completion = self
            .backend
            .complete(CompletionRequest {
                label,
                system,
                prompt,
                schema: Some(schema),
            })
            .await?;
        log_usage(label, &completion);

        let text = strip_json_fences(&completion.text);
        if text.is_empty() {
            return Err(GenerationError::EmptyContent);
        }

        let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
            GenerationError::SchemaViolation(format!("response is not valid JSON: {e}"))
        })?;
        schema
            .validate(&value)
            .map_err(GenerationError::SchemaViolation)?;
        serde_json::from_value(value).map_err(|e| GenerationError::SchemaViolation(e.to_string()))
    }

    /// Requests unstructured prose and returns it trimmed.
    pub async fn call_text(
        &self,
        label: &str,
        system: &str,
        prompt: &Prompt,
    ) -> Result<String, GenerationError> {
        let completion = self
            .backend
            .complete(CompletionRequest {
                label,
                system,
                prompt,
                schema: None,
            })
            .await?;
        log_usage(label, &completion);

        let text = completion.text.trim();
        if text.is_empty() {
            return Err(GenerationError::EmptyContent);
        }
        Ok(text.to_string())
    }
}

fn log_usage(label: &str, completion: &Completion) {
    match &completion.usage {
        Some(usage) => debug!(
            "Generation '{}' succeeded: input_tokens={}, output_tokens={}",
            label, usage.input_tokens, usage.output_tokens
        ),
        None => debug!("Generation '{}' succeeded", label),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini backend
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum GeminiPart<'a> {
    Text(&'a str),
    InlineData {
        #[serde(rename = "mimeType")]
        mime_type: &'a str,
        data: &'a str,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
    response_schema: &'a Schema,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

impl GeminiResponse {
    /// Concatenates the text parts of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        Some(text)
    }
}

fn build_request_body<'a>(request: &CompletionRequest<'a>) -> GeminiRequest<'a> {
    let parts = request
        .prompt
        .parts()
        .iter()
        .map(|part| match part {
            PromptPart::Text(text) => GeminiPart::Text(text),
            PromptPart::Image(image) => GeminiPart::InlineData {
                mime_type: &image.mime_type,
                data: &image.data,
            },
        })
        .collect();

    GeminiRequest {
        system_instruction: GeminiContent {
            role: None,
            parts: vec![GeminiPart::Text(request.system)],
        },
        contents: vec![GeminiContent {
            role: Some("user"),
            parts,
        }],
        generation_config: request.schema.map(|schema| GenerationConfig {
            response_mime_type: "application/json",
            response_schema: schema,
        }),
    }
}

/// Gemini `generateContent` over HTTPS. One attempt per call: retries are
/// decided by the user, never here.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Result<Self, GenerationError> {
        if api_key.trim().is_empty() {
            return Err(GenerationError::Configuration(
                "GEMINI_API_KEY is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                GenerationError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{GEMINI_API_BASE}/{MODEL}:generateContent"),
        })
    }
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    async fn complete(
        &self,
        request: CompletionRequest<'_>,
    ) -> Result<Completion, GenerationError> {
        let body = build_request_body(&request);
        debug!(
            "Generation '{}': {} prompt part(s), schema={}",
            request.label,
            request.prompt.parts().len(),
            request.schema.is_some()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GeminiResponse = response.json().await?;
        let text = parsed.text().ok_or(GenerationError::EmptyContent)?;
        let usage = parsed.usage_metadata.map(|u| Usage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        });

        Ok(Completion { text, usage })
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::testing::ScriptedBackend;
    use super::*;

    fn png() -> ImageAttachment {
        ImageAttachment {
            mime_type: "image/png".to_string(),
            data: "aGVsbG8=".to_string(),
        }
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_request_body_keeps_text_before_images_in_one_message() {
        let prompt = Prompt::text("Job posting below").with_images(vec![png(), png()]);
        let schema = Schema::array(Schema::string());
        let request = CompletionRequest {
            label: "test",
            system: "be precise",
            prompt: &prompt,
            schema: Some(&schema),
        };

        let body = serde_json::to_value(build_request_body(&request)).unwrap();
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 1, "all parts must travel in one message");

        let parts = contents[0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["text"], "Job posting below");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[2]["inlineData"]["data"], "aGVsbG8=");

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be precise");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "ARRAY");
    }

    #[test]
    fn test_request_body_omits_generation_config_for_text_calls() {
        let prompt = Prompt::text("Write a letter");
        let request = CompletionRequest {
            label: "test",
            system: "sys",
            prompt: &prompt,
            schema: None,
        };
        let body = serde_json::to_value(build_request_body(&request)).unwrap();
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_gemini_response_concatenates_first_candidate_parts() {
        let json = r#"{
            "candidates": [{"content": {"parts": [{"text": "[\"a\","}, {"text": "\"b\"]"}]}}],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 4}
        }"#;
        let parsed: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.text().as_deref(), Some("[\"a\",\"b\"]"));
    }

    #[test]
    fn test_gemini_client_rejects_blank_key() {
        let result = GeminiClient::new("   ".to_string());
        assert!(matches!(result, Err(GenerationError::Configuration(_))));
    }

    #[test]
    fn test_image_attachment_validation() {
        assert!(png().validate().is_ok());

        let wrong_type = ImageAttachment {
            mime_type: "application/pdf".to_string(),
            data: "aGVsbG8=".to_string(),
        };
        assert!(wrong_type.validate().is_err());

        let bad_data = ImageAttachment {
            mime_type: "image/jpeg".to_string(),
            data: "not base64 !!".to_string(),
        };
        assert!(bad_data.validate().is_err());
    }

    #[derive(Debug, Deserialize)]
    struct Pair {
        name: String,
        count: i64,
    }

    fn pair_schema() -> Schema {
        Schema::object([("name", Schema::string()), ("count", Schema::number())])
    }

    #[tokio::test]
    async fn test_call_json_parses_fenced_valid_output() {
        let backend = ScriptedBackend::new(|_| Ok("```json\n{\"name\": \"x\", \"count\": 2}\n```".into()));
        let client = GenerationClient::new(backend);
        let pair: Pair = client
            .call_json("test", "sys", &Prompt::text("p"), &pair_schema())
            .await
            .unwrap();
        assert_eq!(pair.name, "x");
        assert_eq!(pair.count, 2);
    }

    #[tokio::test]
    async fn test_call_json_flags_missing_required_field_as_schema_violation() {
        let backend = ScriptedBackend::new(|_| Ok("{\"name\": \"x\"}".into()));
        let client = GenerationClient::new(backend);
        let err = client
            .call_json::<Pair>("test", "sys", &Prompt::text("p"), &pair_schema())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::SchemaViolation(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_call_json_flags_prose_as_schema_violation() {
        let backend = ScriptedBackend::new(|_| Ok("Sure! Here is your JSON.".into()));
        let client = GenerationClient::new(backend);
        let err = client
            .call_json::<Pair>("test", "sys", &Prompt::text("p"), &pair_schema())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn test_call_text_trims_and_rejects_empty() {
        let backend = ScriptedBackend::new(|_| Ok("  Dear team,\n\nHello.  \n".into()));
        let client = GenerationClient::new(backend);
        let text = client
            .call_text("test", "sys", &Prompt::text("p"))
            .await
            .unwrap();
        assert_eq!(text, "Dear team,\n\nHello.");

        let empty = GenerationClient::new(ScriptedBackend::new(|_| Ok("   ".into())));
        let err = empty
            .call_text("test", "sys", &Prompt::text("p"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::EmptyContent));
    }

    #[tokio::test]
    async fn test_transport_errors_pass_through_and_are_retryable() {
        let backend =
            ScriptedBackend::new(|_| Err(GenerationError::Transport("connection reset".into())));
        let client = GenerationClient::new(backend);
        let err = client
            .call_text("test", "sys", &Prompt::text("p"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
