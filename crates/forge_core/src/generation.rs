//! Prompt construction and generation backends.
//!
//! A [`GenerationRequest`] is everything a model needs for one turn: the
//! system instruction (persona, response format, current files, conversation
//! memory), the mode-specific turn text, inline images and sampling
//! parameters. Backends turn it into raw text; interpreting that text is the
//! job of [`crate::parse_response`].

use crate::config::{GenerationConfig, WorkflowConfig};
use crate::error::{ForgeError, Result};
use crate::types::{FileTree, ImageAttachment};
use serde::{Deserialize, Serialize};

const BASE_INSTRUCTION: &str = r#"You are an AI web app builder. You create and modify web applications by chatting with the user and editing their code in real time. The user sees a live preview of the project.

**ALWAYS PRODUCE WORKING CODE**
When the user asks for an application you MUST generate complete, functional HTML, CSS and JavaScript. Never answer with explanations alone.

**MINIMUM STRUCTURE FOR NEW APPLICATIONS:**
1. `index.html` - main page with a complete HTML5 document
2. `styles/style.css` - modern, responsive styles
3. `scripts/main.js` - interactive JavaScript

**PRINCIPLES:**
- Semantic HTML5, mobile-first responsive design, modern CSS (Grid, Flexbox, custom properties)
- Small, focused components and an organized folder layout (styles/, scripts/, assets/)
- Accessibility (ARIA, alt text) and working event handling

**REQUIRED RESPONSE FORMAT:**
Answer ONLY with a markdown code block holding one valid JSON object:

```json
{
  "message": "What you did, in one or two sentences",
  "plan": ["Step one", "Step two"],
  "file_changes": {
    "index.html": "<!DOCTYPE html>\n<html>...</html>",
    "styles/style.css": "/* styles */"
  }
}
```

**RULES:**
- `file_changes` holds the COMPLETE content of every file you create or modify
- To delete a file, use `null` as its value
- Escape special characters properly (\n for newlines, \" for quotes)
- Always include a viewport meta tag"#;

/// One request to a generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Persona, format rules, current files and conversation memory.
    pub system_instruction: String,
    /// Mode-specific turn text.
    pub prompt: String,
    /// Inline images attached to the turn.
    #[serde(default)]
    pub images: Vec<ImageAttachment>,
    /// Output token cap.
    pub max_output_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Something that turns a request into raw model text.
pub trait GenerationBackend {
    /// Runs one generation.
    ///
    /// # Errors
    ///
    /// Returns `Backend` for transport or API failures and `EmptyResponse`
    /// when the model produced no text.
    fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Builds system instructions and mode-specific prompts.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    workflow: WorkflowConfig,
    generation: GenerationConfig,
}

impl PromptBuilder {
    /// Creates a builder for the given settings.
    pub fn new(workflow: WorkflowConfig, generation: GenerationConfig) -> Self {
        Self {
            workflow,
            generation,
        }
    }

    /// System instruction for the current tree and conversation memory.
    pub fn system_instruction(&self, tree: &FileTree, conversation_context: &str) -> String {
        build_system_instruction(
            tree,
            &self.workflow.response_language,
            self.workflow.senior_mode,
            conversation_context,
        )
    }

    /// Turn text asking for a plan only.
    pub fn plan_prompt(&self, text: &str) -> String {
        format!(
            "PLAN MODE: Create a detailed plan for: \"{}\"\n\n\
             Analyze the request and produce a structured development plan covering:\n\
             1. Requirements analysis\n\
             2. Required file structure\n\
             3. Main features\n\
             4. Technologies to use\n\
             5. Implementation steps\n\n\
             Reply ONLY with the plan. Do not implement any code yet.",
            text
        )
    }

    /// Turn text asking for edits, prefixed by the approved plan if any.
    pub fn action_prompt(&self, text: &str, approved_plan: Option<&[String]>) -> String {
        match approved_plan {
            Some(plan) if !plan.is_empty() => {
                let steps = plan
                    .iter()
                    .enumerate()
                    .map(|(i, step)| format!("{}. {}", i + 1, step))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("APPROVED PLAN:\n{}\n\nIMPLEMENT: {}", steps, text)
            }
            _ => text.to_string(),
        }
    }

    /// Turn text asking for an explanation.
    pub fn discussion_prompt(&self, text: &str) -> String {
        format!(
            "DISCUSSION MODE: The user wants to talk about: \"{}\"\n\n\
             Give an explanatory, educational and useful answer. When appropriate, \
             suggest next steps or actions the user can take.\n\n\
             Do not implement code unless specifically asked.",
            text
        )
    }

    /// Assembles a request with the configured sampling parameters.
    pub fn request(
        &self,
        system_instruction: String,
        prompt: String,
        images: Vec<ImageAttachment>,
    ) -> GenerationRequest {
        GenerationRequest {
            system_instruction,
            prompt,
            images,
            max_output_tokens: self.generation.max_output_tokens,
            temperature: self.generation.temperature,
        }
    }
}

/// Full system instruction: base persona and format, current files, memory,
/// optional senior mode and the response language.
pub fn build_system_instruction(
    tree: &FileTree,
    language: &str,
    senior_mode: bool,
    conversation_context: &str,
) -> String {
    // BTreeMap serialization cannot fail
    let files = serde_json::to_string_pretty(tree).unwrap_or_else(|_| "{}".to_string());

    let mut instruction = format!(
        "{}\n\n**Current project files:**\n{}",
        BASE_INSTRUCTION, files
    );
    if !conversation_context.is_empty() {
        instruction.push_str(&format!("\n{}\n", conversation_context));
    }
    if senior_mode {
        instruction.push_str(
            "\n**SENIOR MODE:** Give more technical, code-focused answers. Be concise and direct.",
        );
    }
    instruction.push_str(&format!("\n**LANGUAGE:** Reply in {}.", language));
    instruction.push_str(
        "\n\n**IMPORTANT:** Always generate complete, working code. When the user asks for an \
         application you MUST create every needed file (HTML, CSS, JS) in full.",
    );
    instruction
}

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini REST backend (`generateContent`).
pub struct GeminiBackend {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    /// Creates a backend with an explicit key.
    pub fn new(api_key: impl Into<String>, config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ForgeError::Backend(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Creates a backend reading the key from `config.api_key_env`.
    pub fn from_env(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ForgeError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(api_key, config)
    }

    /// Model identifier in use.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl GeminiBackend {
    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }

    /// Builds the HTTP request. The key travels in a header so it never
    /// shows up in URLs or transport errors.
    fn http_request(&self, request: &GenerationRequest) -> Result<reqwest::blocking::Request> {
        self.client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&GenerateContentRequest::from_request(request))
            .build()
            .map_err(|e| ForgeError::Backend(format!("failed to build request: {}", e)))
    }
}

impl GenerationBackend for GeminiBackend {
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let http_request = self.http_request(request)?;

        tracing::debug!(
            model = %self.model,
            prompt_chars = request.prompt.len(),
            images = request.images.len(),
            "sending generation request"
        );

        let response = self
            .client
            .execute(http_request)
            .map_err(|e| ForgeError::Backend(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(ForgeError::Backend(describe_http_error(status.as_u16(), &body_text)));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .map_err(|e| ForgeError::Backend(format!("failed to decode response: {}", e)))?;

        let text = extract_text(parsed).ok_or(ForgeError::EmptyResponse)?;
        if text.trim().is_empty() {
            return Err(ForgeError::EmptyResponse);
        }
        tracing::debug!(chars = text.len(), "received generation response");
        Ok(text)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: GenerationParameters,
}

impl GenerateContentRequest {
    fn from_request(request: &GenerationRequest) -> Self {
        let mut parts = vec![Part::Text {
            text: request.prompt.clone(),
        }];
        parts.extend(request.images.iter().map(|img| Part::InlineData {
            inline_data: InlineData {
                mime_type: img.mime_type.clone(),
                data: img.data.clone(),
            },
        }));

        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text {
                    text: request.system_instruction.clone(),
                }],
            },
            generation_config: GenerationParameters {
                max_output_tokens: request.max_output_tokens,
                temperature: request.temperature,
            },
        }
    }
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationParameters {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Concatenates the text parts of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Option<String> {
    let content = response.candidates?.into_iter().next()?.content?;
    let texts: Vec<String> = content.parts.into_iter().filter_map(|p| p.text).collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.concat())
    }
}

fn describe_http_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorWrapper>(body) {
        Ok(wrapper) => {
            let message = wrapper.error.message.unwrap_or_else(|| body.to_string());
            match wrapper.error.status {
                Some(kind) if !kind.is_empty() => format!("HTTP {} {}: {}", status, kind, message),
                _ => format!("HTTP {}: {}", status, message),
            }
        }
        Err(_) => format!("HTTP {}: {}", status, body),
    }
}
