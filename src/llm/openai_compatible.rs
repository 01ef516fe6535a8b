// ABOUTME: OpenAI chat completions provider used for coaching plans and the coaching agent
// ABOUTME: Supports strict JSON schema output, tool calling, SSE streaming and retry of the initial request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # `OpenAI`-Compatible Provider
//!
//! Talks to any endpoint implementing the `OpenAI` chat completions API. The
//! coaching plan generator relies on `response_format` with a strict JSON
//! schema; the agent relies on function calling.
//!
//! ## Configuration
//!
//! - `OPENAI_API_KEY`: API key (required for hosted `OpenAI`)
//! - `OPENAI_BASE_URL`: Base URL (default: <https://api.openai.com/v1>)
//! - `OPENAI_MODEL`: Model to use (default: `gpt-4o-mini`)

use std::collections::BTreeMap;
use std::mem;
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use super::sse_parser::{
    create_sse_stream, is_retryable_request_error, is_retryable_status, RetryConfig, SseEvent,
    SseLineBuffer,
};
use super::{
    ChatMessage, ChatRequest, ChatResponse, ChatResponseWithTools, ChatStream, FunctionCall,
    JsonSchemaFormat, LlmCapabilities, LlmProvider, StreamChunk, TokenUsage, Tool,
};
use crate::config::LlmConfig;
use crate::constants::defaults;
use crate::errors::{AppError, ErrorCode};

/// Service label used in error messages
const SERVICE_NAME: &str = "OpenAI";

/// Connection timeout
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Request timeout covering a full non-streaming completion
const REQUEST_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAiResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAiResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: OpenAiJsonSchema,
}

#[derive(Debug, Serialize)]
struct OpenAiJsonSchema {
    name: String,
    schema: Value,
    strict: bool,
}

impl From<&JsonSchemaFormat> for OpenAiResponseFormat {
    fn from(format: &JsonSchemaFormat) -> Self {
        Self {
            format_type: "json_schema",
            json_schema: OpenAiJsonSchema {
                name: format.name.clone(),
                schema: format.schema.clone(),
                strict: format.strict,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

impl From<&ChatMessage> for OpenAiMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<OpenAiUsage> for TokenUsage {
    fn from(usage: OpenAiUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCallDelta>>,
}

/// Fragment of a tool call; `index` ties fragments of one call together
#[derive(Debug, Deserialize)]
struct OpenAiToolCallDelta {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<OpenAiFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Reassembles streamed tool call fragments by index
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    calls: BTreeMap<usize, OpenAiToolCall>,
}

impl ToolCallAccumulator {
    fn absorb(&mut self, fragments: Vec<OpenAiToolCallDelta>) {
        for fragment in fragments {
            let call = self
                .calls
                .entry(fragment.index)
                .or_insert_with(|| OpenAiToolCall {
                    id: String::new(),
                    function: OpenAiFunctionCall {
                        name: String::new(),
                        arguments: String::new(),
                    },
                });
            if let Some(id) = fragment.id {
                call.id = id;
            }
            if let Some(function) = fragment.function {
                if let Some(name) = function.name {
                    call.function.name.push_str(&name);
                }
                if let Some(arguments) = function.arguments {
                    call.function.arguments.push_str(&arguments);
                }
            }
        }
    }

    fn finish(&mut self, finish_reason: Option<String>) -> StreamChunk {
        let calls: Vec<OpenAiToolCall> = mem::take(&mut self.calls)
            .into_values()
            .filter(|call| !call.function.name.is_empty())
            .collect();
        let mut chunk = StreamChunk::finished(finish_reason);
        if !calls.is_empty() {
            info!("OpenAI streamed {} tool calls", calls.len());
            chunk.function_calls = Some(OpenAiCompatibleProvider::convert_tool_calls(&calls));
        }
        chunk
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Configuration for the `OpenAI`-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Bearer API key
    pub api_key: Option<String>,
    /// Model used when a request does not name one
    pub default_model: String,
    /// Capabilities advertised to callers
    pub capabilities: LlmCapabilities,
    /// Retry policy for the initial request
    pub retry: RetryConfig,
}

impl OpenAiCompatibleConfig {
    /// Hosted `OpenAI` configuration
    #[must_use]
    pub fn openai(api_key: Option<String>, model: &str) -> Self {
        Self {
            base_url: defaults::OPENAI_BASE_URL.to_owned(),
            api_key,
            default_model: model.to_owned(),
            capabilities: LlmCapabilities::full_featured(),
            retry: RetryConfig::default_config(),
        }
    }

    /// Use a different base URL, e.g. a proxy or a local mock server
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the retry policy
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl From<&LlmConfig> for OpenAiCompatibleConfig {
    fn from(config: &LlmConfig) -> Self {
        Self::openai(config.api_key.clone(), &config.model).with_base_url(config.base_url.clone())
    }
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// `OpenAI` chat completions provider
pub struct OpenAiCompatibleProvider {
    client: Client,
    config: OpenAiCompatibleConfig,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider with the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: OpenAiCompatibleConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        info!(
            "Initializing OpenAI provider: base_url={}, model={}, api_key={}",
            config.base_url,
            config.default_model,
            if config.api_key.is_some() { "set" } else { "missing" }
        );

        Ok(Self { client, config })
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.config.base_url.trim_end_matches('/'))
    }

    fn model_for<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        request
            .model
            .as_deref()
            .unwrap_or(&self.config.default_model)
    }

    /// Translate a generic request into the wire format
    fn build_request(
        &self,
        request: &ChatRequest,
        stream: bool,
        tools: Option<&[Tool]>,
    ) -> OpenAiRequest {
        let response_format = request
            .response_format
            .as_ref()
            .filter(|_| self.config.capabilities.supports_json_mode())
            .map(OpenAiResponseFormat::from);
        let tools = tools
            .filter(|_| self.config.capabilities.supports_function_calling())
            .map(Self::convert_tools)
            .filter(|t| !t.is_empty());

        OpenAiRequest {
            model: self.model_for(request).to_owned(),
            messages: request.messages.iter().map(OpenAiMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: Some(stream),
            response_format,
            tool_choice: tools.as_ref().map(|_| "auto".to_owned()),
            tools,
        }
    }

    fn add_auth_header(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(ref api_key) = self.config.api_key {
            request.bearer_auth(api_key)
        } else {
            request
        }
    }

    /// Post a completion request, retrying transient failures with backoff
    async fn send_with_retry(&self, body: &OpenAiRequest) -> Result<Response, AppError> {
        let retry = &self.config.retry;
        let mut attempt = 0;

        loop {
            let http_request = self
                .client
                .post(self.api_url("chat/completions"))
                .header("Content-Type", "application/json")
                .json(body);

            match self.add_auth_header(http_request).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response)
                    if is_retryable_status(response.status().as_u16())
                        && attempt < retry.max_retries =>
                {
                    warn!(
                        "OpenAI returned {} (attempt {}/{}), retrying",
                        response.status(),
                        attempt + 1,
                        retry.max_retries
                    );
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Self::parse_error_response(status, &body));
                }
                Err(e) if is_retryable_request_error(&e) && attempt < retry.max_retries => {
                    warn!(
                        "OpenAI request failed (attempt {}/{}): {e}",
                        attempt + 1,
                        retry.max_retries
                    );
                }
                Err(e) => {
                    error!("Failed to send request to OpenAI: {e}");
                    return Err(if e.is_connect() {
                        AppError::new(
                            ErrorCode::ExternalServiceUnavailable,
                            format!("Cannot connect to {}", self.config.base_url),
                        )
                    } else {
                        AppError::external_service(SERVICE_NAME, format!("Request failed: {e}"))
                    });
                }
            }

            sleep(retry.delay_for_attempt(attempt)).await;
            attempt += 1;
        }
    }

    /// Send a non-streaming request and decode the first choice
    async fn send_completion(
        &self,
        body: &OpenAiRequest,
    ) -> Result<(OpenAiChoice, String, Option<TokenUsage>), AppError> {
        let response = self.send_with_retry(body).await?;
        let text = response.text().await.map_err(|e| {
            AppError::external_service(SERVICE_NAME, format!("Failed to read response: {e}"))
        })?;

        let parsed: OpenAiResponse = serde_json::from_str(&text).map_err(|e| {
            error!(
                "Failed to parse OpenAI response: {e} - body: {}",
                text.chars().take(500).collect::<String>()
            );
            AppError::external_service(SERVICE_NAME, format!("Failed to parse response: {e}"))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::external_service(SERVICE_NAME, "API returned no choices"))?;

        Ok((choice, parsed.model, parsed.usage.map(TokenUsage::from)))
    }

    /// Map an error response onto the application error taxonomy
    fn parse_error_response(status: StatusCode, body: &str) -> AppError {
        let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(body) else {
            return match status.as_u16() {
                502..=504 => AppError::new(
                    ErrorCode::ExternalServiceUnavailable,
                    "OpenAI is not responding",
                ),
                _ => AppError::external_service(
                    SERVICE_NAME,
                    format!("API error ({status}): {}", body.chars().take(200).collect::<String>()),
                ),
            };
        };

        let detail = error_response.error;
        match status.as_u16() {
            401 => AppError::auth_invalid(format!("API authentication failed: {}", detail.message)),
            429 => AppError::new(
                ErrorCode::ExternalRateLimited,
                Self::extract_rate_limit_message(&detail.message),
            ),
            400 => AppError::invalid_input(format!("API validation error: {}", detail.message)),
            404 => AppError::not_found(format!("Model or endpoint ({})", detail.message)),
            503 => AppError::new(
                ErrorCode::ExternalServiceUnavailable,
                format!("Service unavailable: {}", detail.message),
            ),
            _ => AppError::external_service(
                SERVICE_NAME,
                format!(
                    "{} - {}",
                    detail.error_type.as_deref().unwrap_or("unknown"),
                    detail.message
                ),
            ),
        }
    }

    /// Turn "Please try again in 1.5s" into a client-facing message
    fn extract_rate_limit_message(message: &str) -> String {
        const MARKER: &str = "try again in ";
        let lower = message.to_lowercase();
        if let Some(pos) = lower.find(MARKER) {
            let after = &lower[pos + MARKER.len()..];
            let number: String = after
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            if let Ok(seconds) = number.parse::<f64>() {
                let rest = &after[number.len()..];
                let seconds = if rest.starts_with("ms") {
                    seconds / 1000.0
                } else {
                    seconds
                };
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let seconds_int = seconds.ceil().max(1.0) as u64;
                return format!("LLM rate limit reached. Please try again in {seconds_int} seconds.");
            }
        }
        "LLM rate limit reached. Please wait a moment and try again.".to_owned()
    }

    fn convert_tools(tools: &[Tool]) -> Vec<OpenAiTool> {
        tools
            .iter()
            .flat_map(|tool| {
                tool.function_declarations.iter().map(|func| OpenAiTool {
                    tool_type: "function".to_owned(),
                    function: OpenAiFunction {
                        name: func.name.clone(),
                        description: func.description.clone(),
                        parameters: func.parameters.clone(),
                    },
                })
            })
            .collect()
    }

    /// Decode tool call arguments; malformed JSON becomes an empty object
    fn convert_tool_calls(tool_calls: &[OpenAiToolCall]) -> Vec<FunctionCall> {
        tool_calls
            .iter()
            .map(|call| {
                debug!(tool_call_id = %call.id, function_name = %call.function.name, "Tool call");
                let args = serde_json::from_str::<Value>(&call.function.arguments)
                    .ok()
                    .filter(Value::is_object)
                    .unwrap_or_else(|| Value::Object(Map::new()));
                FunctionCall {
                    name: call.function.name.clone(),
                    args,
                }
            })
            .collect()
    }

    /// Parse one streamed frame
    fn parse_stream_frame(payload: &str) -> Option<Result<StreamChunk, AppError>> {
        match serde_json::from_str::<OpenAiStreamChunk>(payload) {
            Ok(chunk) => chunk.choices.into_iter().next().map(|choice| {
                Ok(StreamChunk {
                    delta: choice.delta.content.unwrap_or_default(),
                    is_final: choice.finish_reason.is_some(),
                    finish_reason: choice.finish_reason,
                    function_calls: None,
                })
            }),
            Err(e) => {
                warn!("Failed to parse stream chunk: {e}");
                None
            }
        }
    }

    /// Fold one frame of a tool-enabled stream into the accumulator
    ///
    /// Returns the content delta to forward, if any. The finish reason is kept
    /// for the final chunk rather than ending the stream early.
    fn absorb_tool_frame(
        payload: &str,
        calls: &mut ToolCallAccumulator,
        finish_reason: &mut Option<String>,
    ) -> Option<StreamChunk> {
        let frame = match serde_json::from_str::<OpenAiStreamChunk>(payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to parse stream chunk: {e}");
                return None;
            }
        };
        let choice = frame.choices.into_iter().next()?;
        if choice.finish_reason.is_some() {
            *finish_reason = choice.finish_reason;
        }
        if let Some(fragments) = choice.delta.tool_calls {
            calls.absorb(fragments);
        }
        choice
            .delta
            .content
            .filter(|delta| !delta.is_empty())
            .map(StreamChunk::delta)
    }

    /// Stream content deltas as they arrive, then one final chunk with any tool calls
    fn tool_stream(response: Response) -> ChatStream {
        let mut bytes = response.bytes_stream();
        Box::pin(stream! {
            let mut lines = SseLineBuffer::new();
            let mut calls = ToolCallAccumulator::default();
            let mut finish_reason = None;
            let mut done = false;

            while !done {
                let mut events = match bytes.next().await {
                    Some(Ok(chunk)) => lines.feed(&chunk),
                    Some(Err(e)) => {
                        yield Err(AppError::external_service(
                            SERVICE_NAME,
                            format!("Stream read error: {e}"),
                        ));
                        return;
                    }
                    None => {
                        done = true;
                        lines.flush().into_iter().collect()
                    }
                };
                for event in events.drain(..) {
                    match event {
                        SseEvent::Data(payload) => {
                            if let Some(chunk) =
                                Self::absorb_tool_frame(&payload, &mut calls, &mut finish_reason)
                            {
                                yield Ok(chunk);
                            }
                        }
                        SseEvent::Done => done = true,
                    }
                }
            }

            yield Ok(calls.finish(finish_reason));
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn display_name(&self) -> &'static str {
        "OpenAI"
    }

    fn capabilities(&self) -> LlmCapabilities {
        self.config.capabilities
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip(self, request), fields(model = %self.model_for(request)))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let body = self.build_request(request, false, None);
        let (choice, model, usage) = self.send_completion(&body).await?;
        let content = choice.message.content.unwrap_or_default();

        debug!(
            "Received completion: {} chars, finish_reason: {:?}",
            content.len(),
            choice.finish_reason
        );

        Ok(ChatResponse {
            content,
            model,
            usage,
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip(self, request), fields(model = %self.model_for(request)))]
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        let body = self.build_request(request, true, None);
        let response = self.send_with_retry(&body).await?;
        Ok(create_sse_stream(
            response.bytes_stream(),
            Self::parse_stream_frame,
            SERVICE_NAME,
        ))
    }

    #[instrument(skip(self, request, tools), fields(model = %self.model_for(request)))]
    async fn complete_with_tools(
        &self,
        request: &ChatRequest,
        tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponseWithTools, AppError> {
        let body = self.build_request(request, false, tools.as_deref());
        let (choice, model, usage) = self.send_completion(&body).await?;

        let function_calls = choice
            .message
            .tool_calls
            .filter(|calls| !calls.is_empty())
            .map(|calls| {
                info!("OpenAI returned {} tool calls", calls.len());
                Self::convert_tool_calls(&calls)
            });

        Ok(ChatResponseWithTools {
            content: choice.message.content,
            function_calls,
            model,
            usage,
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip(self, request, tools), fields(model = %self.model_for(request)))]
    async fn complete_stream_with_tools(
        &self,
        request: &ChatRequest,
        tools: Option<Vec<Tool>>,
    ) -> Result<ChatStream, AppError> {
        let body = self.build_request(request, true, tools.as_deref());
        let response = self.send_with_retry(&body).await?;
        Ok(Self::tool_stream(response))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<bool, AppError> {
        let response = self
            .add_auth_header(self.client.get(self.api_url("models")))
            .send()
            .await
            .map_err(|e| AppError::external_service(SERVICE_NAME, format!("Health check failed: {e}")))?;

        let healthy = response.status().is_success();
        if !healthy {
            warn!("OpenAI health check failed with status: {}", response.status());
        }
        Ok(healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FunctionDeclaration;
    use serde_json::json;

    fn provider() -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(
            OpenAiCompatibleConfig::openai(Some("sk-test".to_owned()), "gpt-4o-mini")
                .with_retry(RetryConfig::disabled()),
        )
        .unwrap()
    }

    #[test]
    fn test_request_carries_strict_schema() {
        let request = ChatRequest::new(vec![ChatMessage::user("plan")])
            .with_json_schema("coaching_recommendation", json!({"type": "object"}));
        let body = serde_json::to_value(provider().build_request(&request, false, None)).unwrap();
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_request_offers_tools_with_auto_choice() {
        let tools = vec![Tool {
            function_declarations: vec![FunctionDeclaration {
                name: "get_user_profile".to_owned(),
                description: "Profile".to_owned(),
                parameters: None,
            }],
        }];
        let request = ChatRequest::new(vec![ChatMessage::user("hi")]);
        let body =
            serde_json::to_value(provider().build_request(&request, false, Some(&tools))).unwrap();
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["function"]["name"], "get_user_profile");
    }

    #[test]
    fn test_error_mapping() {
        let body = r#"{"error":{"message":"Rate limit. Please try again in 1.2s","type":"requests"}}"#;
        let error = OpenAiCompatibleProvider::parse_error_response(StatusCode::TOO_MANY_REQUESTS, body);
        assert_eq!(error.code, ErrorCode::ExternalRateLimited);
        assert!(error.message.contains("2 seconds"));

        let error = OpenAiCompatibleProvider::parse_error_response(StatusCode::BAD_GATEWAY, "oops");
        assert_eq!(error.code, ErrorCode::ExternalServiceUnavailable);
    }

    #[test]
    fn test_malformed_tool_arguments_become_empty_object() {
        let calls = vec![OpenAiToolCall {
            id: "call_1".to_owned(),
            function: OpenAiFunctionCall {
                name: "get_previous_plans".to_owned(),
                arguments: "{not json".to_owned(),
            },
        }];
        let converted = OpenAiCompatibleProvider::convert_tool_calls(&calls);
        assert_eq!(converted[0].args, json!({}));
    }

    #[test]
    fn test_tool_call_fragments_are_reassembled() {
        let frames = [
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"get_previous_plans","arguments":""}}]},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"days\":"}}]},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"5}"}}]},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
        ];
        let mut calls = ToolCallAccumulator::default();
        let mut finish_reason = None;
        for frame in frames {
            assert!(OpenAiCompatibleProvider::absorb_tool_frame(frame, &mut calls, &mut finish_reason).is_none());
        }
        let last = calls.finish(finish_reason);
        assert!(last.is_final);
        assert_eq!(last.finish_reason.as_deref(), Some("tool_calls"));
        let function_calls = last.function_calls.unwrap();
        assert_eq!(function_calls[0].name, "get_previous_plans");
        assert_eq!(function_calls[0].args, json!({"days": 5}));
    }

    #[test]
    fn test_tool_stream_forwards_content_deltas() {
        let mut calls = ToolCallAccumulator::default();
        let mut finish_reason = None;
        let chunk = OpenAiCompatibleProvider::absorb_tool_frame(
            r#"{"choices":[{"delta":{"content":"Easy"},"finish_reason":null}]}"#,
            &mut calls,
            &mut finish_reason,
        )
        .unwrap();
        assert_eq!(chunk.delta, "Easy");
        assert!(!chunk.is_final);
        assert!(calls.finish(None).function_calls.is_none());
    }

    #[test]
    fn test_stream_frame_parsing() {
        let frame = r#"{"choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#;
        let chunk = OpenAiCompatibleProvider::parse_stream_frame(frame).unwrap().unwrap();
        assert_eq!(chunk.delta, "Hi");
        assert!(!chunk.is_final);
        assert!(OpenAiCompatibleProvider::parse_stream_frame("garbage").is_none());
    }
}
