use async_trait::async_trait;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{ http_stream_generate, ChatClient, CompletionResponse, StreamLine, TokenStream };
use crate::llm::{ GenerationParams, LlmConfig, LlmError };
use crate::models::chat::ChatMessage;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

/// Client for any endpoint speaking the OpenAI chat-completions protocol.
pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: Option<OpenAIDelta>,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

impl OpenAIChatClient {
    pub fn new(
        api_key: Option<String>,
        model: String,
        base_url: String
    ) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|e|
                    LlmError::Config(format!("Invalid API key format: {}", e))
                )?
            );
        }

        let http = HttpClient::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            model,
            base_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::Config("OpenAI API key is required".to_string()))?;

        Self::new(
            Some(api_key),
            config.completion_model.clone().unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            config.base_url.clone().unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string())
        )
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
        stream: bool
    ) -> OpenAIChatRequest {
        OpenAIChatRequest {
            model: self.model.clone(),
            messages: messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            stream: if stream { Some(true) } else { None },
        }
    }
}

/// Decodes one server-sent-events line of a chat-completions stream.
pub fn parse_stream_line(line: &str) -> Result<StreamLine, LlmError> {
    let data = match line.strip_prefix("data:") {
        Some(data) => data.trim(),
        None => {
            return Ok(StreamLine::Skip);
        }
    };
    if data == "[DONE]" {
        return Ok(StreamLine::Done);
    }

    let chunk: OpenAIStreamResponse = serde_json::from_str(data)?;
    if let Some(error) = chunk.error {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(LlmError::Provider(message));
    }

    let content = chunk.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .unwrap_or_default();
    Ok(StreamLine::Token(content))
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams
    ) -> Result<CompletionResponse, LlmError> {
        let req = self.build_request(messages, params, false);

        let resp = self.http.post(&self.base_url).json(&req).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }
        let body = resp.json::<OpenAIResponse>().await?;

        let content = body.choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Provider("No choices in completion response".to_string()))?
            .message.content
            .unwrap_or_default();

        Ok(CompletionResponse { response: content })
    }

    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams
    ) -> Result<TokenStream, LlmError> {
        let req = self.build_request(messages, params, true);
        http_stream_generate(
            self.http.clone(),
            self.base_url.clone(),
            req,
            parse_stream_line,
            None
        ).await
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
