use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use async_trait::async_trait;
use super::{ http_stream_generate, ChatClient, CompletionResponse, StreamLine, TokenStream };
use crate::llm::{ GenerationParams, LlmConfig, LlmError, LlmType };
use crate::models::chat::ChatMessage;

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatOptions {
    num_predict: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct StreamResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, completion_model: Option<String>) -> Self {
        let model = completion_model.unwrap_or_else(|| "llama3".to_string());
        let url = base_url.unwrap_or_else(|| "http://localhost:11434".into());

        Self {
            http: HttpClient::new(),
            base_url: url,
            completion_model: model,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.llm_type != LlmType::Ollama {
            return Err(LlmError::Config("Invalid config type for OllamaClient".into()));
        }

        Ok(Self::new(config.base_url.clone(), config.completion_model.clone()))
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
        stream: bool
    ) -> ChatRequest {
        ChatRequest {
            model: self.completion_model.clone(),
            messages: messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream,
            options: ChatOptions {
                num_predict: params.max_tokens,
                temperature: params.temperature,
                top_p: params.top_p,
            },
        }
    }
}

/// Decodes one NDJSON line of an `/api/chat` stream.
pub fn parse_stream_line(line: &str) -> Result<StreamLine, LlmError> {
    let resp: StreamResponse = serde_json::from_str(line)?;
    if let Some(error) = resp.error {
        return Err(LlmError::Provider(error));
    }
    if let Some(message) = resp.message {
        if !message.content.is_empty() || !resp.done {
            return Ok(StreamLine::Token(message.content));
        }
    }
    if resp.done { Ok(StreamLine::Done) } else { Ok(StreamLine::Skip) }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams
    ) -> Result<CompletionResponse, LlmError> {
        let req = self.build_request(messages, params, false);
        let resp = self.http.post(self.chat_url()).json(&req).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }
        let data = resp.json::<ChatResponse>().await?;
        Ok(CompletionResponse { response: data.message.content })
    }

    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams
    ) -> Result<TokenStream, LlmError> {
        let req = self.build_request(messages, params, true);
        http_stream_generate(self.http.clone(), self.chat_url(), req, parse_stream_line, None).await
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
