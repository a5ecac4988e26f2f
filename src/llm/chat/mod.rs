pub mod huggingface;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use futures::{ Stream, StreamExt };
use log::debug;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;
use super::{ GenerationParams, LlmConfig, LlmError, LlmType };
use self::huggingface::HuggingFaceChatClient;
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use crate::models::chat::ChatMessage;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams
    ) -> Result<CompletionResponse, LlmError>;

    /// Token fragments as the backend produces them. Fragments may be empty; the
    /// stream ending is the completion signal.
    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams
    ) -> Result<TokenStream, LlmError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::HuggingFace => {
            let specific_client = HuggingFaceChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

/// Splits a chunked HTTP body into lines, holding back a trailing partial line
/// until the chunk that completes it arrives.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }

    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string())
    }
}

/// What a provider makes of one line of a streaming body.
#[derive(Debug, PartialEq)]
pub enum StreamLine {
    Token(String),
    Skip,
    Done,
}

pub type LineParser = fn(&str) -> Result<StreamLine, LlmError>;

pub async fn http_stream_generate(
    http: HttpClient,
    url: String,
    payload: impl serde::Serialize + Send + 'static,
    line_parser: LineParser,
    headers: Option<Vec<(String, String)>>
) -> Result<TokenStream, LlmError> {
    let mut req = http.post(&url).json(&payload);
    if let Some(header_list) = headers {
        for (name, value) in header_list {
            req = req.header(name, value);
        }
    }

    let resp = req.send().await?;
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(LlmError::Status { status, body });
    }

    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        let mut bytes = resp.bytes_stream();
        let mut lines = LineBuffer::new();

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(buf) => {
                    for line in lines.push(&buf) {
                        if !forward_line(&tx, line_parser, &line).await {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(LlmError::Http(e))).await;
                    return;
                }
            }
        }

        if let Some(line) = lines.finish() {
            forward_line(&tx, line_parser, &line).await;
        }
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}

/// Returns `false` once the stream should stop.
async fn forward_line(
    tx: &mpsc::Sender<Result<String, LlmError>>,
    line_parser: LineParser,
    line: &str
) -> bool {
    if line.trim().is_empty() {
        return true;
    }
    debug!("stream line: {}", line);
    match line_parser(line) {
        Ok(StreamLine::Token(tok)) => tx.send(Ok(tok)).await.is_ok(),
        Ok(StreamLine::Skip) => true,
        Ok(StreamLine::Done) => false,
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            false
        }
    }
}
