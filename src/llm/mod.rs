pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    HuggingFace,
    OpenAI,
    Ollama,
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LlmType::HuggingFace => "huggingface",
            LlmType::OpenAI => "openai",
            LlmType::Ollama => "ollama",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for LlmType {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "huggingface" | "hf" => Ok(LlmType::HuggingFace),
            "openai" => Ok(LlmType::OpenAI),
            "ollama" => Ok(LlmType::Ollama),
            _ => Err(LlmError::UnsupportedType(s.to_string())),
        }
    }
}

pub fn parse_llm_type(type_str: &str) -> Result<LlmType, LlmError> {
    type_str.parse()
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::HuggingFace,
            api_key: None,
            completion_model: None,
            base_url: None,
        }
    }
}

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl GenerationParams {
    /// Streaming chat replies.
    pub const CHAT: GenerationParams = GenerationParams {
        max_tokens: 512,
        temperature: 0.7,
        top_p: 0.95,
    };

    /// Single-shot study plans.
    pub const STUDY_PLAN: GenerationParams = GenerationParams {
        max_tokens: 1024,
        temperature: 0.7,
        top_p: 0.95,
    };
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },

    #[error("invalid response payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Provider(String),

    #[error("{0}")]
    Config(String),

    #[error("Unsupported LLM type: {0}")]
    UnsupportedType(String),
}
