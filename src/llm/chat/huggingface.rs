use async_trait::async_trait;
use log::warn;

use super::openai::OpenAIChatClient;
use super::{ ChatClient, CompletionResponse, TokenStream };
use crate::llm::{ GenerationParams, LlmConfig, LlmError, LlmType };
use crate::models::chat::ChatMessage;

pub const DEFAULT_HF_URL: &str = "https://router.huggingface.co/v1/chat/completions";
pub const DEFAULT_HF_MODEL: &str = "HuggingFaceH4/zephyr-7b-beta";

/// Hosted inference through the Hugging Face router, which speaks the
/// chat-completions protocol.
pub struct HuggingFaceChatClient {
    inner: OpenAIChatClient,
}

impl HuggingFaceChatClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.llm_type != LlmType::HuggingFace {
            return Err(LlmError::Config("Invalid config type for HuggingFaceChatClient".into()));
        }

        let api_key = config.api_key.clone().filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!("No Hugging Face token configured; anonymous requests are heavily rate limited.");
        }

        let inner = OpenAIChatClient::new(
            api_key,
            config.completion_model.clone().unwrap_or_else(|| DEFAULT_HF_MODEL.to_string()),
            config.base_url.clone().unwrap_or_else(|| DEFAULT_HF_URL.to_string())
        )?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl ChatClient for HuggingFaceChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams
    ) -> Result<CompletionResponse, LlmError> {
        self.inner.complete(messages, params).await
    }

    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams
    ) -> Result<TokenStream, LlmError> {
        self.inner.complete_stream(messages, params).await
    }

    fn get_model(&self) -> String {
        self.inner.get_model()
    }

    fn get_base_url(&self) -> Option<String> {
        self.inner.get_base_url()
    }
}
