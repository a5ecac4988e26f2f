pub mod exchange;
pub mod pdf;
pub mod prompt;
pub mod study_plan;

use std::error::Error;
use std::sync::Arc;

use log::{ error, info };

use crate::cli::Args;
use crate::llm::chat::{ new_client as new_chat_client, ChatClient };
use crate::llm::{ parse_llm_type, GenerationParams, LlmConfig };
use crate::models::chat::Conversation;
use crate::models::study_plan::StudyPlanRequest;
use self::exchange::{ Exchange, ExchangeError };
use self::pdf::{ PageExtractor, PdfExtractPages, PdfInput };

/// Everything a session needs to talk to the backend. Holds no per-session state,
/// so one instance is shared by every connection.
#[derive(Clone)]
pub struct Assistant {
    chat_client: Arc<dyn ChatClient>,
    pdf_extractor: Arc<dyn PageExtractor>,
    system_prompt: String,
    pdf_preview_chars: usize,
}

impl Assistant {
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        pdf_extractor: Arc<dyn PageExtractor>,
        system_prompt: impl Into<String>,
        pdf_preview_chars: usize
    ) -> Self {
        Self {
            chat_client,
            pdf_extractor,
            system_prompt: system_prompt.into(),
            pdf_preview_chars,
        }
    }

    pub fn from_args(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let chat_llm_type = parse_llm_type(&args.chat_llm_type)?;
        let chat_api_key = if !args.chat_api_key.is_empty() {
            Some(args.chat_api_key.clone())
        } else {
            None
        };
        let chat_config = LlmConfig {
            llm_type: chat_llm_type,
            base_url: args.chat_base_url.clone(),
            api_key: chat_api_key,
            completion_model: args.chat_model.clone(),
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={}",
            chat_config.llm_type,
            chat_client.get_model(),
            chat_client.get_base_url().as_deref().unwrap_or("adapter default")
        );

        Ok(Self::new(
            chat_client,
            Arc::new(PdfExtractPages),
            args.system_prompt.clone(),
            args.pdf_preview_chars
        ))
    }

    /// Starts streaming a reply to `message` on top of `conversation`.
    pub fn respond(
        &self,
        conversation: Conversation,
        message: &str
    ) -> Result<Exchange, ExchangeError> {
        Exchange::start(
            Arc::clone(&self.chat_client),
            conversation,
            &self.system_prompt,
            message,
            GenerationParams::CHAT
        )
    }

    pub async fn generate_study_plan(&self, req: &StudyPlanRequest) -> String {
        study_plan::generate_study_plan(self.chat_client.as_ref(), req).await
    }

    /// Runs extraction on the blocking pool.
    pub async fn preview_pdf(&self, file: Option<PdfInput>) -> String {
        let extractor = Arc::clone(&self.pdf_extractor);
        let limit = self.pdf_preview_chars;
        let joined = tokio::task::spawn_blocking(move || {
            pdf::process_pdf(extractor.as_ref(), file.as_ref(), limit)
        }).await;

        match joined {
            Ok(preview) => preview,
            Err(e) => {
                error!("PDF extraction task failed: {}", e);
                format!("Error processing PDF: {}", e)
            }
        }
    }
}
