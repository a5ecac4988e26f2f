#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use futures::{ stream, StreamExt };

use edu_assistant::assistant::pdf::{ PageExtractor, PdfError, PdfInput };
use edu_assistant::assistant::Assistant;
use edu_assistant::llm::chat::{ ChatClient, CompletionResponse, TokenStream };
use edu_assistant::llm::{ GenerationParams, LlmError };
use edu_assistant::models::chat::ChatMessage;

/// Streams a fixed list of fragments, optionally never ending afterwards.
pub struct ScriptedBackend {
    pub tokens: Vec<&'static str>,
    pub hang: bool,
}

#[async_trait]
impl ChatClient for ScriptedBackend {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _params: &GenerationParams
    ) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse {
            response: format!("Plan for: {}", messages[1].content),
        })
    }

    async fn complete_stream(
        &self,
        _messages: &[ChatMessage],
        _params: &GenerationParams
    ) -> Result<TokenStream, LlmError> {
        let items: Vec<Result<String, LlmError>> = self.tokens
            .iter()
            .map(|t| Ok(t.to_string()))
            .collect();
        if self.hang {
            Ok(Box::pin(stream::iter(items).chain(stream::pending())))
        } else {
            Ok(Box::pin(stream::iter(items)))
        }
    }

    fn get_model(&self) -> String {
        "scripted".into()
    }

    fn get_base_url(&self) -> Option<String> {
        None
    }
}

pub struct FixedPages(pub Vec<&'static str>);

impl PageExtractor for FixedPages {
    fn extract_pages(&self, _input: &PdfInput) -> Result<Vec<String>, PdfError> {
        Ok(self.0.iter().map(|p| p.to_string()).collect())
    }
}

pub fn assistant(tokens: Vec<&'static str>, hang: bool) -> Arc<Assistant> {
    Arc::new(
        Assistant::new(
            Arc::new(ScriptedBackend { tokens, hang }),
            Arc::new(FixedPages(vec!["Chapter 1", "Chapter 2"])),
            "You are a helpful assistant for education and learning.",
            1000
        )
    )
}
