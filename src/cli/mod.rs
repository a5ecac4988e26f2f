use clap::Parser;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant for education and learning.";

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat and study plans (huggingface, openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "huggingface")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider (Hugging Face token, OpenAI key)
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., HuggingFaceH4/zephyr-7b-beta, gpt-4o, llama3)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    // --- Assistant Args ---
    /// System instruction sent ahead of every chat exchange.
    #[arg(long, env = "SYSTEM_PROMPT", default_value = DEFAULT_SYSTEM_PROMPT)]
    pub system_prompt: String,

    /// Number of characters of extracted PDF text returned in a preview.
    #[arg(long, env = "PDF_PREVIEW_CHARS", default_value = "1000")]
    pub pdf_preview_chars: usize,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Host address and port for the WebSocket session server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Optional port for the HTTP API (study plans, PDF previews, conversation lookup).
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_hosted_setup() {
        let args = Args::parse_from(["edu-assistant"]);
        assert_eq!(args.chat_llm_type, "huggingface");
        assert_eq!(args.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(args.pdf_preview_chars, 1000);
        assert_eq!(args.server_addr, "127.0.0.1:4000");
        assert!(args.http_port.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "edu-assistant",
            "--chat-llm-type",
            "ollama",
            "--chat-model",
            "llama3",
            "--http-port",
            "8080",
            "--pdf-preview-chars",
            "250",
        ]);
        assert_eq!(args.chat_llm_type, "ollama");
        assert_eq!(args.chat_model.as_deref(), Some("llama3"));
        assert_eq!(args.http_port, Some(8080));
        assert_eq!(args.pdf_preview_chars, 250);
    }
}
