pub mod assistant;
pub mod cli;
pub mod history;
pub mod llm;
pub mod models;
pub mod server;

use assistant::Assistant;
use cli::Args;
use history::initialize_history_store;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    match args.http_port {
        Some(port) => info!("HTTP API Port: {}", port),
        None => info!("HTTP API: disabled"),
    }
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("adapter default"));
    info!("System Prompt: {}", args.system_prompt);
    info!("PDF Preview Chars: {}", args.pdf_preview_chars);
    info!("-------------------------");

    let assistant = Arc::new(Assistant::from_args(&args)?);
    let history = initialize_history_store();
    info!("Starting server on: {}", args.server_addr);
    let server = Server::new(args.server_addr.clone(), args.http_port, assistant, history);
    server.run().await?;

    Ok(())
}
