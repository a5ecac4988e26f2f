pub mod api;
pub mod websocket;

use crate::assistant::Assistant;
use crate::history::HistoryStore;
use std::error::Error;
use std::sync::Arc;

pub struct Server {
    addr: String,
    http_port: Option<u16>,
    assistant: Arc<Assistant>,
    history: Arc<dyn HistoryStore>,
}

impl Server {
    pub fn new(
        addr: String,
        http_port: Option<u16>,
        assistant: Arc<Assistant>,
        history: Arc<dyn HistoryStore>
    ) -> Self {
        Self {
            addr,
            http_port,
            assistant,
            history,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(http_port) = self.http_port {
            self.start_http_server(http_port).await?;
        }

        self.start_ws_server().await?;

        Ok(())
    }

    async fn start_http_server(&self, http_port: u16) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(http_port, api::AppState {
            assistant: self.assistant.clone(),
            history: self.history.clone(),
        }).await
    }

    async fn start_ws_server(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        websocket::start_ws_server(&self.addr, self.assistant.clone(), self.history.clone()).await
    }
}
