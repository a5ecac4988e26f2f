use async_trait::async_trait;
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::models::chat::Conversation;

/// Where sessions park their conversation between exchanges. Nothing outlives the process.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn save(&self, conversation: &Conversation);

    async fn get_conversation(&self, conversation_id: &str) -> Option<Conversation>;

    async fn remove(&self, conversation_id: &str) -> Option<Conversation>;
}

#[derive(Default)]
pub struct MemoryHistoryStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn save(&self, conversation: &Conversation) {
        self.conversations
            .write().await
            .insert(conversation.id().to_string(), conversation.clone());
    }

    async fn get_conversation(&self, conversation_id: &str) -> Option<Conversation> {
        self.conversations.read().await.get(conversation_id).cloned()
    }

    async fn remove(&self, conversation_id: &str) -> Option<Conversation> {
        self.conversations.write().await.remove(conversation_id)
    }
}

pub fn initialize_history_store() -> Arc<dyn HistoryStore> {
    info!("Chat history is kept in memory for the lifetime of each session");
    Arc::new(MemoryHistoryStore::new())
}
