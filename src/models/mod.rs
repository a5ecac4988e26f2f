pub mod chat;
pub mod study_plan;
pub mod websocket;
